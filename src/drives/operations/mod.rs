// Drive operations
//
// Discard primitives the trim job drives, one range at a time

pub mod trim; // TRIM/discard primitives

// Re-exports for convenience
pub use trim::{
    primitive_for, BlkdiscardCommand, DiscardError, DiscardPrimitive, IoctlDiscard,
    SimulatedDiscard,
};

#[cfg(test)]
pub use trim::MockDiscardPrimitive;
