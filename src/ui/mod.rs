// Terminal output for trim jobs

pub mod progress;

pub use progress::{format_duration, human_bytes, CellState, GridRenderer};

#[cfg(test)]
mod progress_tests;
