/// Common test utilities and mock infrastructure
///
/// This module provides shared functionality for integration tests including:
/// - Scripted primary / secondary drive sources
/// - A recording discard primitive with programmable failures
/// - Event stream assertions

pub mod assertions;
pub mod mock_discard;
pub mod mock_sources;
