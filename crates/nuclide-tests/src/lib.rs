//! Cross-crate test suite for Nuclide.
//!
//! Integration tests under `tests/` drive the engine and the inventory
//! manager together: the worked hot-lab scenarios, invariants that must
//! hold across arbitrary operation sequences, and persistence behaviour
//! on a real filesystem.

pub mod helpers;
