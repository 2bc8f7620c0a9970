//! # nuclide-inventory — Stateful inventory over the pure Nuclide engine.
//!
//! - [`manager::InventoryManager`] — single writer per isotope, all-or-nothing commits
//! - [`store::JsonStore`] / [`store::MemoryStore`] — ledger, waste and dose persistence
//! - [`config::InventoryConfig`] — thresholds, data directory and logging settings
//! - [`clock`] — wall clock and a settable clock for tests

pub mod clock;
pub mod config;
pub mod error;
pub mod manager;
pub mod store;

pub use clock::{FixedClock, SystemClock};
pub use config::InventoryConfig;
pub use error::InventoryError;
pub use manager::{InventoryManager, StockReport};
pub use store::{JsonStore, MemoryStore};
