//! # nuclide-decay — Half-life decay and stock computation.
//!
//! Every activity is computed on read from a vial's calibration amount and
//! time using the exact law `A(t) = A0 · 2^(−t/T½)`. Nothing here mutates
//! stored records, so the same `(vials, time)` pair always produces the
//! same answer no matter how often it is asked.
//!
//! - [`engine`] — [`DecayEngine`], the production [`DecayCalculator`](nuclide_core::traits::DecayCalculator)
//! - [`stock`] — per-vial activity and threshold-filtered stock totals
//! - [`storage`] — decay-in-storage of waste items

pub mod engine;
pub mod stock;
pub mod storage;

pub use engine::{DecayEngine, elapsed_hours};
pub use stock::{StockLevel, aggregate_stock, current_activity, stock_level, vial_activity, visible_stock};
pub use storage::{is_releasable, release_time, waste_activity_at};
