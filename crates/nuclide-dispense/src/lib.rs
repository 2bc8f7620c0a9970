//! # nuclide-dispense — Dose allocation and inventory state transitions.
//!
//! Pure functions over a borrowed vial collection and an explicit query
//! time. Each returns a new collection plus the waste records its changes
//! produce; a failed call returns an error and changes nothing.
//!
//! # Modules
//!
//! - [`error`] — `DispenseError` enum
//! - [`allocation`] — highest-activity-first withdrawal across vials
//! - [`generator`] — generator elution and eluate retirement
//! - [`waste`] — depletion sweep and manual disposal
//! - [`ids`] — deterministic record identifiers

pub mod allocation;
pub mod error;
pub mod generator;
pub mod ids;
pub mod waste;

pub use allocation::{AllocationPolicy, DepletedVial, Draw, Withdrawal, WithdrawalAllocator, allocate_withdrawal};
pub use error::DispenseError;
pub use generator::{allocate_elution, elution_vial, retire_all_vials, retire_generator_vials};
pub use waste::{Retirement, dispose_vial, sweep_depleted};
