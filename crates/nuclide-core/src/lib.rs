//! # nuclide-core
//! Foundation types and traits for radiopharmaceutical inventory accounting.

pub mod constants;
pub mod error;
pub mod isotopes;
pub mod traits;
pub mod types;
pub mod units;
