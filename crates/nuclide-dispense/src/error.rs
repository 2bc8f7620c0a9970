//! Dispensing error types.

use nuclide_core::error::DecayError;
use thiserror::Error;

/// Errors from allocation, elution and disposal.
///
/// `InsufficientStock` and `InsufficientVolume` are expected, user-facing
/// rejections. `InvalidParameter` means the caller passed something that
/// a correct integration never produces.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispenseError {
    /// Non-positive request, negative volume, or a similar contract violation.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Requested more activity than the visible stock holds.
    #[error("insufficient stock: available {available:.3}, requested {requested:.3}")]
    InsufficientStock {
        /// Visible stock at the query time.
        available: f64,
        /// Activity asked for.
        requested: f64,
    },

    /// The draw would need more liquid than the vials hold.
    #[error("insufficient volume: available {available_ml:.3} mL, required {required_ml:.3} mL")]
    InsufficientVolume {
        /// Nominal volume of the visible vials.
        available_ml: f64,
        /// Volume needed at the current concentration.
        required_ml: f64,
    },

    /// No vial with the given id is in the collection.
    #[error("vial not found: {0}")]
    VialNotFound(String),

    /// Decay computation error from nuclide-core.
    #[error(transparent)]
    Decay(#[from] DecayError),
}
