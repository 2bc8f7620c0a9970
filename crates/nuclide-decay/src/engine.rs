//! Decay engine implementing the [`DecayCalculator`] trait.
//!
//! One closed form is used everywhere: `factor = 2^(−elapsed / half_life)`.

use chrono::{DateTime, Utc};
use nuclide_core::constants::MILLIS_PER_HOUR;
use nuclide_core::error::DecayError;
use nuclide_core::traits::DecayCalculator;

/// The production decay calculator.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecayEngine;

impl DecayEngine {
    /// Create a new DecayEngine.
    pub fn new() -> Self {
        Self
    }
}

/// Signed hours from `from` to `to`, at millisecond resolution.
pub fn elapsed_hours(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / MILLIS_PER_HOUR
}

pub(crate) fn check_half_life(half_life_hours: f64) -> Result<(), DecayError> {
    if !half_life_hours.is_finite() || half_life_hours <= 0.0 {
        return Err(DecayError::InvalidParameter(format!(
            "half-life must be a positive number of hours, got {half_life_hours}"
        )));
    }
    Ok(())
}

impl DecayCalculator for DecayEngine {
    fn decay_factor(&self, elapsed_hours: f64, half_life_hours: f64) -> Result<f64, DecayError> {
        check_half_life(half_life_hours)?;
        if !elapsed_hours.is_finite() {
            return Err(DecayError::InvalidParameter(format!(
                "elapsed time must be finite, got {elapsed_hours}"
            )));
        }
        Ok((-elapsed_hours / half_life_hours).exp2())
    }
}
