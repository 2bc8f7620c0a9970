//! Trait interfaces between the Nuclide crates.
//!
//! - [`DecayCalculator`] — decay math (nuclide-decay implements)
//! - [`InventoryStore`] — persistence of ledgers, waste and doses (nuclide-inventory implements)
//! - [`Clock`] — source of "now" for the stateful layer; the engine itself
//!   always takes time as an explicit argument

use chrono::{DateTime, Utc};

use crate::error::{DecayError, StoreError};
use crate::types::{DoseRecord, IsotopeLedger, WasteItem};

/// Pure radioactive decay computation.
pub trait DecayCalculator: Send + Sync {
    /// Fraction of activity left after `elapsed_hours`.
    ///
    /// `elapsed_hours` may be negative (query before calibration), giving a
    /// factor above 1. Fails with [`DecayError::InvalidParameter`] when
    /// `half_life_hours` is not a positive finite number.
    fn decay_factor(&self, elapsed_hours: f64, half_life_hours: f64) -> Result<f64, DecayError>;

    /// Activity left from `amount` after `elapsed_hours`.
    ///
    /// Default implementation: `amount * decay_factor(..)`, with a zero
    /// amount staying zero at every time.
    fn activity_at(
        &self,
        amount: f64,
        elapsed_hours: f64,
        half_life_hours: f64,
    ) -> Result<f64, DecayError> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(DecayError::InvalidParameter(format!(
                "amount must be a non-negative number, got {amount}"
            )));
        }
        let factor = self.decay_factor(elapsed_hours, half_life_hours)?;
        if amount == 0.0 {
            return Ok(0.0);
        }
        Ok(amount * factor)
    }

    /// Calibration-time amount that decays to `activity` after `elapsed_hours`.
    ///
    /// Inverse of [`activity_at`](Self::activity_at).
    fn calibrated_amount(
        &self,
        activity: f64,
        elapsed_hours: f64,
        half_life_hours: f64,
    ) -> Result<f64, DecayError> {
        if !activity.is_finite() || activity < 0.0 {
            return Err(DecayError::InvalidParameter(format!(
                "activity must be a non-negative number, got {activity}"
            )));
        }
        let factor = self.decay_factor(elapsed_hours, half_life_hours)?;
        if activity == 0.0 {
            return Ok(0.0);
        }
        if factor <= 0.0 || !factor.is_finite() {
            return Err(DecayError::InvalidParameter(format!(
                "decay factor {factor} cannot be inverted"
            )));
        }
        Ok(activity / factor)
    }
}

/// Durable storage for inventory ledgers and the waste/dose history.
pub trait InventoryStore: Send + Sync {
    /// All persisted isotope ledgers.
    fn load_ledgers(&self) -> Result<Vec<IsotopeLedger>, StoreError>;

    /// Full waste history, oldest first.
    fn load_waste(&self) -> Result<Vec<WasteItem>, StoreError>;

    /// Full dose history, oldest first.
    fn load_doses(&self) -> Result<Vec<DoseRecord>, StoreError>;

    /// Persist a ledger together with the waste and dose records its
    /// latest change produced.
    fn commit(
        &self,
        ledger: &IsotopeLedger,
        waste: &[WasteItem],
        doses: &[DoseRecord],
    ) -> Result<(), StoreError>;
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct HalvingEveryHour;

    impl DecayCalculator for HalvingEveryHour {
        fn decay_factor(&self, elapsed_hours: f64, _: f64) -> Result<f64, DecayError> {
            Ok(0.5f64.powf(elapsed_hours))
        }
    }

    #[test]
    fn activity_at_default_multiplies() {
        let c = HalvingEveryHour;
        assert_eq!(c.activity_at(8.0, 3.0, 1.0).unwrap(), 1.0);
    }

    #[test]
    fn activity_at_zero_amount() {
        let c = HalvingEveryHour;
        assert_eq!(c.activity_at(0.0, -5000.0, 1.0).unwrap(), 0.0);
    }

    #[test]
    fn activity_at_rejects_negative_amount() {
        let c = HalvingEveryHour;
        assert!(matches!(
            c.activity_at(-1.0, 1.0, 1.0),
            Err(DecayError::InvalidParameter(_))
        ));
    }

    #[test]
    fn calibrated_amount_inverts() {
        let c = HalvingEveryHour;
        assert_eq!(c.calibrated_amount(1.0, 3.0, 1.0).unwrap(), 8.0);
    }

    #[test]
    fn calibrated_amount_rejects_vanished_factor() {
        let c = HalvingEveryHour;
        assert!(c.calibrated_amount(1.0, 1.0e6, 1.0).is_err());
    }

    #[test]
    fn calculator_is_object_safe() {
        let c = HalvingEveryHour;
        let dyn_c: &dyn DecayCalculator = &c;
        assert_eq!(dyn_c.decay_factor(1.0, 1.0).unwrap(), 0.5);
    }
}
