//! Accounting constants. Activities are unit-agnostic (mCi or MBq, whichever
//! the department uses); the thresholds below are expressed in that unit.

/// Exact conversion ratio: 1 mCi = 37 MBq.
pub const MCI_TO_MBQ: u64 = 37;

/// Fixed-point scale for [`crate::units::Activity`] readings (millionths of a unit).
pub const UNIT_PRECISION: u64 = 1_000_000;

/// Activity at or below which a vial is treated as empty and routed to waste.
pub const DEPLETION_EPSILON: f64 = 0.01;

/// Vials below this current activity are excluded from reported stock totals.
pub const VISIBILITY_THRESHOLD: f64 = 0.1;

/// Fraction of each withdrawn dose recorded as syringe/needle holdup waste.
pub const RESIDUAL_WASTE_FRACTION: f64 = 0.05;

/// Half-lives a waste item is held for decay-in-storage before release.
pub const DECAY_IN_STORAGE_HALF_LIVES: f64 = 10.0;

/// Default total at or below which a stock report is flagged low.
pub const LOW_STOCK_THRESHOLD: f64 = 5.0;

/// Label prefix marking a vial as eluted from a generator.
pub const ELUTION_LABEL: &str = "Generator Elution";

/// Slack allowed when comparing a computed draw volume with the volume on hand.
pub const VOLUME_TOLERANCE_ML: f64 = 1e-9;

pub const MILLIS_PER_HOUR: f64 = 3_600_000.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_are_ordered() {
        assert!(DEPLETION_EPSILON < VISIBILITY_THRESHOLD);
        assert!(VISIBILITY_THRESHOLD < LOW_STOCK_THRESHOLD);
    }

    #[test]
    fn residual_fraction_is_five_percent() {
        assert_eq!(RESIDUAL_WASTE_FRACTION * 100.0, 5.0);
    }

    #[test]
    fn millis_per_hour() {
        assert_eq!(MILLIS_PER_HOUR, 60.0 * 60.0 * 1_000.0);
    }
}
