//! Current activity of vials and threshold-filtered stock totals.
//!
//! Reported stock leaves out vials that have decayed below the visibility
//! threshold. Dashboard totals, low-stock alerts and withdrawal validation
//! must all go through [`stock_level`] so they agree with one another.

use chrono::{DateTime, Utc};
use nuclide_core::constants::VISIBILITY_THRESHOLD;
use nuclide_core::error::DecayError;
use nuclide_core::traits::DecayCalculator;
use nuclide_core::types::Vial;
use tracing::trace;

use crate::engine::{DecayEngine, check_half_life, elapsed_hours};

/// Activity left in `vial` at `at`, using `calc`.
pub fn vial_activity(
    calc: &dyn DecayCalculator,
    vial: &Vial,
    half_life_hours: f64,
    at: DateTime<Utc>,
) -> Result<f64, DecayError> {
    calc.activity_at(
        vial.initial_amount,
        elapsed_hours(vial.received_at, at),
        half_life_hours,
    )
}

/// Activity left in `vial` at `at` under the exact half-life law.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, TimeZone, Utc};
/// use nuclide_core::types::Vial;
/// use nuclide_decay::current_activity;
///
/// let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
/// let vial = Vial::new("v1", 100.0, 10.0, t0, "Tc-99m bulk");
/// let a = current_activity(&vial, 6.0, t0 + Duration::hours(6)).unwrap();
/// assert!((a - 50.0).abs() < 1e-9);
/// ```
pub fn current_activity(
    vial: &Vial,
    half_life_hours: f64,
    at: DateTime<Utc>,
) -> Result<f64, DecayError> {
    vial_activity(&DecayEngine, vial, half_life_hours, at)
}

/// Aggregate of the vials visible at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StockLevel {
    /// Sum of current activities of visible vials.
    pub total_activity: f64,
    /// Sum of nominal volumes of the same vials.
    pub total_volume_ml: f64,
    /// Number of vials counted.
    pub visible_vials: usize,
}

impl StockLevel {
    /// Activity per millilitre, or `None` when no volume is on record.
    pub fn concentration(&self) -> Option<f64> {
        if self.total_volume_ml > 0.0 {
            Some(self.total_activity / self.total_volume_ml)
        } else {
            None
        }
    }

    /// Volume needed to draw `activity` at the current concentration.
    ///
    /// Returns 0 when volume is untracked.
    pub fn volume_for(&self, activity: f64) -> f64 {
        match self.concentration() {
            Some(c) if c > 0.0 => activity / c,
            _ => 0.0,
        }
    }
}

/// Stock made up of vials whose current activity is at least `visibility_threshold`.
pub fn stock_level(
    calc: &dyn DecayCalculator,
    vials: &[Vial],
    half_life_hours: f64,
    at: DateTime<Utc>,
    visibility_threshold: f64,
) -> Result<StockLevel, DecayError> {
    check_half_life(half_life_hours)?;

    let mut level = StockLevel::default();
    for vial in vials {
        let activity = vial_activity(calc, vial, half_life_hours, at)?;
        if activity < visibility_threshold {
            trace!(vial = %vial.id, activity, "below visibility threshold");
            continue;
        }
        level.total_activity += activity;
        level.total_volume_ml += vial.initial_volume_ml;
        level.visible_vials += 1;
    }
    Ok(level)
}

/// Total current activity across `vials`, excluding those below
/// `visibility_threshold` (normally [`VISIBILITY_THRESHOLD`]).
pub fn aggregate_stock(
    vials: &[Vial],
    half_life_hours: f64,
    at: DateTime<Utc>,
    visibility_threshold: f64,
) -> Result<f64, DecayError> {
    Ok(stock_level(&DecayEngine, vials, half_life_hours, at, visibility_threshold)?.total_activity)
}

/// [`aggregate_stock`] at the default visibility threshold.
pub fn visible_stock(
    vials: &[Vial],
    half_life_hours: f64,
    at: DateTime<Utc>,
) -> Result<f64, DecayError> {
    aggregate_stock(vials, half_life_hours, at, VISIBILITY_THRESHOLD)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    const TC99M: f64 = 6.0;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
    }

    fn vial(id: &str, amount: f64, volume: f64) -> Vial {
        Vial::new(id, amount, volume, t0(), "bulk")
    }

    #[test]
    fn scenario_decay_over_two_half_lives() {
        let v = vial("v1", 100.0, 10.0);
        let at6 = current_activity(&v, TC99M, t0() + Duration::hours(6)).unwrap();
        let at12 = current_activity(&v, TC99M, t0() + Duration::hours(12)).unwrap();
        assert!((at6 - 50.0).abs() < 1e-9);
        assert!((at12 - 25.0).abs() < 1e-9);
    }

    #[test]
    fn query_before_calibration_exceeds_initial() {
        let v = vial("v1", 100.0, 10.0);
        let a = current_activity(&v, TC99M, t0() - Duration::hours(6)).unwrap();
        assert!((a - 200.0).abs() < 1e-9);
    }

    #[test]
    fn invalid_half_life_rejected() {
        let v = vial("v1", 100.0, 10.0);
        assert!(matches!(
            current_activity(&v, 0.0, t0()),
            Err(DecayError::InvalidParameter(_))
        ));
        assert!(aggregate_stock(&[], -1.0, t0(), VISIBILITY_THRESHOLD).is_err());
    }

    #[test]
    fn negative_amount_rejected() {
        let v = vial("v1", -1.0, 10.0);
        assert!(current_activity(&v, TC99M, t0()).is_err());
    }

    #[test]
    fn aggregate_excludes_invisible_vials() {
        let vials = vec![vial("a", 40.0, 4.0), vial("b", 0.05, 1.0), vial("c", 30.0, 3.0)];
        let level = stock_level(&DecayEngine, &vials, TC99M, t0(), VISIBILITY_THRESHOLD).unwrap();
        assert_eq!(level.total_activity, 70.0);
        assert_eq!(level.total_volume_ml, 7.0);
        assert_eq!(level.visible_vials, 2);
        assert_eq!(level.concentration(), Some(10.0));
    }

    #[test]
    fn aggregate_threshold_is_inclusive() {
        let vials = vec![vial("a", 0.1, 1.0)];
        assert_eq!(aggregate_stock(&vials, TC99M, t0(), 0.1).unwrap(), 0.1);
    }

    #[test]
    fn aggregate_of_nothing_is_zero() {
        assert_eq!(visible_stock(&[], TC99M, t0()).unwrap(), 0.0);
    }

    #[test]
    fn volume_for_without_volume_is_zero() {
        let level = StockLevel {
            total_activity: 10.0,
            total_volume_ml: 0.0,
            visible_vials: 1,
        };
        assert_eq!(level.concentration(), None);
        assert_eq!(level.volume_for(5.0), 0.0);
    }

    #[test]
    fn volume_for_uses_concentration() {
        let level = StockLevel {
            total_activity: 50.0,
            total_volume_ml: 5.0,
            visible_vials: 2,
        };
        assert_eq!(level.volume_for(20.0), 2.0);
    }

    #[test]
    fn repeated_reads_identical() {
        let vials = vec![vial("a", 40.0, 4.0), vial("b", 30.0, 3.0)];
        let at = t0() + Duration::minutes(137);
        let first = visible_stock(&vials, TC99M, at).unwrap();
        for _ in 0..10 {
            assert_eq!(visible_stock(&vials, TC99M, at).unwrap(), first);
        }
    }

    proptest! {
        #[test]
        fn activity_monotonic_over_time(
            amount in 0.0f64..10_000.0,
            m1 in 0i64..100_000,
            m2 in 0i64..100_000,
        ) {
            let v = vial("p", amount, 1.0);
            let (lo, hi) = if m1 <= m2 { (m1, m2) } else { (m2, m1) };
            let a_lo = current_activity(&v, TC99M, t0() + Duration::minutes(lo)).unwrap();
            let a_hi = current_activity(&v, TC99M, t0() + Duration::minutes(hi)).unwrap();
            prop_assert!(a_hi <= a_lo);
        }

        #[test]
        fn stock_never_exceeds_unfiltered_sum(
            amounts in proptest::collection::vec(0.0f64..100.0, 0..12),
            minutes in 0i64..2_000,
        ) {
            let vials: Vec<Vial> = amounts
                .iter()
                .enumerate()
                .map(|(i, a)| vial(&format!("v{i}"), *a, 1.0))
                .collect();
            let at = t0() + Duration::minutes(minutes);
            let all: f64 = vials
                .iter()
                .map(|v| current_activity(v, TC99M, at).unwrap())
                .sum();
            let visible = visible_stock(&vials, TC99M, at).unwrap();
            prop_assert!(visible <= all + 1e-9);
        }
    }
}
