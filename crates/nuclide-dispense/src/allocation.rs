//! Highest-activity-first dose allocation.
//!
//! A requested draw is spread across vials in descending order of current
//! activity. Vials that are fully consumed, or left holding less than the
//! depletion epsilon, leave the inventory as waste booked at their activity
//! at removal; the dose share is kept on [`DepletedVial::drawn`]. Partially drawn vials
//! get a new calibration amount so that decaying it to the query time
//! yields exactly what is left in the vial.

use std::cmp::Reverse;

use chrono::{DateTime, Utc};
use nuclide_core::constants::{
    DEPLETION_EPSILON, RESIDUAL_WASTE_FRACTION, VISIBILITY_THRESHOLD, VOLUME_TOLERANCE_ML,
};
use nuclide_core::traits::DecayCalculator;
use nuclide_core::types::{Vial, WasteItem, WasteSource};
use nuclide_decay::engine::{DecayEngine, elapsed_hours};
use nuclide_decay::{StockLevel, stock_level, vial_activity};
use ordered_float::OrderedFloat;
use tracing::{debug, warn};

use crate::error::DispenseError;
use crate::ids::derive_id;
use crate::waste::retire_vial;

/// Thresholds governing allocation. Defaults are the department constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AllocationPolicy {
    /// Activity at or below which a vial counts as empty.
    pub depletion_epsilon: f64,
    /// Vials below this activity are left out of the stock check.
    pub visibility_threshold: f64,
    /// Share of each request booked as preparation residual.
    pub residual_fraction: f64,
}

impl Default for AllocationPolicy {
    fn default() -> Self {
        Self {
            depletion_epsilon: DEPLETION_EPSILON,
            visibility_threshold: VISIBILITY_THRESHOLD,
            residual_fraction: RESIDUAL_WASTE_FRACTION,
        }
    }
}

/// Activity taken from one vial.
#[derive(Debug, Clone, PartialEq)]
pub struct Draw {
    pub vial_id: String,
    pub activity: f64,
}

/// A vial removed by the withdrawal.
#[derive(Debug, Clone, PartialEq)]
pub struct DepletedVial {
    /// The vial as it was before the draw.
    pub vial: Vial,
    /// Its activity at the query time before anything was drawn.
    pub activity_before: f64,
    /// Activity drawn from it into the dose.
    pub drawn: f64,
}

/// Outcome of a successful withdrawal.
#[derive(Debug, Clone, PartialEq)]
pub struct Withdrawal {
    /// Activity requested (and drawn).
    pub requested: f64,
    /// Active vials after the draw, in their original order.
    pub updated_vials: Vec<Vial>,
    /// Vials removed from inventory, in the order they were visited.
    pub depleted_vials: Vec<DepletedVial>,
    /// One record per depleted vial carrying its activity at removal.
    pub waste_items: Vec<WasteItem>,
    /// Syringe/needle holdup, booked separately from vial stock.
    pub residual_waste: WasteItem,
    /// Per-vial breakdown of the dose, in draw order.
    pub draws: Vec<Draw>,
    /// Volume to draw at the current concentration (0 when untracked).
    pub volume_ml: f64,
}

impl Withdrawal {
    /// Sum of all draws.
    pub fn drawn_total(&self) -> f64 {
        self.draws.iter().map(|d| d.activity).sum()
    }

    /// Activity drawn from vials that left the inventory.
    pub fn drawn_from_depleted(&self) -> f64 {
        self.depleted_vials.iter().map(|d| d.drawn).sum()
    }

    /// All waste produced, including the preparation residual.
    pub fn all_waste(&self) -> impl Iterator<Item = &WasteItem> {
        self.waste_items.iter().chain(std::iter::once(&self.residual_waste))
    }
}

/// Decay-aware withdrawal allocator.
///
/// Sorts vials by current activity descending (stable, so ties keep list
/// order), then greedily draws until the request is met.
pub struct WithdrawalAllocator;

impl WithdrawalAllocator {
    /// Allocate `requested` activity across `vials` at time `at`.
    ///
    /// # Arguments
    /// - `vials` — the isotope's active vials
    /// - `requested` — activity to draw, in the department unit
    /// - `half_life_hours` — the isotope's half-life
    /// - `at` — query time for every decay computation
    /// - `policy` — epsilon, visibility and residual thresholds
    /// - `calc` — decay calculator
    ///
    /// Validation failures return before anything is computed, and the
    /// borrowed `vials` are never modified.
    pub fn allocate(
        vials: &[Vial],
        requested: f64,
        half_life_hours: f64,
        at: DateTime<Utc>,
        policy: &AllocationPolicy,
        calc: &dyn DecayCalculator,
    ) -> Result<Withdrawal, DispenseError> {
        if !requested.is_finite() || requested <= 0.0 {
            return Err(DispenseError::InvalidParameter(format!(
                "requested activity must be positive, got {requested}"
            )));
        }
        if let Some(v) = vials
            .iter()
            .find(|v| !v.initial_volume_ml.is_finite() || v.initial_volume_ml < 0.0)
        {
            return Err(DispenseError::InvalidParameter(format!(
                "vial {} has invalid volume {}",
                v.id, v.initial_volume_ml
            )));
        }

        let level = stock_level(calc, vials, half_life_hours, at, policy.visibility_threshold)?;
        if requested > level.total_activity {
            warn!(
                requested,
                available = level.total_activity,
                "withdrawal exceeds visible stock"
            );
            return Err(DispenseError::InsufficientStock {
                available: level.total_activity,
                requested,
            });
        }

        let volume_ml = check_volume(&level, requested)?;

        // (index into `vials`, current activity)
        let mut ranked: Vec<(usize, f64)> = Vec::with_capacity(vials.len());
        for (idx, vial) in vials.iter().enumerate() {
            ranked.push((idx, vial_activity(calc, vial, half_life_hours, at)?));
        }
        ranked.sort_by_key(|&(_, activity)| Reverse(OrderedFloat(activity)));

        let mut slots: Vec<Option<Vial>> = vials.iter().cloned().map(Some).collect();
        let mut depleted = Vec::new();
        let mut waste_items = Vec::new();
        let mut draws = Vec::new();
        let mut remaining = requested;

        for (idx, current) in ranked {
            if remaining <= 0.0 {
                break;
            }
            let vial = &vials[idx];

            if current <= policy.depletion_epsilon {
                debug!(vial = %vial.id, current, "skipping empty vial");
                waste_items.push(retire_vial(vial, current, half_life_hours, at, WasteSource::Vial));
                depleted.push(DepletedVial {
                    vial: vial.clone(),
                    activity_before: current,
                    drawn: 0.0,
                });
                slots[idx] = None;
                continue;
            }

            if current >= remaining {
                let left = current - remaining;
                draws.push(Draw {
                    vial_id: vial.id.clone(),
                    activity: remaining,
                });
                if left < policy.depletion_epsilon {
                    debug!(vial = %vial.id, current, left, "draw empties vial");
                    waste_items.push(retire_vial(vial, current, half_life_hours, at, WasteSource::Vial));
                    depleted.push(DepletedVial {
                        vial: vial.clone(),
                        activity_before: current,
                        drawn: remaining,
                    });
                    slots[idx] = None;
                } else {
                    let elapsed = elapsed_hours(vial.received_at, at);
                    let amount = calc.calibrated_amount(left, elapsed, half_life_hours)?;
                    debug!(vial = %vial.id, current, left, amount, "partial draw");
                    if let Some(slot) = slots[idx].as_mut() {
                        slot.initial_amount = amount.max(0.0);
                    }
                }
                remaining = 0.0;
                break;
            }

            debug!(vial = %vial.id, current, remaining, "consuming whole vial");
            draws.push(Draw {
                vial_id: vial.id.clone(),
                activity: current,
            });
            waste_items.push(retire_vial(vial, current, half_life_hours, at, WasteSource::Vial));
            depleted.push(DepletedVial {
                vial: vial.clone(),
                activity_before: current,
                drawn: current,
            });
            slots[idx] = None;
            remaining -= current;
        }

        // Float slack when the request equals the whole visible stock.
        if remaining > 1e-9 * requested.max(1.0) {
            return Err(DispenseError::InsufficientStock {
                available: requested - remaining,
                requested,
            });
        }

        let residual_waste = residual_item(requested, &draws, vials, half_life_hours, at, policy);

        Ok(Withdrawal {
            requested,
            updated_vials: slots.into_iter().flatten().collect(),
            depleted_vials: depleted,
            waste_items,
            residual_waste,
            draws,
            volume_ml,
        })
    }
}

/// Volume to draw for `requested`, rejected when it exceeds the volume on hand.
///
/// With `requested` already capped by the visible activity this cannot fire
/// for a level built by [`stock_level`]; it guards levels assembled elsewhere.
pub(crate) fn check_volume(level: &StockLevel, requested: f64) -> Result<f64, DispenseError> {
    let volume_ml = level.volume_for(requested);
    if level.total_volume_ml > 0.0 && volume_ml > level.total_volume_ml + VOLUME_TOLERANCE_ML {
        warn!(
            required_ml = volume_ml,
            available_ml = level.total_volume_ml,
            "withdrawal exceeds vial volume"
        );
        return Err(DispenseError::InsufficientVolume {
            available_ml: level.total_volume_ml,
            required_ml: volume_ml,
        });
    }
    Ok(volume_ml)
}

fn residual_item(
    requested: f64,
    draws: &[Draw],
    vials: &[Vial],
    half_life_hours: f64,
    at: DateTime<Utc>,
    policy: &AllocationPolicy,
) -> WasteItem {
    // Id covers the drawn vials' prior amounts so repeated identical
    // requests at the same instant still get distinct ids.
    let mut parts: Vec<Vec<u8>> = vec![
        requested.to_le_bytes().to_vec(),
        at.timestamp_millis().to_le_bytes().to_vec(),
    ];
    for draw in draws {
        parts.push(draw.vial_id.as_bytes().to_vec());
        if let Some(v) = vials.iter().find(|v| v.id == draw.vial_id) {
            parts.push(v.initial_amount.to_le_bytes().to_vec());
        }
    }
    let refs: Vec<&[u8]> = parts.iter().map(Vec::as_slice).collect();

    WasteItem {
        id: derive_id("wst", &refs),
        activity: requested * policy.residual_fraction,
        half_life_hours,
        disposed_at: at,
        source: WasteSource::Preparation,
        description: format!("Syringe residual from {requested:.3} dose"),
    }
}

/// Allocate a withdrawal with the default policy and decay engine.
pub fn allocate_withdrawal(
    vials: &[Vial],
    requested: f64,
    half_life_hours: f64,
    at: DateTime<Utc>,
) -> Result<Withdrawal, DispenseError> {
    WithdrawalAllocator::allocate(
        vials,
        requested,
        half_life_hours,
        at,
        &AllocationPolicy::default(),
        &DecayEngine,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use nuclide_decay::current_activity;
    use proptest::prelude::*;

    const TC99M: f64 = 6.0;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
    }

    fn vial(id: &str, amount: f64, volume: f64) -> Vial {
        Vial::new(id, amount, volume, t0(), format!("label-{id}"))
    }

    fn total_at(vials: &[Vial], at: DateTime<Utc>) -> f64 {
        vials.iter().map(|v| current_activity(v, TC99M, at).unwrap()).sum()
    }

    #[test]
    fn two_vial_split() {
        let vials = vec![vial("a", 40.0, 4.0), vial("b", 30.0, 3.0)];
        let w = allocate_withdrawal(&vials, 50.0, TC99M, t0()).unwrap();

        assert_eq!(w.depleted_vials.len(), 1);
        assert_eq!(w.depleted_vials[0].vial.id, "a");
        assert_eq!(w.depleted_vials[0].activity_before, 40.0);
        assert_eq!(w.depleted_vials[0].drawn, 40.0);

        assert_eq!(w.updated_vials.len(), 1);
        assert_eq!(w.updated_vials[0].id, "b");
        assert!((current_activity(&w.updated_vials[0], TC99M, t0()).unwrap() - 20.0).abs() < 1e-9);

        assert_eq!(w.waste_items.len(), 1);
        assert_eq!(w.waste_items[0].activity, 40.0);
        assert_eq!(w.waste_items[0].description, "Retired vial: label-a");

        let draws: Vec<(&str, f64)> = w.draws.iter().map(|d| (d.vial_id.as_str(), d.activity)).collect();
        assert_eq!(draws, [("a", 40.0), ("b", 10.0)]);

        let accounted = total_at(&w.updated_vials, t0())
            + w.waste_items.iter().map(|i| i.activity).sum::<f64>()
            + w.requested
            - w.drawn_from_depleted();
        assert!((accounted - 70.0).abs() < 1e-9);
    }

    #[test]
    fn highest_activity_first_regardless_of_order() {
        let vials = vec![vial("small", 5.0, 1.0), vial("big", 50.0, 5.0)];
        let w = allocate_withdrawal(&vials, 10.0, TC99M, t0()).unwrap();
        assert_eq!(w.draws.len(), 1);
        assert_eq!(w.draws[0].vial_id, "big");
        // List order preserved in the output.
        let ids: Vec<&str> = w.updated_vials.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, ["small", "big"]);
    }

    #[test]
    fn ties_keep_list_order() {
        let vials = vec![vial("first", 20.0, 2.0), vial("second", 20.0, 2.0)];
        let w = allocate_withdrawal(&vials, 5.0, TC99M, t0()).unwrap();
        assert_eq!(w.draws[0].vial_id, "first");
    }

    #[test]
    fn partial_draw_recalibrates_after_decay() {
        // Received 6 h ago at 100, now 50. Draw 30 leaves 20.
        let v = Vial::new("a", 100.0, 10.0, t0(), "bulk");
        let at = t0() + Duration::hours(6);
        let w = allocate_withdrawal(&[v], 30.0, TC99M, at).unwrap();
        let updated = &w.updated_vials[0];
        assert!((updated.initial_amount - 40.0).abs() < 1e-9);
        assert_eq!(updated.received_at, t0());
        assert!((current_activity(updated, TC99M, at).unwrap() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn near_empty_remainder_becomes_waste() {
        let vials = vec![vial("a", 10.0, 1.0)];
        let w = allocate_withdrawal(&vials, 9.995, TC99M, t0()).unwrap();
        assert!(w.updated_vials.is_empty());
        assert_eq!(w.depleted_vials.len(), 1);
        assert_eq!(w.waste_items[0].activity, 10.0);
        assert!((w.depleted_vials[0].drawn - 9.995).abs() < 1e-12);
    }

    #[test]
    fn consumed_vial_wasted_at_removal_activity() {
        // 6 h after receipt: a = 40, b = 30. Drawing 50 empties a.
        let vials = vec![vial("a", 80.0, 4.0), vial("b", 60.0, 3.0)];
        let at = t0() + Duration::hours(6);
        let w = allocate_withdrawal(&vials, 50.0, TC99M, at).unwrap();
        let wasted: Vec<f64> = w.waste_items.iter().map(|i| i.activity).collect();
        assert_eq!(wasted.len(), 1);
        assert!((wasted[0] - 40.0).abs() < 1e-9);
        assert_eq!(w.waste_items[0].source, WasteSource::Vial);
    }

    #[test]
    fn volume_guard_rejects_excess() {
        let level = StockLevel {
            total_activity: 10.0,
            total_volume_ml: 1.0,
            visible_vials: 1,
        };
        let err = check_volume(&level, 20.0).unwrap_err();
        assert_eq!(
            err,
            DispenseError::InsufficientVolume {
                available_ml: 1.0,
                required_ml: 2.0
            }
        );
        assert_eq!(check_volume(&level, 5.0).unwrap(), 0.5);
    }

    #[test]
    fn volume_guard_skipped_when_untracked() {
        let level = StockLevel {
            total_activity: 10.0,
            total_volume_ml: 0.0,
            visible_vials: 1,
        };
        assert_eq!(check_volume(&level, 20.0).unwrap(), 0.0);
    }

    #[test]
    fn whole_stock_can_be_drawn() {
        let vials = vec![vial("a", 40.0, 4.0), vial("b", 30.0, 3.0)];
        let w = allocate_withdrawal(&vials, 70.0, TC99M, t0()).unwrap();
        assert!(w.updated_vials.is_empty());
        assert_eq!(w.waste_items.len(), 2);
        assert!((w.volume_ml - 7.0).abs() < 1e-9);
    }

    #[test]
    fn untouched_vials_unchanged() {
        let vials = vec![vial("a", 40.0, 4.0), vial("b", 30.0, 3.0), vial("c", 1.0, 1.0)];
        let w = allocate_withdrawal(&vials, 5.0, TC99M, t0()).unwrap();
        assert_eq!(w.updated_vials[1], vials[1]);
        assert_eq!(w.updated_vials[2], vials[2]);
    }

    #[test]
    fn insufficient_stock_below_epsilon() {
        let vials = vec![vial("a", 0.005, 1.0)];
        let err = allocate_withdrawal(&vials, 5.0, TC99M, t0()).unwrap_err();
        assert_eq!(
            err,
            DispenseError::InsufficientStock {
                available: 0.0,
                requested: 5.0
            }
        );
    }

    #[test]
    fn insufficient_stock_counts_only_visible() {
        // 0.05 is above epsilon but below the 0.1 visibility threshold.
        let vials = vec![vial("a", 10.0, 1.0), vial("b", 0.05, 1.0)];
        let err = allocate_withdrawal(&vials, 10.03, TC99M, t0()).unwrap_err();
        assert!(matches!(err, DispenseError::InsufficientStock { .. }));
    }

    #[test]
    fn insufficient_stock_after_decay() {
        let vials = vec![vial("a", 40.0, 4.0)];
        let err = allocate_withdrawal(&vials, 30.0, TC99M, t0() + Duration::hours(6)).unwrap_err();
        assert!(matches!(err, DispenseError::InsufficientStock { requested, .. } if requested == 30.0));
    }

    #[test]
    fn empty_collection_insufficient() {
        let err = allocate_withdrawal(&[], 1.0, TC99M, t0()).unwrap_err();
        assert!(matches!(err, DispenseError::InsufficientStock { .. }));
    }

    #[test]
    fn non_positive_request_rejected() {
        let vials = vec![vial("a", 40.0, 4.0)];
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = allocate_withdrawal(&vials, bad, TC99M, t0()).unwrap_err();
            assert!(matches!(err, DispenseError::InvalidParameter(_)), "{bad}");
        }
    }

    #[test]
    fn bad_half_life_rejected() {
        let vials = vec![vial("a", 40.0, 4.0)];
        let err = allocate_withdrawal(&vials, 1.0, 0.0, t0()).unwrap_err();
        assert!(matches!(err, DispenseError::Decay(_)));
    }

    #[test]
    fn negative_volume_rejected() {
        let vials = vec![vial("a", 40.0, -4.0)];
        let err = allocate_withdrawal(&vials, 1.0, TC99M, t0()).unwrap_err();
        assert!(matches!(err, DispenseError::InvalidParameter(_)));
    }

    #[test]
    fn volume_follows_concentration() {
        let vials = vec![vial("a", 40.0, 4.0), vial("b", 30.0, 3.0)];
        let w = allocate_withdrawal(&vials, 35.0, TC99M, t0()).unwrap();
        assert!((w.volume_ml - 3.5).abs() < 1e-12);
    }

    #[test]
    fn volume_untracked_is_zero() {
        let vials = vec![vial("a", 40.0, 0.0)];
        let w = allocate_withdrawal(&vials, 10.0, TC99M, t0()).unwrap();
        assert_eq!(w.volume_ml, 0.0);
    }

    #[test]
    fn residual_is_five_percent_of_request() {
        let vials = vec![vial("a", 40.0, 4.0)];
        let w = allocate_withdrawal(&vials, 20.0, TC99M, t0()).unwrap();
        assert!((w.residual_waste.activity - 1.0).abs() < 1e-12);
        assert_eq!(w.residual_waste.source, WasteSource::Preparation);
        assert_eq!(w.all_waste().count(), 1);
    }

    #[test]
    fn custom_policy_changes_residual() {
        let vials = vec![vial("a", 40.0, 4.0)];
        let policy = AllocationPolicy {
            residual_fraction: 0.1,
            ..AllocationPolicy::default()
        };
        let w = WithdrawalAllocator::allocate(&vials, 20.0, TC99M, t0(), &policy, &DecayEngine)
            .unwrap();
        assert!((w.residual_waste.activity - 2.0).abs() < 1e-12);
    }

    #[test]
    fn empty_vials_reached_during_walk_are_retired() {
        // Below-visibility vial "b" (0.05) supplies the tail; "c" is already empty.
        let vials = vec![vial("a", 10.0, 1.0), vial("b", 0.05, 1.0), vial("c", 0.004, 1.0)];
        let w = allocate_withdrawal(&vials, 10.0, TC99M, t0()).unwrap();
        // Request met by "a" alone; "b" and "c" never visited.
        assert_eq!(w.updated_vials.len(), 2);
        assert_eq!(w.depleted_vials.len(), 1);
    }

    #[test]
    fn residual_ids_distinct_for_repeat_requests() {
        let vials = vec![vial("a", 40.0, 4.0)];
        let w1 = allocate_withdrawal(&vials, 5.0, TC99M, t0()).unwrap();
        let w2 = allocate_withdrawal(&w1.updated_vials, 5.0, TC99M, t0()).unwrap();
        assert_ne!(w1.residual_waste.id, w2.residual_waste.id);
    }

    proptest! {
        #[test]
        fn conservation_and_no_negative_stock(
            amounts in proptest::collection::vec(0.0f64..200.0, 1..10),
            fraction in 0.01f64..1.0,
            minutes in 0i64..1_500,
        ) {
            let vials: Vec<Vial> = amounts
                .iter()
                .enumerate()
                .map(|(i, a)| vial(&format!("v{i}"), *a, 2.0))
                .collect();
            let at = t0() + Duration::minutes(minutes);
            let stock = nuclide_decay::visible_stock(&vials, TC99M, at).unwrap();
            prop_assume!(stock > 0.0);
            let requested = stock * fraction;

            let w = allocate_withdrawal(&vials, requested, TC99M, at).unwrap();

            let before = total_at(&vials, at);
            let after = total_at(&w.updated_vials, at)
                + w.waste_items.iter().map(|i| i.activity).sum::<f64>()
                + w.drawn_total()
                - w.drawn_from_depleted();
            prop_assert!((before - after).abs() <= 1e-6 * before.max(1.0),
                "before {} after {}", before, after);
            prop_assert!((w.drawn_total() - requested).abs() <= 1e-9 * requested.max(1.0));
            for v in &w.updated_vials {
                prop_assert!(v.initial_amount >= 0.0);
            }
            prop_assert_eq!(
                w.updated_vials.len() + w.depleted_vials.len(),
                vials.len()
            );
            prop_assert_eq!(w.waste_items.len(), w.depleted_vials.len());
        }

        #[test]
        fn over_request_rejected(
            amounts in proptest::collection::vec(0.0f64..200.0, 0..10),
            extra in 0.001f64..100.0,
        ) {
            let vials: Vec<Vial> = amounts
                .iter()
                .enumerate()
                .map(|(i, a)| vial(&format!("v{i}"), *a, 2.0))
                .collect();
            let stock = nuclide_decay::visible_stock(&vials, TC99M, t0()).unwrap();
            let err = allocate_withdrawal(&vials, stock + extra, TC99M, t0()).unwrap_err();
            let is_insufficient = matches!(err, DispenseError::InsufficientStock { .. });
            prop_assert!(is_insufficient);
        }
    }
}
