//! Invariants that must hold across arbitrary sequences of inventory
//! operations: no negative stock, activity accounted for on every
//! withdrawal, and rejected operations leave no trace.

use nuclide_core::traits::Clock;
use nuclide_core::types::WasteSource;
use nuclide_core::units::{Activity, DoseUnit};
use nuclide_tests::helpers::*;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Receive { amount: f64, volume_ml: f64 },
    Withdraw { amount: f64 },
    Advance { minutes: i64 },
    Sweep,
    Dispose { index: usize },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0.5f64..200.0, 0.0f64..20.0).prop_map(|(amount, volume_ml)| Op::Receive { amount, volume_ml }),
        (0.01f64..150.0).prop_map(|amount| Op::Withdraw { amount }),
        (1i64..1_440).prop_map(|minutes| Op::Advance { minutes }),
        Just(Op::Sweep),
        (0usize..8).prop_map(|index| Op::Dispose { index }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn inventory_invariants_hold(ops in prop::collection::vec(op(), 1..40)) {
        let (mgr, clock) = memory_manager();

        for op in ops {
            let now = clock.now();
            let vials_before = mgr.vials("Tc-99m").unwrap();
            let waste_before = mgr.waste_log().len();
            let doses_before = mgr.dose_log().len();
            let total_before = total_activity(&vials_before, TC99M_HALF_LIFE, now);

            let outcome = match &op {
                Op::Receive { amount, volume_ml } => mgr
                    .receive_vial("Tc-99m", *amount, *volume_ml, "prop", None)
                    .map(|_| ()),
                Op::Withdraw { amount } => mgr.withdraw("Tc-99m", *amount, None).map(|_| ()),
                Op::Advance { minutes } => {
                    clock.advance(chrono::Duration::minutes(*minutes));
                    Ok(())
                }
                Op::Sweep => mgr.sweep("Tc-99m").map(|_| ()),
                Op::Dispose { index } => match vials_before.get(*index) {
                    Some(v) => mgr.dispose_vial("Tc-99m", &v.id).map(|_| ()),
                    None => mgr.dispose_vial("Tc-99m", "missing").map(|_| ()),
                },
            };

            let vials_after = mgr.vials("Tc-99m").unwrap();
            match outcome {
                Err(_) => {
                    prop_assert_eq!(&vials_after, &vials_before);
                    prop_assert_eq!(mgr.waste_log().len(), waste_before);
                    prop_assert_eq!(mgr.dose_log().len(), doses_before);
                }
                Ok(()) => {
                    if let Op::Withdraw { amount } = op {
                        let new_waste: f64 = mgr.waste_log()[waste_before..]
                            .iter()
                            .filter(|w| w.source != WasteSource::Preparation)
                            .map(|w| w.activity)
                            .sum();
                        let removed: Vec<_> = vials_before
                            .iter()
                            .filter(|v| !vials_after.iter().any(|a| a.id == v.id))
                            .cloned()
                            .collect();
                        let removed_activity = total_activity(&removed, TC99M_HALF_LIFE, now);
                        let tol = 1e-6 * total_before.max(1.0);
                        // Removed vials are wasted at their full activity.
                        prop_assert!(
                            (new_waste - removed_activity).abs() <= tol,
                            "waste {} removed {}", new_waste, removed_activity
                        );
                        // The part of the dose taken from removed vials is counted twice.
                        let total_after = total_activity(&vials_after, TC99M_HALF_LIFE, now);
                        let accounted = total_after + new_waste + amount;
                        prop_assert!(
                            accounted >= total_before - tol
                                && accounted <= total_before + amount.min(new_waste) + tol,
                            "before {} accounted {}", total_before, accounted
                        );
                    }
                }
            }

            for v in &vials_after {
                prop_assert!(v.initial_amount >= 0.0, "negative vial {:?}", v);
            }
            let report = mgr.stock_report("Tc-99m").unwrap();
            prop_assert!(report.total >= 0.0);
        }
    }

    #[test]
    fn withdrawal_never_exceeds_visible_stock(
        amounts in prop::collection::vec(1.0f64..100.0, 1..6),
        fraction in 1.01f64..3.0,
    ) {
        let (mgr, _) = memory_manager();
        for a in &amounts {
            mgr.receive_vial("Tc-99m", *a, 1.0, "v", None).unwrap();
        }
        let stock = mgr.stock_report("Tc-99m").unwrap().total;
        prop_assert!(mgr.withdraw("Tc-99m", stock * fraction, None).is_err());
        prop_assert!(mgr.dose_log().is_empty());
    }

    #[test]
    fn department_unit_round_trip(micro in 0u64..(u64::MAX / 37)) {
        let mci = Activity::from_micro(micro, DoseUnit::Millicurie);
        let back = mci
            .to_unit(DoseUnit::Megabecquerel)
            .and_then(|mbq| mbq.to_unit(DoseUnit::Millicurie))
            .unwrap();
        prop_assert_eq!(back, mci);
    }
}
