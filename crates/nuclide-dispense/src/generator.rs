//! Generator elution and eluate retirement.
//!
//! An elution mints a fresh vial calibrated at the elution time. When the
//! generator is replaced, every vial it produced is retired to waste at
//! its current decayed activity.

use chrono::{DateTime, Utc};
use nuclide_core::constants::ELUTION_LABEL;
use nuclide_core::types::{Vial, WasteItem, WasteSource};
use nuclide_decay::engine::DecayEngine;
use nuclide_decay::vial_activity;
use tracing::debug;

use crate::error::DispenseError;
use crate::ids::vial_id;
use crate::waste::{Retirement, retire_vial};

/// Build the vial produced by an elution of `activity` in `volume_ml` at `at`.
///
/// `taken` lists ids already in use; the minted id avoids them.
pub fn elution_vial(
    activity: f64,
    volume_ml: f64,
    at: DateTime<Utc>,
    taken: &[Vial],
) -> Result<Vial, DispenseError> {
    if !activity.is_finite() || activity <= 0.0 {
        return Err(DispenseError::InvalidParameter(format!(
            "elution activity must be positive, got {activity}"
        )));
    }
    if !volume_ml.is_finite() || volume_ml < 0.0 {
        return Err(DispenseError::InvalidParameter(format!(
            "elution volume must be non-negative, got {volume_ml}"
        )));
    }

    let id = vial_id("elu", at, activity, volume_ml, taken);

    let label = format!("{ELUTION_LABEL} {}", at.format("%Y-%m-%d %H:%M"));
    Ok(Vial::new(id, activity, volume_ml, at, label))
}

/// Prepend a freshly eluted vial to `vials`.
pub fn allocate_elution(
    vials: &[Vial],
    activity: f64,
    volume_ml: f64,
    at: DateTime<Utc>,
) -> Result<Vec<Vial>, DispenseError> {
    let fresh = elution_vial(activity, volume_ml, at, vials)?;
    debug!(vial = %fresh.id, activity, volume_ml, "eluted");
    let mut out = Vec::with_capacity(vials.len() + 1);
    out.push(fresh);
    out.extend_from_slice(vials);
    Ok(out)
}

/// One waste record per vial at its current activity.
pub fn retire_all_vials(
    vials: &[Vial],
    half_life_hours: f64,
    at: DateTime<Utc>,
) -> Result<Vec<WasteItem>, DispenseError> {
    vials
        .iter()
        .map(|vial| {
            let activity = vial_activity(&DecayEngine, vial, half_life_hours, at)?;
            Ok(retire_vial(vial, activity, half_life_hours, at, WasteSource::Vial))
        })
        .collect()
}

/// Retire generator-eluted vials and keep the rest.
pub fn retire_generator_vials(
    vials: &[Vial],
    half_life_hours: f64,
    at: DateTime<Utc>,
) -> Result<Retirement, DispenseError> {
    let (eluted, remaining): (Vec<Vial>, Vec<Vial>) =
        vials.iter().cloned().partition(Vial::is_generator_eluted);
    let waste_items = retire_all_vials(&eluted, half_life_hours, at)?;
    Ok(Retirement {
        remaining,
        waste_items,
    })
}
