//! Waste transitions: depletion sweep and manual disposal.
//!
//! A vial never leaves the active collection without a [`WasteItem`]
//! recording the activity it still held.

use chrono::{DateTime, Utc};
use nuclide_core::types::{Vial, WasteItem, WasteSource};
use nuclide_decay::engine::DecayEngine;
use nuclide_decay::vial_activity;
use tracing::debug;

use crate::error::DispenseError;
use crate::ids::waste_id;

/// Vials kept and the waste records for the ones removed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Retirement {
    /// Vials still active, in their original order.
    pub remaining: Vec<Vial>,
    /// One waste record per removed vial.
    pub waste_items: Vec<WasteItem>,
}

/// Build the waste record for a vial leaving inventory.
pub(crate) fn retire_vial(
    vial: &Vial,
    activity: f64,
    half_life_hours: f64,
    at: DateTime<Utc>,
    source: WasteSource,
) -> WasteItem {
    let description = match source {
        WasteSource::Vial => format!("Retired vial: {}", vial.label),
        WasteSource::Manual => format!("Disposed vial: {}", vial.label),
        WasteSource::Preparation => format!("Preparation residual: {}", vial.label),
    };
    WasteItem {
        id: waste_id(&vial.id, &source.to_string(), at),
        activity: activity.max(0.0),
        half_life_hours,
        disposed_at: at,
        source,
        description,
    }
}

/// Remove every vial whose activity at `at` has fallen below `epsilon`.
pub fn sweep_depleted(
    vials: &[Vial],
    half_life_hours: f64,
    at: DateTime<Utc>,
    epsilon: f64,
) -> Result<Retirement, DispenseError> {
    let mut out = Retirement::default();
    for vial in vials {
        let activity = vial_activity(&DecayEngine, vial, half_life_hours, at)?;
        if activity < epsilon {
            debug!(vial = %vial.id, activity, "sweeping depleted vial");
            out.waste_items
                .push(retire_vial(vial, activity, half_life_hours, at, WasteSource::Vial));
        } else {
            out.remaining.push(vial.clone());
        }
    }
    Ok(out)
}

/// Dispose of the vial `id` by hand at its current activity.
pub fn dispose_vial(
    vials: &[Vial],
    id: &str,
    half_life_hours: f64,
    at: DateTime<Utc>,
) -> Result<(Vec<Vial>, WasteItem), DispenseError> {
    let vial = vials
        .iter()
        .find(|v| v.id == id)
        .ok_or_else(|| DispenseError::VialNotFound(id.to_string()))?;
    let activity = vial_activity(&DecayEngine, vial, half_life_hours, at)?;
    let item = retire_vial(vial, activity, half_life_hours, at, WasteSource::Manual);
    let remaining = vials.iter().filter(|v| v.id != id).cloned().collect();
    Ok((remaining, item))
}
