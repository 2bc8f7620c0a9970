//! Decay-in-storage of retired activity.
//!
//! Waste is held until [`DECAY_IN_STORAGE_HALF_LIVES`] half-lives have
//! passed since disposal, after which it may be released as ordinary waste.

use chrono::{DateTime, Duration, Utc};
use nuclide_core::constants::{DECAY_IN_STORAGE_HALF_LIVES, MILLIS_PER_HOUR};
use nuclide_core::error::DecayError;
use nuclide_core::traits::DecayCalculator;
use nuclide_core::types::WasteItem;

use crate::engine::{DecayEngine, check_half_life, elapsed_hours};

/// Activity left in a waste item at `at`.
pub fn waste_activity_at(item: &WasteItem, at: DateTime<Utc>) -> Result<f64, DecayError> {
    DecayEngine.activity_at(
        item.activity,
        elapsed_hours(item.disposed_at, at),
        item.half_life_hours,
    )
}

/// Earliest instant the item may leave decay-in-storage.
pub fn release_time(item: &WasteItem) -> Result<DateTime<Utc>, DecayError> {
    check_half_life(item.half_life_hours)?;
    let hold_ms = item.half_life_hours * DECAY_IN_STORAGE_HALF_LIVES * MILLIS_PER_HOUR;
    if hold_ms >= i64::MAX as f64 {
        return Err(DecayError::InvalidParameter(format!(
            "storage period for half-life {} h is out of range",
            item.half_life_hours
        )));
    }
    Duration::try_milliseconds(hold_ms.ceil() as i64)
        .and_then(|hold| item.disposed_at.checked_add_signed(hold))
        .ok_or_else(|| {
            DecayError::InvalidParameter(format!(
                "storage period for half-life {} h is out of range",
                item.half_life_hours
            ))
        })
}

/// Whether the item has been held long enough to release at `at`.
pub fn is_releasable(item: &WasteItem, at: DateTime<Utc>) -> Result<bool, DecayError> {
    Ok(at >= release_time(item)?)
}
