//! Shared fixtures for the integration tests.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use nuclide_core::constants::ELUTION_LABEL;
use nuclide_core::types::{Isotope, Vial};
use nuclide_decay::current_activity;
use nuclide_inventory::{FixedClock, InventoryConfig, InventoryManager, JsonStore, MemoryStore};

/// Tc-99m rounded to a whole number of hours so expected values stay exact.
pub const TC99M_HALF_LIFE: f64 = 6.0;

/// Fixed reference instant used by every scenario.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
}

pub fn hours(h: i64) -> Duration {
    Duration::hours(h)
}

/// A vial calibrated at [`t0`].
pub fn vial(id: &str, amount: f64, volume_ml: f64) -> Vial {
    Vial::new(id, amount, volume_ml, t0(), format!("Vial {id}"))
}

/// A generator eluate calibrated at [`t0`].
pub fn eluate(id: &str, amount: f64) -> Vial {
    Vial::new(id, amount, 5.0, t0(), format!("{ELUTION_LABEL} {id}"))
}

/// Sum of current activities at `at`.
pub fn total_activity(vials: &[Vial], half_life_hours: f64, at: DateTime<Utc>) -> f64 {
    vials
        .iter()
        .map(|v| current_activity(v, half_life_hours, at).unwrap())
        .sum()
}

/// Manager over an in-memory store with Tc-99m registered, clock at [`t0`].
pub fn memory_manager() -> (InventoryManager, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::new(t0()));
    let mgr = InventoryManager::open(
        InventoryConfig::default(),
        Arc::new(MemoryStore::new()),
        clock.clone(),
    )
    .unwrap();
    mgr.register_isotope(Isotope::new("Tc-99m", TC99M_HALF_LIFE))
        .unwrap();
    (mgr, clock)
}

/// Manager over a [`JsonStore`] rooted at `dir`.
pub fn json_manager(dir: &Path, clock: Arc<FixedClock>) -> InventoryManager {
    let config = InventoryConfig {
        data_dir: dir.to_path_buf(),
        ..InventoryConfig::default()
    };
    let store = JsonStore::open(config.store_dir()).unwrap();
    InventoryManager::open(config, Arc::new(store), clock).unwrap()
}
