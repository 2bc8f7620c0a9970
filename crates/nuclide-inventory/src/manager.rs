//! Inventory manager: the single writer over every isotope ledger.
//!
//! Ledgers live in a [`DashMap`] keyed by isotope name. Each mutating
//! operation holds its isotope's entry for the whole compute, persist and
//! swap sequence, so two withdrawals of the same isotope never interleave
//! while different isotopes proceed in parallel. The pure engine computes
//! the next ledger from a borrowed one; the store commit happens next, and
//! only a successful commit replaces the in-memory ledger and extends the
//! waste and dose logs. Any failure leaves both memory and disk as they were.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use nuclide_core::traits::{Clock, DecayCalculator, InventoryStore};
use nuclide_core::types::{DoseRecord, Generator, Isotope, IsotopeLedger, Vial, WasteItem};
use nuclide_core::units::DoseUnit;
use nuclide_decay::{DecayEngine, is_releasable, stock_level};
use nuclide_dispense::ids::{derive_id, vial_id};
use nuclide_dispense::{
    DispenseError, WithdrawalAllocator, allocate_elution, dispose_vial, retire_generator_vials,
    sweep_depleted,
};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::SystemClock;
use crate::config::InventoryConfig;
use crate::error::InventoryError;
use crate::store::JsonStore;

/// Snapshot of one isotope's usable stock.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockReport {
    pub isotope: String,
    pub at: DateTime<Utc>,
    pub unit: DoseUnit,
    /// Decayed activity over vials at or above the visibility threshold.
    pub total: f64,
    /// Liquid volume of those vials.
    pub volume_ml: f64,
    /// Activity per mL, when any volume is tracked.
    pub concentration: Option<f64>,
    pub vial_count: usize,
    pub low_stock: bool,
}

/// Output of a ledger mutation, applied only after the store accepts it.
struct Change<T> {
    ledger: IsotopeLedger,
    waste: Vec<WasteItem>,
    doses: Vec<DoseRecord>,
    value: T,
}

impl<T> Change<T> {
    fn new(ledger: IsotopeLedger, value: T) -> Self {
        Self {
            ledger,
            waste: Vec::new(),
            doses: Vec::new(),
            value,
        }
    }
}

pub struct InventoryManager {
    ledgers: DashMap<String, IsotopeLedger>,
    waste: Mutex<Vec<WasteItem>>,
    doses: Mutex<Vec<DoseRecord>>,
    store: Arc<dyn InventoryStore>,
    clock: Arc<dyn Clock>,
    engine: DecayEngine,
    config: InventoryConfig,
}

impl InventoryManager {
    /// Load every ledger and the waste/dose history from `store`.
    pub fn open(
        config: InventoryConfig,
        store: Arc<dyn InventoryStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, InventoryError> {
        config.validate()?;
        let ledgers = DashMap::new();
        for ledger in store.load_ledgers()? {
            ledgers.insert(ledger.isotope.name.clone(), ledger);
        }
        let waste = store.load_waste()?;
        let doses = store.load_doses()?;
        info!(
            isotopes = ledgers.len(),
            waste = waste.len(),
            doses = doses.len(),
            "inventory loaded"
        );
        Ok(Self {
            ledgers,
            waste: Mutex::new(waste),
            doses: Mutex::new(doses),
            store,
            clock,
            engine: DecayEngine::new(),
            config,
        })
    }

    /// Open a [`JsonStore`] under `config.store_dir()` with the wall clock.
    pub fn with_json_store(config: InventoryConfig) -> Result<Self, InventoryError> {
        let store = JsonStore::open(config.store_dir())?;
        Self::open(config, Arc::new(store), Arc::new(SystemClock))
    }

    pub fn config(&self) -> &InventoryConfig {
        &self.config
    }

    /// Registered isotopes, sorted by name.
    pub fn isotopes(&self) -> Vec<Isotope> {
        let mut out: Vec<Isotope> = self
            .ledgers
            .iter()
            .map(|entry| entry.value().isotope.clone())
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// Start tracking `isotope` with an empty ledger.
    pub fn register_isotope(&self, isotope: Isotope) -> Result<(), InventoryError> {
        if isotope.name.trim().is_empty() {
            return Err(DispenseError::InvalidParameter("isotope name is empty".into()).into());
        }
        self.engine.decay_factor(0.0, isotope.half_life_hours)?;

        match self.ledgers.entry(isotope.name.clone()) {
            Entry::Occupied(_) => Err(InventoryError::DuplicateIsotope(isotope.name)),
            Entry::Vacant(slot) => {
                let ledger = IsotopeLedger::new(isotope);
                self.store.commit(&ledger, &[], &[])?;
                info!(
                    isotope = %ledger.isotope.name,
                    half_life_hours = ledger.isotope.half_life_hours,
                    "registered isotope"
                );
                slot.insert(ledger);
                Ok(())
            }
        }
    }

    /// Active vials of `isotope`.
    pub fn vials(&self, isotope: &str) -> Result<Vec<Vial>, InventoryError> {
        self.ledgers
            .get(isotope)
            .map(|ledger| ledger.vials.clone())
            .ok_or_else(|| InventoryError::UnknownIsotope(isotope.to_string()))
    }

    /// The generator currently installed for `isotope`, if any.
    pub fn generator(&self, isotope: &str) -> Result<Option<Generator>, InventoryError> {
        self.ledgers
            .get(isotope)
            .map(|ledger| ledger.generator.clone())
            .ok_or_else(|| InventoryError::UnknownIsotope(isotope.to_string()))
    }

    /// Book in a delivered vial.
    ///
    /// `calibrated_at` is the reference time printed on the vial; it
    /// defaults to now.
    pub fn receive_vial(
        &self,
        isotope: &str,
        amount: f64,
        volume_ml: f64,
        label: &str,
        calibrated_at: Option<DateTime<Utc>>,
    ) -> Result<Vial, InventoryError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(DispenseError::InvalidParameter(format!(
                "received activity must be positive, got {amount}"
            ))
            .into());
        }
        if !volume_ml.is_finite() || volume_ml < 0.0 {
            return Err(DispenseError::InvalidParameter(format!(
                "received volume must be non-negative, got {volume_ml}"
            ))
            .into());
        }

        let vial = self.mutate(isotope, |ledger, now| {
            let at = calibrated_at.unwrap_or(now);
            let id = vial_id("vial", at, amount, volume_ml, &ledger.vials);
            let vial = Vial::new(id, amount, volume_ml, at, label);
            let mut next = ledger.clone();
            next.vials.push(vial.clone());
            Ok(Change::new(next, vial))
        })?;
        info!(isotope, vial = %vial.id, amount, volume_ml, "received vial");
        Ok(vial)
    }

    /// Current usable stock of `isotope`.
    pub fn stock_report(&self, isotope: &str) -> Result<StockReport, InventoryError> {
        let ledger = self
            .ledgers
            .get(isotope)
            .ok_or_else(|| InventoryError::UnknownIsotope(isotope.to_string()))?;
        let at = self.clock.now();
        let level = stock_level(
            &self.engine,
            &ledger.vials,
            ledger.isotope.half_life_hours,
            at,
            self.config.visibility_threshold,
        )?;
        let low_stock = level.total_activity <= self.config.low_stock_threshold;
        if low_stock {
            warn!(
                isotope,
                total = level.total_activity,
                threshold = self.config.low_stock_threshold,
                "low stock"
            );
        }
        Ok(StockReport {
            isotope: isotope.to_string(),
            at,
            unit: self.config.unit,
            total: level.total_activity,
            volume_ml: level.total_volume_ml,
            concentration: level.concentration(),
            vial_count: level.visible_vials,
            low_stock,
        })
    }

    /// Dispense `requested` activity of `isotope`, highest-activity vial first.
    pub fn withdraw(
        &self,
        isotope: &str,
        requested: f64,
        patient_ref: Option<String>,
    ) -> Result<DoseRecord, InventoryError> {
        let policy = self.config.policy();
        let unit = self.config.unit;
        let dose = self
            .mutate(isotope, |ledger, now| {
                let withdrawal = WithdrawalAllocator::allocate(
                    &ledger.vials,
                    requested,
                    ledger.isotope.half_life_hours,
                    now,
                    &policy,
                    &self.engine,
                )?;

                let dose = DoseRecord {
                    id: derive_id(
                        "dose",
                        &[isotope.as_bytes(), withdrawal.residual_waste.id.as_bytes()],
                    ),
                    isotope: isotope.to_string(),
                    activity: requested,
                    unit,
                    volume_ml: withdrawal.volume_ml,
                    dispensed_at: now,
                    patient_ref,
                    source_vials: withdrawal.draws.iter().map(|d| d.vial_id.clone()).collect(),
                };
                let waste = withdrawal.all_waste().cloned().collect();

                let mut next = ledger.clone();
                next.vials = withdrawal.updated_vials;
                Ok(Change {
                    ledger: next,
                    waste,
                    doses: vec![dose.clone()],
                    value: dose,
                })
            })
            .inspect_err(|e| warn!(isotope, requested, error = %e, "withdrawal rejected"))?;

        info!(
            isotope,
            activity = dose.activity,
            volume_ml = dose.volume_ml,
            vials = dose.source_vials.len(),
            "dispensed dose"
        );
        Ok(dose)
    }

    /// Install a generator for `isotope`.
    pub fn install_generator(&self, isotope: &str, name: &str) -> Result<Generator, InventoryError> {
        let generator = self.mutate(isotope, |ledger, now| {
            if ledger.generator.is_some() {
                return Err(InventoryError::GeneratorAlreadyInstalled(isotope.to_string()));
            }
            let generator = new_generator(isotope, name, now);
            let mut next = ledger.clone();
            next.generator = Some(generator.clone());
            Ok(Change::new(next, generator))
        })?;
        info!(isotope, generator = %generator.name, "installed generator");
        Ok(generator)
    }

    /// Elute the installed generator, adding a fresh vial.
    pub fn elute(&self, isotope: &str, activity: f64, volume_ml: f64) -> Result<Vial, InventoryError> {
        let vial = self.mutate(isotope, |ledger, now| {
            if ledger.generator.is_none() {
                return Err(InventoryError::NoActiveGenerator(isotope.to_string()));
            }
            let vials = allocate_elution(&ledger.vials, activity, volume_ml, now)?;
            let fresh = vials[0].clone();
            let mut next = ledger.clone();
            next.vials = vials;
            Ok(Change::new(next, fresh))
        })?;
        info!(isotope, vial = %vial.id, activity, volume_ml, "eluted generator");
        Ok(vial)
    }

    /// Retire the installed generator and every vial it produced.
    pub fn remove_generator(&self, isotope: &str) -> Result<Vec<WasteItem>, InventoryError> {
        let waste = self.mutate(isotope, |ledger, now| {
            if ledger.generator.is_none() {
                return Err(InventoryError::NoActiveGenerator(isotope.to_string()));
            }
            let retirement =
                retire_generator_vials(&ledger.vials, ledger.isotope.half_life_hours, now)?;
            let mut next = ledger.clone();
            next.vials = retirement.remaining;
            next.generator = None;
            Ok(Change {
                ledger: next,
                waste: retirement.waste_items.clone(),
                doses: Vec::new(),
                value: retirement.waste_items,
            })
        })?;
        info!(isotope, retired = waste.len(), "removed generator");
        Ok(waste)
    }

    /// Swap in a new generator, retiring the old one's eluates in the same commit.
    pub fn replace_generator(
        &self,
        isotope: &str,
        name: &str,
    ) -> Result<(Generator, Vec<WasteItem>), InventoryError> {
        let (generator, waste) = self.mutate(isotope, |ledger, now| {
            if ledger.generator.is_none() {
                return Err(InventoryError::NoActiveGenerator(isotope.to_string()));
            }
            let retirement =
                retire_generator_vials(&ledger.vials, ledger.isotope.half_life_hours, now)?;
            let generator = new_generator(isotope, name, now);
            let mut next = ledger.clone();
            next.vials = retirement.remaining;
            next.generator = Some(generator.clone());
            Ok(Change {
                ledger: next,
                waste: retirement.waste_items.clone(),
                doses: Vec::new(),
                value: (generator, retirement.waste_items),
            })
        })?;
        info!(isotope, generator = %generator.name, retired = waste.len(), "replaced generator");
        Ok((generator, waste))
    }

    /// Move vial `vial_id` to waste at its current activity.
    pub fn dispose_vial(&self, isotope: &str, vial_id: &str) -> Result<WasteItem, InventoryError> {
        let item = self.mutate(isotope, |ledger, now| {
            let (remaining, item) =
                dispose_vial(&ledger.vials, vial_id, ledger.isotope.half_life_hours, now)?;
            let mut next = ledger.clone();
            next.vials = remaining;
            Ok(Change {
                ledger: next,
                waste: vec![item.clone()],
                doses: Vec::new(),
                value: item,
            })
        })?;
        info!(isotope, vial = vial_id, activity = item.activity, "disposed vial");
        Ok(item)
    }

    /// Retire every vial of `isotope` that has decayed below the depletion epsilon.
    pub fn sweep(&self, isotope: &str) -> Result<Vec<WasteItem>, InventoryError> {
        let epsilon = self.config.depletion_epsilon;
        let waste = self.mutate(isotope, |ledger, now| {
            let retirement =
                sweep_depleted(&ledger.vials, ledger.isotope.half_life_hours, now, epsilon)?;
            let mut next = ledger.clone();
            next.vials = retirement.remaining;
            Ok(Change {
                ledger: next,
                waste: retirement.waste_items.clone(),
                doses: Vec::new(),
                value: retirement.waste_items,
            })
        })?;
        if !waste.is_empty() {
            info!(isotope, retired = waste.len(), "swept depleted vials");
        }
        Ok(waste)
    }

    /// [`sweep`](Self::sweep) every registered isotope.
    pub fn sweep_all(&self) -> Result<Vec<WasteItem>, InventoryError> {
        let mut all = Vec::new();
        for isotope in self.isotopes() {
            all.extend(self.sweep(&isotope.name)?);
        }
        Ok(all)
    }

    /// Full waste history, oldest first.
    pub fn waste_log(&self) -> Vec<WasteItem> {
        self.waste.lock().clone()
    }

    /// Waste items that have decayed in storage long enough to release.
    pub fn releasable_waste(&self) -> Result<Vec<WasteItem>, InventoryError> {
        let now = self.clock.now();
        let mut out = Vec::new();
        for item in self.waste.lock().iter() {
            if is_releasable(item, now)? {
                out.push(item.clone());
            }
        }
        Ok(out)
    }

    /// Full dose history, oldest first.
    pub fn dose_log(&self) -> Vec<DoseRecord> {
        self.doses.lock().clone()
    }

    /// Run `f` against `isotope`'s ledger while holding it exclusively.
    ///
    /// The ledger entry stays locked until the logs are extended so that
    /// log order matches commit order for each isotope.
    fn mutate<T, F>(&self, isotope: &str, f: F) -> Result<T, InventoryError>
    where
        F: FnOnce(&IsotopeLedger, DateTime<Utc>) -> Result<Change<T>, InventoryError>,
    {
        let mut entry = self
            .ledgers
            .get_mut(isotope)
            .ok_or_else(|| InventoryError::UnknownIsotope(isotope.to_string()))?;
        let now = self.clock.now();
        let change = f(&*entry, now)?;

        self.store.commit(&change.ledger, &change.waste, &change.doses)?;
        debug!(isotope, vials = change.ledger.vials.len(), "ledger committed");

        *entry = change.ledger;
        self.waste.lock().extend(change.waste);
        self.doses.lock().extend(change.doses);
        Ok(change.value)
    }
}

fn new_generator(isotope: &str, name: &str, at: DateTime<Utc>) -> Generator {
    Generator {
        id: derive_id(
            "gen",
            &[isotope.as_bytes(), name.as_bytes(), &at.timestamp_millis().to_le_bytes()],
        ),
        name: name.to_string(),
        installed_at: at,
    }
}
