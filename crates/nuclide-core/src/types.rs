//! Inventory record types: vials, isotopes, waste, dose records, generators.
//!
//! Activities are plain `f64` in the department's unit. The decay engine is
//! linear in activity, so nothing here needs to know which unit is in use;
//! records that must remember it (dose history) carry a [`DoseUnit`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::ELUTION_LABEL;
use crate::units::DoseUnit;

/// A quantity of radiopharmaceutical received at a specific time.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Vial {
    /// Opaque unique identifier.
    pub id: String,
    /// Activity at `received_at`, as currently known. Rewritten downward
    /// on every draw so that decay from `received_at` yields what is left.
    pub initial_amount: f64,
    /// Liquid volume at receipt. Volume does not decay.
    pub initial_volume_ml: f64,
    /// Calibration instant that decay is measured from.
    pub received_at: DateTime<Utc>,
    /// Free-text label. Generator eluates start with [`ELUTION_LABEL`].
    pub label: String,
}

impl Vial {
    pub fn new(
        id: impl Into<String>,
        initial_amount: f64,
        initial_volume_ml: f64,
        received_at: DateTime<Utc>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            initial_amount,
            initial_volume_ml,
            received_at,
            label: label.into(),
        }
    }

    /// Whether this vial was produced by a generator elution.
    pub fn is_generator_eluted(&self) -> bool {
        self.label.starts_with(ELUTION_LABEL)
    }
}

/// Physical reference data for an isotope.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Isotope {
    /// Display name, also used as the inventory key (e.g. `"Tc-99m"`).
    pub name: String,
    pub half_life_hours: f64,
}

impl Isotope {
    pub fn new(name: impl Into<String>, half_life_hours: f64) -> Self {
        Self {
            name: name.into(),
            half_life_hours,
        }
    }
}

/// Where a waste item came from.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum WasteSource {
    /// A vial retired on depletion or generator replacement.
    Vial,
    /// Syringe and needle holdup left over from preparing a dose.
    Preparation,
    /// A vial disposed of by hand before it was depleted.
    Manual,
}

impl fmt::Display for WasteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vial => f.write_str("vial"),
            Self::Preparation => f.write_str("preparation"),
            Self::Manual => f.write_str("manual"),
        }
    }
}

/// Terminal record of retired or disposed activity.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WasteItem {
    pub id: String,
    /// Activity at `disposed_at`.
    pub activity: f64,
    /// Half-life of the isotope, kept so the item can be decayed in storage.
    pub half_life_hours: f64,
    pub disposed_at: DateTime<Utc>,
    pub source: WasteSource,
    pub description: String,
}

/// A dispensed patient dose.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DoseRecord {
    pub id: String,
    pub isotope: String,
    pub activity: f64,
    /// Unit `activity` was recorded in.
    pub unit: DoseUnit,
    pub volume_ml: f64,
    pub dispensed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_ref: Option<String>,
    /// Ids of the vials the dose was drawn from.
    pub source_vials: Vec<String>,
}

/// An installed radionuclide generator.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Generator {
    pub id: String,
    pub name: String,
    pub installed_at: DateTime<Utc>,
}

/// Persisted state of one isotope's inventory.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IsotopeLedger {
    pub isotope: Isotope,
    /// Active vials, newest elution first.
    pub vials: Vec<Vial>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator: Option<Generator>,
}

impl IsotopeLedger {
    pub fn new(isotope: Isotope) -> Self {
        Self {
            isotope,
            vials: Vec::new(),
            generator: None,
        }
    }
}
