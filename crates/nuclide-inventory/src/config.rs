//! Inventory configuration.
//!
//! [`InventoryConfig`] carries the data directory, the department's dose
//! unit, the allocation thresholds and logging settings. Values come from
//! defaults, an optional TOML file and `NUCLIDE_*` environment variables,
//! in increasing order of precedence.

use std::path::{Path, PathBuf};

use nuclide_core::constants::{
    DEPLETION_EPSILON, LOW_STOCK_THRESHOLD, RESIDUAL_WASTE_FRACTION, VISIBILITY_THRESHOLD,
};
use nuclide_core::units::DoseUnit;
use nuclide_dispense::AllocationPolicy;
use serde::{Deserialize, Serialize};

use crate::error::InventoryError;

/// Name of the config file looked up inside the data directory.
pub const CONFIG_FILE_NAME: &str = "nuclide.toml";

/// Prefix for environment overrides, e.g. `NUCLIDE_LOW_STOCK_THRESHOLD`.
pub const ENV_PREFIX: &str = "NUCLIDE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    /// Root directory for all persistent data.
    pub data_dir: PathBuf,
    /// Unit every stored activity is expressed in.
    pub unit: DoseUnit,
    /// Vials below this activity are treated as depleted.
    pub depletion_epsilon: f64,
    /// Vials below this activity are left out of stock totals.
    pub visibility_threshold: f64,
    /// Fraction of each dose logged as preparation residue.
    pub residual_fraction: f64,
    /// Stock reports at or below this total raise a low-stock flag; 0 limits
    /// the flag to empty stock.
    pub low_stock_threshold: f64,
    /// Log level filter string (e.g. "info", "nuclide_inventory=debug").
    pub log_level: String,
    /// "text" or "json".
    pub log_format: String,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("nuclide");

        Self {
            data_dir,
            unit: DoseUnit::default(),
            depletion_epsilon: DEPLETION_EPSILON,
            visibility_threshold: VISIBILITY_THRESHOLD,
            residual_fraction: RESIDUAL_WASTE_FRACTION,
            low_stock_threshold: LOW_STOCK_THRESHOLD,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
        }
    }
}

impl InventoryConfig {
    /// Load configuration from `path` (required when given) or from
    /// `<default data_dir>/nuclide.toml` when it exists, then apply
    /// `NUCLIDE_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, InventoryError> {
        let mut builder = config::Config::builder();
        match path {
            Some(p) => {
                builder = builder.add_source(config::File::from(p).required(true));
            }
            None => {
                let fallback = Self::default().data_dir.join(CONFIG_FILE_NAME);
                builder = builder.add_source(config::File::from(fallback).required(false));
            }
        }
        builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        let cfg: Self = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| InventoryError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject thresholds that would make allocation meaningless.
    pub fn validate(&self) -> Result<(), InventoryError> {
        let checks = [
            ("depletion_epsilon", self.depletion_epsilon),
            ("visibility_threshold", self.visibility_threshold),
            ("residual_fraction", self.residual_fraction),
            ("low_stock_threshold", self.low_stock_threshold),
        ];
        for (name, value) in checks {
            if !value.is_finite() || value < 0.0 {
                return Err(InventoryError::Config(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        if self.residual_fraction >= 1.0 {
            return Err(InventoryError::Config(format!(
                "residual_fraction must be below 1, got {}",
                self.residual_fraction
            )));
        }
        match self.log_format.as_str() {
            "text" | "json" => Ok(()),
            other => Err(InventoryError::Config(format!(
                "log_format must be \"text\" or \"json\", got {other:?}"
            ))),
        }
    }

    /// Directory holding ledgers and the waste/dose logs.
    pub fn store_dir(&self) -> PathBuf {
        self.data_dir.join("store")
    }

    /// Allocation thresholds drawn from this configuration.
    pub fn policy(&self) -> AllocationPolicy {
        AllocationPolicy {
            depletion_epsilon: self.depletion_epsilon,
            visibility_threshold: self.visibility_threshold,
            residual_fraction: self.residual_fraction,
        }
    }
}
