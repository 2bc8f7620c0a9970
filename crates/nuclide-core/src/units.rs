//! Dose units and lossless mCi/MBq conversion.
//!
//! Activity readings that must survive unit toggles are held as
//! [`Activity`], an integer count of millionths of a unit. Converting
//! mCi → MBq multiplies by exactly [`MCI_TO_MBQ`], so converting back
//! recovers the original reading bit for bit. Plain `f64` conversion is
//! available through [`DoseUnit::convert`] for display paths where
//! exactness does not matter.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{MCI_TO_MBQ, UNIT_PRECISION};
use crate::error::UnitError;

/// The unit a department records activity in.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum DoseUnit {
    #[default]
    #[serde(rename = "mCi", alias = "mci", alias = "millicurie")]
    Millicurie,
    #[serde(rename = "MBq", alias = "mbq", alias = "megabecquerel")]
    Megabecquerel,
}

impl DoseUnit {
    /// Short display symbol.
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Millicurie => "mCi",
            Self::Megabecquerel => "MBq",
        }
    }

    /// Convert a floating-point value from `self` into `to`.
    ///
    /// # Examples
    ///
    /// ```
    /// use nuclide_core::units::DoseUnit;
    /// assert_eq!(DoseUnit::Millicurie.convert(2.0, DoseUnit::Megabecquerel), 74.0);
    /// assert_eq!(DoseUnit::Megabecquerel.convert(74.0, DoseUnit::Millicurie), 2.0);
    /// ```
    pub fn convert(&self, value: f64, to: DoseUnit) -> f64 {
        match (self, to) {
            (Self::Millicurie, DoseUnit::Megabecquerel) => value * MCI_TO_MBQ as f64,
            (Self::Megabecquerel, DoseUnit::Millicurie) => value / MCI_TO_MBQ as f64,
            _ => value,
        }
    }
}

impl fmt::Display for DoseUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for DoseUnit {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mci" | "millicurie" => Ok(Self::Millicurie),
            "mbq" | "megabecquerel" => Ok(Self::Megabecquerel),
            other => Err(UnitError::UnknownUnit(other.to_string())),
        }
    }
}

/// Convert millionths of a millicurie into millionths of a megabecquerel.
pub fn mci_to_mbq(micro_mci: u64) -> Result<u64, UnitError> {
    micro_mci
        .checked_mul(MCI_TO_MBQ)
        .ok_or(UnitError::Overflow { micro: micro_mci })
}

/// Convert millionths of a megabecquerel into millionths of a millicurie,
/// rounding half up. Inverts [`mci_to_mbq`] exactly.
pub fn mbq_to_mci(micro_mbq: u64) -> u64 {
    let whole = micro_mbq / MCI_TO_MBQ;
    let rem = micro_mbq % MCI_TO_MBQ;
    if rem * 2 >= MCI_TO_MBQ { whole + 1 } else { whole }
}

/// A fixed-point activity reading tagged with its unit.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Activity {
    /// Value in millionths of `unit`.
    pub micro: u64,
    pub unit: DoseUnit,
}

impl Activity {
    pub fn from_micro(micro: u64, unit: DoseUnit) -> Self {
        Self { micro, unit }
    }

    /// Round a floating-point value to the nearest millionth of `unit`.
    pub fn from_value(value: f64, unit: DoseUnit) -> Result<Self, UnitError> {
        if !value.is_finite() || value < 0.0 {
            return Err(UnitError::InvalidValue(value.to_string()));
        }
        let scaled = (value * UNIT_PRECISION as f64).round();
        if scaled >= u64::MAX as f64 {
            return Err(UnitError::InvalidValue(value.to_string()));
        }
        Ok(Self::from_micro(scaled as u64, unit))
    }

    /// The reading as a floating-point value in its own unit.
    pub fn value(&self) -> f64 {
        self.micro as f64 / UNIT_PRECISION as f64
    }

    /// Re-express the reading in `unit`.
    pub fn to_unit(self, unit: DoseUnit) -> Result<Self, UnitError> {
        let micro = match (self.unit, unit) {
            (DoseUnit::Millicurie, DoseUnit::Megabecquerel) => mci_to_mbq(self.micro)?,
            (DoseUnit::Megabecquerel, DoseUnit::Millicurie) => mbq_to_mci(self.micro),
            _ => self.micro,
        };
        Ok(Self::from_micro(micro, unit))
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3} {}", self.value(), self.unit)
    }
}
