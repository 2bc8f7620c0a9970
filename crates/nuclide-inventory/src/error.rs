//! Errors raised by the inventory manager.
use nuclide_core::error::{DecayError, StoreError};
use nuclide_dispense::DispenseError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InventoryError {
    #[error("unknown isotope: {0}")] UnknownIsotope(String),
    #[error("isotope already registered: {0}")] DuplicateIsotope(String),
    #[error("no active generator for {0}")] NoActiveGenerator(String),
    #[error("generator already installed for {0}")] GeneratorAlreadyInstalled(String),
    #[error(transparent)] Dispense(#[from] DispenseError),
    #[error(transparent)] Decay(#[from] DecayError),
    #[error(transparent)] Store(#[from] StoreError),
    #[error("configuration: {0}")] Config(String),
}
