//! Error types shared across the Nuclide crates.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecayError {
    #[error("invalid parameter: {0}")] InvalidParameter(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnitError {
    #[error("activity overflow converting {micro} micro-units")] Overflow { micro: u64 },
    #[error("invalid activity value: {0}")] InvalidValue(String),
    #[error("unknown dose unit: {0}")] UnknownUnit(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("I/O: {0}")] Io(String),
    #[error("serialization: {0}")] Serialization(String),
    #[error("corrupted record in {path} at line {line}: {reason}")] Corrupted { path: String, line: usize, reason: String },
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_invalid_parameter() {
        let e = DecayError::InvalidParameter("half-life must be positive, got 0".into());
        assert_eq!(e.to_string(), "invalid parameter: half-life must be positive, got 0");
    }

    #[test]
    fn display_unit_overflow() {
        let e = UnitError::Overflow { micro: u64::MAX };
        assert!(e.to_string().contains("overflow"));
    }

    #[test]
    fn store_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let e: StoreError = io.into();
        assert!(matches!(e, StoreError::Io(_)));
    }

    #[test]
    fn store_error_from_json() {
        let json = serde_json::from_str::<u32>("not json").unwrap_err();
        let e: StoreError = json.into();
        assert!(matches!(e, StoreError::Serialization(_)));
    }
}
