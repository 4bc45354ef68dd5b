//! Error types for cargo handling.
//!
//! Capacity rejection and degraded placement are not errors; they are
//! reported through return values. Only operations that cannot proceed
//! without corrupting state surface a [`CargoError`].

use thiserror::Error;

/// Errors that abort a single porter operation and leave state unchanged.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CargoError {
    /// The cargo record is malformed: no live physical node, or a weight
    /// that is negative or not finite.
    #[error("invalid cargo '{id}': {reason}")]
    InvalidCargo { id: String, reason: &'static str },

    /// The porter configuration failed validation.
    #[error("invalid porter config: {0}")]
    InvalidConfig(String),
}

pub type PorterResult<T> = Result<T, CargoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_cargo_message_names_item() {
        let err = CargoError::InvalidCargo {
            id: "crate-7".into(),
            reason: "negative weight",
        };
        assert_eq!(err.to_string(), "invalid cargo 'crate-7': negative weight");
    }

    #[test]
    fn test_invalid_config_message() {
        let err = CargoError::InvalidConfig("max_balance must be positive".into());
        assert_eq!(
            err.to_string(),
            "invalid porter config: max_balance must be positive"
        );
    }
}
