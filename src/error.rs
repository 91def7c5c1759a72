//! Error types for cargo fitting.

use thiserror::Error;

/// Validation error for container, item and configuration data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Invalid dimension: {name} must be positive and finite, got: {value}")]
    InvalidDimension { name: &'static str, value: f64 },

    #[error("Invalid weight: must be non-negative and finite, got: {0}")]
    InvalidWeight(f64),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Unknown container preset '{0}'")]
    UnknownPreset(String),

    #[error("Duplicate item id '{0}'")]
    DuplicateId(String),
}

/// Errors that abort a whole packing call.
///
/// Problems with single items never end up here; those items are skipped and
/// reported in the result instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PackingError {
    #[error("Invalid container: {0}")]
    InvalidContainer(#[source] ValidationError),

    #[error("Invalid packing configuration: {0}")]
    InvalidConfiguration(#[source] ValidationError),
}

/// Validates a single dimension.
pub(crate) fn validate_dimension(value: f64, name: &'static str) -> Result<(), ValidationError> {
    if value <= 0.0 || !value.is_finite() {
        return Err(ValidationError::InvalidDimension { name, value });
    }
    Ok(())
}

/// Validates an optional weight; absent weights are always accepted.
pub(crate) fn validate_weight(value: Option<f64>) -> Result<(), ValidationError> {
    match value {
        Some(weight) if weight < 0.0 || !weight.is_finite() => {
            Err(ValidationError::InvalidWeight(weight))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_dimension() {
        assert!(validate_dimension(10.0, "Length").is_ok());
        assert!(validate_dimension(0.0, "Length").is_err());
        assert!(validate_dimension(-1.0, "Length").is_err());
        assert!(validate_dimension(f64::NAN, "Length").is_err());
        assert!(validate_dimension(f64::INFINITY, "Length").is_err());
    }

    #[test]
    fn test_validation_weight() {
        assert!(validate_weight(None).is_ok());
        assert!(validate_weight(Some(0.0)).is_ok());
        assert!(validate_weight(Some(12.5)).is_ok());
        assert!(validate_weight(Some(-1.0)).is_err());
        assert!(validate_weight(Some(f64::NAN)).is_err());
    }

    #[test]
    fn error_messages_name_the_offending_value() {
        let err = validate_dimension(-2.0, "Container width").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid dimension: Container width must be positive and finite, got: -2"
        );

        let wrapped = PackingError::InvalidContainer(err);
        assert!(wrapped.to_string().starts_with("Invalid container: "));

        let duplicate = ValidationError::DuplicateId("box-1".to_string());
        assert_eq!(duplicate.to_string(), "Duplicate item id 'box-1'");
    }
}
