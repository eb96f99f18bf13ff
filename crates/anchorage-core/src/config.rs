//! Configuration validation utilities

use crate::errors::AnchorageError;

/// Configuration validation result
pub type ValidationResult = Result<(), AnchorageError>;

/// A single rejected configuration field
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Value is required but empty
    #[error("Field '{field}' must not be empty")]
    Empty {
        /// Offending field
        field: String,
    },
    /// Value is out of the accepted range
    #[error("Field '{field}' must be between {min} and {max} (got {actual})")]
    OutOfRange {
        /// Offending field
        field: String,
        /// Inclusive lower bound
        min: u64,
        /// Inclusive upper bound
        max: u64,
        /// Rejected value
        actual: u64,
    },
    /// Custom predicate failed
    #[error("Field '{field}': {message}")]
    Custom {
        /// Offending field
        field: String,
        /// Why the value was rejected
        message: String,
    },
}

/// Accumulates validation failures across a configuration
#[derive(Debug, Default)]
pub struct ConfigValidator {
    errors: Vec<ValidationError>,
    field_prefix: String,
}

impl ConfigValidator {
    /// Create a new validator
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a validator whose field names are nested under `section`
    pub fn for_section(section: &str) -> Self {
        Self {
            errors: Vec::new(),
            field_prefix: section.to_string(),
        }
    }

    /// Require a non-empty string or byte slice
    pub fn non_empty(&mut self, field_name: &str, value: impl AsRef<[u8]>) -> &mut Self {
        if value.as_ref().is_empty() {
            self.errors.push(ValidationError::Empty {
                field: self.full_field_name(field_name),
            });
        }
        self
    }

    /// Require `min <= value <= max`
    pub fn range(&mut self, field_name: &str, value: u64, min: u64, max: u64) -> &mut Self {
        if value < min || value > max {
            self.errors.push(ValidationError::OutOfRange {
                field: self.full_field_name(field_name),
                min,
                max,
                actual: value,
            });
        }
        self
    }

    /// Validate using a custom predicate
    pub fn custom<T, F>(&mut self, field_name: &str, value: &T, predicate: F, message: &str) -> &mut Self
    where
        F: FnOnce(&T) -> bool,
    {
        if !predicate(value) {
            self.errors.push(ValidationError::Custom {
                field: self.full_field_name(field_name),
                message: message.to_string(),
            });
        }
        self
    }

    /// All errors collected so far
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Collapse every failure into one configuration error
    pub fn result(self) -> ValidationResult {
        if self.errors.is_empty() {
            return Ok(());
        }
        let joined = self
            .errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Err(AnchorageError::config(joined))
    }

    fn full_field_name(&self, field_name: &str) -> String {
        if self.field_prefix.is_empty() {
            field_name.to_string()
        } else {
            format!("{}.{}", self.field_prefix, field_name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_all_failures() {
        let mut validator = ConfigValidator::for_section("gateway");
        validator
            .range("window_size", 0, 1, 10_000)
            .non_empty("device_secret", "")
            .custom("data_dir", &"", |v: &&str| !v.is_empty(), "must be set");
        assert_eq!(validator.errors().len(), 3);

        let message = validator.result().unwrap_err().to_string();
        assert!(message.contains("gateway.window_size"));
        assert!(message.contains("gateway.device_secret"));
    }

    #[test]
    fn test_valid_config_passes() {
        let mut validator = ConfigValidator::new();
        validator.range("window_size", 100, 1, 10_000).non_empty("secret", b"k");
        assert!(validator.result().is_ok());
    }
}
