//! Shared validation utilities
//!
//! Field checks used by the create and update commands of the demo
//! resources.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("{field} is required and cannot be empty")]
    Required { field: &'static str },

    #[error("{field} must be at most {max_length} characters")]
    TooLong {
        field: &'static str,
        max_length: usize,
    },

    #[error("{field} must be a non-negative number")]
    Negative { field: &'static str },

    #[error("{field} must be exactly {digits} digits")]
    Digits { field: &'static str, digits: usize },
}

/// Validate a required, bounded text field.
pub fn validate_text(field: &'static str, value: &str, max_length: usize) -> Result<(), FieldError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(FieldError::Required { field });
    }
    if trimmed.chars().count() > max_length {
        return Err(FieldError::TooLong { field, max_length });
    }
    Ok(())
}

/// Validate an optional bounded text field.
pub fn validate_optional_text(
    field: &'static str,
    value: Option<&str>,
    max_length: usize,
) -> Result<(), FieldError> {
    match value {
        Some(v) if v.chars().count() > max_length => Err(FieldError::TooLong { field, max_length }),
        _ => Ok(()),
    }
}

/// Amounts and prices must be finite and not negative.
pub fn validate_amount(field: &'static str, value: f64) -> Result<(), FieldError> {
    if !value.is_finite() || value < 0.0 {
        return Err(FieldError::Negative { field });
    }
    Ok(())
}

pub fn validate_digits(field: &'static str, value: &str, digits: usize) -> Result<(), FieldError> {
    if value.len() != digits || !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(FieldError::Digits { field, digits });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_text() {
        assert!(validate_text("name", "Laptop", 10).is_ok());
        assert_eq!(
            validate_text("name", "   ", 10),
            Err(FieldError::Required { field: "name" })
        );
        assert_eq!(
            validate_text("name", "abcdefghijk", 10),
            Err(FieldError::TooLong {
                field: "name",
                max_length: 10
            })
        );
    }

    #[test]
    fn test_validate_optional_text() {
        assert!(validate_optional_text("description", None, 3).is_ok());
        assert!(validate_optional_text("description", Some("abcd"), 3).is_err());
    }

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount("price", 0.0).is_ok());
        assert!(validate_amount("price", 19.99).is_ok());
        assert!(validate_amount("price", -1.0).is_err());
        assert!(validate_amount("price", f64::NAN).is_err());
    }

    #[test]
    fn test_validate_digits() {
        assert!(validate_digits("cardLastFourDigits", "4242", 4).is_ok());
        assert!(validate_digits("cardLastFourDigits", "424", 4).is_err());
        assert!(validate_digits("cardLastFourDigits", "42a2", 4).is_err());
    }
}
