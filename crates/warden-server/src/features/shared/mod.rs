//! Shared utilities and types for feature modules
//!
//! - **records**: gateway-backed CRUD for the demo resources
//! - **validation**: input validation utilities
//! - **test_helpers**: request builders for route tests (test-only)

pub mod records;
pub mod validation;

#[cfg(test)]
pub mod test_helpers;

pub use records::{Fields, Record, Records};
pub use validation::{
    validate_amount, validate_digits, validate_optional_text, validate_text, FieldError,
};
