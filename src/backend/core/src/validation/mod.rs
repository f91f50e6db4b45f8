//! Request validation framework.
//!
//! - **Rules**: required fields, string length, UUID format, collection size
//!   and uniqueness
//! - **Validators**: the `Validate` trait plus `FieldValidator` and
//!   `RequestValidator` builders
//! - **Errors**: field-level error tracking with dotted paths and
//!   array indices
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use backoffice_core::validation::{
//!     validate_field, validate_request, MaxLength, Required, Validate, ValidationResult,
//! };
//!
//! struct CreateRole {
//!     name: String,
//! }
//!
//! impl Validate for CreateRole {
//!     fn validate(&self) -> ValidationResult<()> {
//!         validate_request()
//!             .field(validate_field("name", &self.name).rule(Required).rule(MaxLength(255)))
//!             .result()
//!     }
//! }
//! ```

pub mod error;
pub mod rules;
pub mod validator;

pub use error::{FieldError, ValidationErrorKind, ValidationErrors, ValidationResult};
pub use rules::{MaxItems, MaxLength, MinItems, MinLength, Required, UniqueItems, Uuid, ValidationRule};
pub use validator::{validate_field, validate_request, FieldValidator, RequestValidator, Validate};

/// Deserialize a string and trim surrounding whitespace.
pub fn trimmed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = <String as serde::Deserialize>::deserialize(deserializer)?;
    Ok(value.trim().to_string())
}

/// Like [`trimmed`] for optional fields.
pub fn trimmed_option<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = <Option<String> as serde::Deserialize>::deserialize(deserializer)?;
    Ok(value.map(|v| v.trim().to_string()))
}
