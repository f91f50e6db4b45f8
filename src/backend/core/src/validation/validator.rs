//! Validator trait and builders.
//!
//! This module provides:
//! - `Validate` trait for synchronous validation
//! - `FieldValidator` for building field-level validation chains
//! - `RequestValidator` for validating entire request objects

use crate::validation::error::{FieldError, ValidationErrors, ValidationResult};
use crate::validation::rules::ValidationRule;

// ═══════════════════════════════════════════════════════════════════════════════
// Validate Trait
// ═══════════════════════════════════════════════════════════════════════════════

/// Trait for types that can be validated synchronously.
///
/// # Example
///
/// ```rust,ignore
/// use backoffice_core::validation::{validate_field, validate_request, Required, Validate, ValidationResult};
///
/// struct RenameRequest {
///     name: String,
/// }
///
/// impl Validate for RenameRequest {
///     fn validate(&self) -> ValidationResult<()> {
///         validate_request()
///             .field(validate_field("name", &self.name).rule(Required))
///             .result()
///     }
/// }
/// ```
pub trait Validate {
    /// Validate this object and return any validation errors.
    fn validate(&self) -> ValidationResult<()>;

    /// Check if this object is valid without returning detailed errors.
    fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Validate and return self if valid, otherwise return errors.
    fn validated(self) -> ValidationResult<Self>
    where
        Self: Sized,
    {
        self.validate()?;
        Ok(self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Field Validator
// ═══════════════════════════════════════════════════════════════════════════════

/// A builder for validating a single field with multiple rules.
pub struct FieldValidator<'a, T> {
    field_name: &'a str,
    value: &'a T,
    errors: Vec<FieldError>,
    stop_on_first_error: bool,
}

impl<'a, T> FieldValidator<'a, T> {
    /// Create a new field validator.
    pub fn new(field_name: &'a str, value: &'a T) -> Self {
        Self {
            field_name,
            value,
            errors: Vec::new(),
            stop_on_first_error: false,
        }
    }

    /// Stop validation on the first error (fail-fast mode).
    pub fn stop_on_first(mut self) -> Self {
        self.stop_on_first_error = true;
        self
    }

    /// Apply a validation rule.
    pub fn rule<R: ValidationRule<T>>(mut self, rule: R) -> Self {
        if self.stop_on_first_error && !self.errors.is_empty() {
            return self;
        }

        if let Some(error) = rule.validate(self.value) {
            self.errors.push(error);
        }
        self
    }

    /// Apply a custom validation function.
    pub fn custom<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&T) -> Option<FieldError>,
    {
        if self.stop_on_first_error && !self.errors.is_empty() {
            return self;
        }

        if let Some(error) = f(self.value) {
            self.errors.push(error);
        }
        self
    }

    /// Get the field name.
    pub fn field_name(&self) -> &str {
        self.field_name
    }

    /// Check if validation passed (no errors).
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Consume the validator and return the errors.
    pub fn into_errors(self) -> Vec<FieldError> {
        self.errors
    }

    /// Convert to a ValidationResult.
    pub fn result(self) -> ValidationResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            let mut validation_errors = ValidationErrors::new();
            for error in self.errors {
                validation_errors.add(self.field_name, error);
            }
            Err(validation_errors)
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Request Validator
// ═══════════════════════════════════════════════════════════════════════════════

/// A builder for validating entire request objects with multiple fields.
pub struct RequestValidator {
    errors: ValidationErrors,
    stop_on_first_error: bool,
}

impl RequestValidator {
    /// Create a new request validator.
    pub fn new() -> Self {
        Self {
            errors: ValidationErrors::new(),
            stop_on_first_error: false,
        }
    }

    /// Stop validation on the first error.
    pub fn stop_on_first(mut self) -> Self {
        self.stop_on_first_error = true;
        self
    }

    /// Validate a field and collect any errors.
    pub fn field<T>(mut self, validator: FieldValidator<'_, T>) -> Self {
        if self.stop_on_first_error && !self.errors.is_empty() {
            return self;
        }

        let field_name = validator.field_name().to_string();
        for error in validator.into_errors() {
            self.errors.add(&field_name, error);
        }
        self
    }

    /// Apply the same rule chain to every item, reporting errors as `field[index]`.
    pub fn each<T, F>(mut self, field: &str, items: &[T], rules: F) -> Self
    where
        F: for<'b> Fn(FieldValidator<'b, T>) -> FieldValidator<'b, T>,
    {
        for (index, item) in items.iter().enumerate() {
            if self.stop_on_first_error && !self.errors.is_empty() {
                break;
            }

            let item_field = format!("{}[{}]", field, index);
            for error in rules(FieldValidator::new(&item_field, item)).into_errors() {
                self.errors.add(item_field.clone(), error);
            }
        }
        self
    }

    /// Validate a nested object.
    pub fn nested<V: Validate>(mut self, prefix: &str, value: &V) -> Self {
        if self.stop_on_first_error && !self.errors.is_empty() {
            return self;
        }

        if let Err(nested_errors) = value.validate() {
            self.errors.merge_with_prefix(prefix, nested_errors);
        }
        self
    }

    /// Check if validation passed.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Consume and return the errors.
    pub fn into_errors(self) -> ValidationErrors {
        self.errors
    }

    /// Convert to a ValidationResult.
    pub fn result(self) -> ValidationResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

impl Default for RequestValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a FieldValidator for a field.
pub fn validate_field<'a, T>(field_name: &'a str, value: &'a T) -> FieldValidator<'a, T> {
    FieldValidator::new(field_name, value)
}

/// Create a new RequestValidator.
pub fn validate_request() -> RequestValidator {
    RequestValidator::new()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::rules::{MaxLength, MinItems, Required, Uuid};

    struct GrantRequest {
        label: String,
        ids: Vec<String>,
    }

    impl Validate for GrantRequest {
        fn validate(&self) -> ValidationResult<()> {
            validate_request()
                .field(validate_field("label", &self.label).rule(Required).rule(MaxLength(8)))
                .field(validate_field("ids", &self.ids).rule(MinItems(1)))
                .each("ids", &self.ids, |item| item.rule(Uuid))
                .result()
        }
    }

    #[test]
    fn test_validate_trait() {
        let valid = GrantRequest {
            label: "ops".to_string(),
            ids: vec!["0b7f4c7e-2f55-4c41-8a51-9a3c2d1e0f11".to_string()],
        };
        assert!(valid.validate().is_ok());

        let invalid = GrantRequest {
            label: "  ".to_string(),
            ids: vec![
                "0b7f4c7e-2f55-4c41-8a51-9a3c2d1e0f11".to_string(),
                "p1".to_string(),
            ],
        };
        let errors = invalid.validate().unwrap_err();
        assert!(errors.has_errors("label"));
        assert!(errors.has_errors("ids[1]"));
        assert!(!errors.has_errors("ids[0]"));
    }

    #[test]
    fn test_stop_on_first() {
        let errors = validate_request()
            .stop_on_first()
            .field(validate_field("a", &String::new()).rule(Required))
            .field(validate_field("b", &String::new()).rule(Required))
            .into_errors();
        assert_eq!(errors.error_count(), 1);
    }

    #[test]
    fn test_nested_prefix() {
        struct Outer(GrantRequest);
        impl Validate for Outer {
            fn validate(&self) -> ValidationResult<()> {
                validate_request().nested("body", &self.0).result()
            }
        }

        let outer = Outer(GrantRequest {
            label: String::new(),
            ids: Vec::new(),
        });
        let errors = outer.validate().unwrap_err();
        assert!(errors.has_errors("body.label"));
        assert!(errors.has_errors("body.ids"));
    }
}
