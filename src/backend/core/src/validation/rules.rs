//! Validation rules used by request schemas.
//!
//! - Required field validation
//! - String length constraints
//! - UUID format validation
//! - Collection size and uniqueness constraints

use crate::validation::error::{FieldError, ValidationErrorKind};
use regex::Regex;
use std::collections::HashSet;
use std::hash::Hash;
use std::sync::LazyLock;

// ═══════════════════════════════════════════════════════════════════════════════
// Pre-compiled Regex Patterns
// ═══════════════════════════════════════════════════════════════════════════════

/// Hyphenated UUID of any version.
static UUID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$"
    ).expect("Invalid UUID regex")
});

// ═══════════════════════════════════════════════════════════════════════════════
// Validation Rule Trait
// ═══════════════════════════════════════════════════════════════════════════════

/// A validation rule that can be applied to a value.
pub trait ValidationRule<T> {
    /// Validate the value and return any errors.
    fn validate(&self, value: &T) -> Option<FieldError>;

    /// Get a description of this rule.
    fn description(&self) -> String;
}

// ═══════════════════════════════════════════════════════════════════════════════
// Required Field Rule
// ═══════════════════════════════════════════════════════════════════════════════

/// Rule that validates a field is present and non-empty.
#[derive(Debug, Clone)]
pub struct Required;

impl ValidationRule<String> for Required {
    fn validate(&self, value: &String) -> Option<FieldError> {
        if value.trim().is_empty() {
            Some(FieldError::new(ValidationErrorKind::Required))
        } else {
            None
        }
    }

    fn description(&self) -> String {
        "field is required".to_string()
    }
}

/// An optional string may be absent, but not blank.
impl ValidationRule<Option<String>> for Required {
    fn validate(&self, value: &Option<String>) -> Option<FieldError> {
        match value {
            Some(s) => <Required as ValidationRule<String>>::validate(self, s),
            None => None,
        }
    }

    fn description(&self) -> String {
        "field is required when present".to_string()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// String Length Rules
// ═══════════════════════════════════════════════════════════════════════════════

/// Rule that validates string minimum length.
#[derive(Debug, Clone)]
pub struct MinLength(pub usize);

impl ValidationRule<String> for MinLength {
    fn validate(&self, value: &String) -> Option<FieldError> {
        let len = value.chars().count();
        if len < self.0 {
            Some(FieldError::new(ValidationErrorKind::MinLength {
                min: self.0,
                actual: len,
            }))
        } else {
            None
        }
    }

    fn description(&self) -> String {
        format!("minimum length: {}", self.0)
    }
}

impl ValidationRule<Option<String>> for MinLength {
    fn validate(&self, value: &Option<String>) -> Option<FieldError> {
        match value {
            Some(s) => <MinLength as ValidationRule<String>>::validate(self, s),
            None => None,
        }
    }

    fn description(&self) -> String {
        format!("minimum length: {}", self.0)
    }
}

/// Rule that validates string maximum length.
#[derive(Debug, Clone)]
pub struct MaxLength(pub usize);

impl ValidationRule<String> for MaxLength {
    fn validate(&self, value: &String) -> Option<FieldError> {
        let len = value.chars().count();
        if len > self.0 {
            Some(FieldError::new(ValidationErrorKind::MaxLength {
                max: self.0,
                actual: len,
            }))
        } else {
            None
        }
    }

    fn description(&self) -> String {
        format!("maximum length: {}", self.0)
    }
}

impl ValidationRule<Option<String>> for MaxLength {
    fn validate(&self, value: &Option<String>) -> Option<FieldError> {
        match value {
            Some(s) => <MaxLength as ValidationRule<String>>::validate(self, s),
            None => None,
        }
    }

    fn description(&self) -> String {
        format!("maximum length: {}", self.0)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Format Rules
// ═══════════════════════════════════════════════════════════════════════════════

/// Rule that validates UUID format.
#[derive(Debug, Clone, Default)]
pub struct Uuid;

impl ValidationRule<String> for Uuid {
    fn validate(&self, value: &String) -> Option<FieldError> {
        if UUID_REGEX.is_match(value) {
            None
        } else {
            Some(FieldError::new(ValidationErrorKind::InvalidUuid))
        }
    }

    fn description(&self) -> String {
        "valid UUID format".to_string()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Collection Rules
// ═══════════════════════════════════════════════════════════════════════════════

/// Rule that validates minimum number of items in a collection.
#[derive(Debug, Clone)]
pub struct MinItems(pub usize);

impl<T> ValidationRule<Vec<T>> for MinItems {
    fn validate(&self, value: &Vec<T>) -> Option<FieldError> {
        if value.len() < self.0 {
            Some(FieldError::new(ValidationErrorKind::MinItems {
                min: self.0,
                actual: value.len(),
            }))
        } else {
            None
        }
    }

    fn description(&self) -> String {
        format!("minimum {} items", self.0)
    }
}

/// Rule that validates maximum number of items in a collection.
#[derive(Debug, Clone)]
pub struct MaxItems(pub usize);

impl<T> ValidationRule<Vec<T>> for MaxItems {
    fn validate(&self, value: &Vec<T>) -> Option<FieldError> {
        if value.len() > self.0 {
            Some(FieldError::new(ValidationErrorKind::MaxItems {
                max: self.0,
                actual: value.len(),
            }))
        } else {
            None
        }
    }

    fn description(&self) -> String {
        format!("maximum {} items", self.0)
    }
}

/// Rule that validates no duplicate items in a collection.
#[derive(Debug, Clone, Default)]
pub struct UniqueItems;

impl<T: Eq + Hash> ValidationRule<Vec<T>> for UniqueItems {
    fn validate(&self, value: &Vec<T>) -> Option<FieldError> {
        let set: HashSet<&T> = value.iter().collect();
        if set.len() != value.len() {
            Some(FieldError::new(ValidationErrorKind::DuplicateItems))
        } else {
            None
        }
    }

    fn description(&self) -> String {
        "unique items only".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required() {
        assert!(Required.validate(&"Editor".to_string()).is_none());
        assert!(Required.validate(&"   ".to_string()).is_some());
        assert!(Required.validate(&None::<String>).is_none());
        assert!(Required.validate(&Some(String::new())).is_some());
    }

    #[test]
    fn test_length() {
        assert!(MaxLength(3).validate(&"abcd".to_string()).is_some());
        assert!(MinLength(2).validate(&"é".to_string()).is_some());
        assert!(MaxLength(3).validate(&None::<String>).is_none());
    }

    #[test]
    fn test_uuid() {
        assert!(Uuid.validate(&"67e55044-10b1-426f-9247-bb680e5fe0c8".to_string()).is_none());
        assert!(Uuid.validate(&"p1".to_string()).is_some());
        assert!(Uuid.validate(&String::new()).is_some());
    }

    #[test]
    fn test_collections() {
        assert!(MinItems(1).validate(&Vec::<String>::new()).is_some());
        assert!(MaxItems(1).validate(&vec![1, 2]).is_some());
        assert!(UniqueItems.validate(&vec!["a", "a"]).is_some());
        assert!(UniqueItems.validate(&vec!["a", "b"]).is_none());
    }
}
