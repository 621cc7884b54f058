//! Validation error types.

use crate::path::Path;
use std::fmt;
use thiserror::Error;

/// Options accepted by validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationOption {
    /// Accept duplicate members in sets and associative lists.
    AllowDuplicates,
}

/// A single schema-conformance failure, anchored at the offending path.
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("{path}: expected {expected}, got {actual}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("{path}: unknown field: {field}")]
    UnknownField { path: String, field: String },

    #[error("{path}: list element has no value for key field {key:?} and no default")]
    MissingListKey { path: String, key: String },

    #[error("{path}: duplicate list element: {element}")]
    DuplicateElement { path: String, element: String },

    #[error("{path}: no type found matching reference")]
    UnresolvedType { path: String },

    #[error("{path}: {message}")]
    InvalidValue { path: String, message: String },

    #[error("{message}")]
    SchemaError { message: String },

    /// A walker reached a state the schema rules make impossible.
    /// Indicates a bug, not bad input.
    #[error("{path}: internal invariant violated: {message}")]
    Internal { path: String, message: String },
}

impl ValidationError {
    pub fn type_mismatch(path: &Path, expected: &'static str, actual: &'static str) -> Self {
        ValidationError::TypeMismatch {
            path: path.to_string(),
            expected,
            actual,
        }
    }

    pub fn unknown_field(path: &Path, field: impl Into<String>) -> Self {
        ValidationError::UnknownField {
            path: path.to_string(),
            field: field.into(),
        }
    }

    pub fn missing_list_key(path: &Path, key: impl Into<String>) -> Self {
        ValidationError::MissingListKey {
            path: path.to_string(),
            key: key.into(),
        }
    }

    pub fn duplicate_element(path: &Path, element: impl fmt::Display) -> Self {
        ValidationError::DuplicateElement {
            path: path.to_string(),
            element: element.to_string(),
        }
    }

    pub fn unresolved_type(path: &Path) -> Self {
        ValidationError::UnresolvedType {
            path: path.to_string(),
        }
    }

    pub fn invalid_value(path: &Path, message: impl Into<String>) -> Self {
        ValidationError::InvalidValue {
            path: path.to_string(),
            message: message.into(),
        }
    }

    pub fn schema_error(message: impl Into<String>) -> Self {
        ValidationError::SchemaError {
            message: message.into(),
        }
    }

    pub fn internal(path: &Path, message: impl Into<String>) -> Self {
        ValidationError::Internal {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

/// An accumulated list of validation failures.
#[derive(Debug, Clone, Default)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        ValidationErrors { errors: Vec::new() }
    }

    pub fn from_error(error: ValidationError) -> Self {
        ValidationErrors {
            errors: vec![error],
        }
    }

    pub fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn extend(&mut self, other: ValidationErrors) {
        self.errors.extend(other.errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter()
    }

    /// Ok when no errors were recorded.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl IntoIterator for ValidationErrors {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}
