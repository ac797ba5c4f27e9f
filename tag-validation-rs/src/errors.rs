//! Error handling for the validation library
//!
//! Field failures are carried as a map of snake-cased field names to
//! translated messages. Everything else (rule misuse, failed lookups, setup
//! problems) is reported separately so callers never mistake an
//! infrastructure problem for bad input.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message shown to end users when validation could not be carried out
pub const GENERIC_MESSAGE: &str = "something went wrong. Please try again later";

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Enum representing the ways a validation call can fail
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// One or more fields failed their rules
    #[error("{0}")]
    Failed(FieldErrors),

    /// A rule tag was malformed, unknown, or applied to the wrong input
    #[error("{}", GENERIC_MESSAGE)]
    Misuse(String),

    /// A database lookup behind `exists`/`uq` could not be completed
    #[error("{}", GENERIC_MESSAGE)]
    Lookup {
        /// Rule that issued the lookup
        rule: String,
        /// Underlying failure, for logs only
        reason: String,
    },

    /// Settings could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    /// A translation table could not be loaded
    #[error("Translation error: {0}")]
    Translation(String),
}

impl ValidationError {
    /// Create a misuse error with a detail message
    pub fn misuse<S: Into<String>>(detail: S) -> Self {
        ValidationError::Misuse(detail.into())
    }

    /// Returns the field errors if this is a field failure
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            ValidationError::Failed(errors) => Some(errors),
            _ => None,
        }
    }

    /// Returns true if the error came from a failed database lookup
    pub fn is_lookup(&self) -> bool {
        matches!(self, ValidationError::Lookup { .. })
    }

    /// Detail meant for logs rather than end users
    pub fn detail(&self) -> String {
        match self {
            ValidationError::Misuse(detail) => detail.clone(),
            ValidationError::Lookup { rule, reason } => format!("{rule}: {reason}"),
            other => other.to_string(),
        }
    }
}

/// Translated messages keyed by snake-cased field name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    /// Empty mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message for a field
    pub fn add<F: Into<String>, M: Into<String>>(&mut self, field: F, message: M) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    /// Messages recorded for a field
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// Whether `field` has any message
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Whether no field failed
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of fields with at least one message
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Fields with their messages, in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }

    /// Render the mapping as a JSON object
    pub fn to_json(&self) -> String {
        // A map of strings to string lists always serializes
        serde_json::to_string(&self.0).unwrap_or_else(|_| "{}".to_string())
    }

    /// The underlying map
    pub fn into_inner(self) -> BTreeMap<String, Vec<String>> {
        self.0
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json())
    }
}

/// Failure raised by a single rule invocation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleError {
    /// The rule cannot run with the given param or value shape
    #[error("{0}")]
    Misuse(String),

    /// A record lookup failed
    #[error("{0}")]
    Lookup(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_errors_render_sorted_json() {
        let mut errors = FieldErrors::new();
        errors.add("mobile", "mobile is required");
        errors.add("email", "email is invalid");
        errors.add("email", "email is taken");

        assert_eq!(
            errors.to_json(),
            r#"{"email":["email is invalid","email is taken"],"mobile":["mobile is required"]}"#
        );
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.get("email").map(|m| m.len()), Some(2));
    }

    #[test]
    fn test_failed_displays_json() {
        let mut errors = FieldErrors::new();
        errors.add("name", "name is required");
        let err = ValidationError::Failed(errors);

        let parsed: serde_json::Value = serde_json::from_str(&err.to_string()).unwrap();
        assert_eq!(parsed["name"][0], "name is required");
    }

    #[test]
    fn test_internal_errors_hide_detail() {
        let misuse = ValidationError::misuse("unknown rule 'foo'");
        assert_eq!(misuse.to_string(), GENERIC_MESSAGE);
        assert_eq!(misuse.detail(), "unknown rule 'foo'");

        let lookup = ValidationError::Lookup {
            rule: "exists".to_string(),
            reason: "connection refused".to_string(),
        };
        assert!(lookup.is_lookup());
        assert_eq!(lookup.to_string(), GENERIC_MESSAGE);
        assert!(lookup.field_errors().is_none());
    }
}
