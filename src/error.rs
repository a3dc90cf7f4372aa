//! Error types for forum tree operations.

use crate::forum::schema::Violation;
use thiserror::Error;

/// Result type alias for forum tree operations.
pub type Result<T> = std::result::Result<T, ForumError>;

/// Main error type for forum tree operations.
#[derive(Error, Debug)]
pub enum ForumError {
    /// Broken tree references, illegal inheritance setups and other
    /// precondition violations
    #[error("Validation error: {0}")]
    Validation(String),

    /// One or more field level violations found by the schema pass
    #[error("Schema violation: {}", join_violations(.0))]
    Schema(Vec<Violation>),

    /// Invalid input or arguments
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Storage backend errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl ForumError {
    /// Creates a new validation error.
    pub fn validation<T: ToString>(msg: T) -> Self {
        Self::Validation(msg.to_string())
    }

    /// Creates a new invalid input error.
    pub fn invalid_input<T: ToString>(msg: T) -> Self {
        Self::InvalidInput(msg.to_string())
    }

    /// Creates a new storage error.
    pub fn storage<T: ToString>(msg: T) -> Self {
        Self::Storage(msg.to_string())
    }

    /// Creates a new serialization error.
    pub fn serialization<T: ToString>(msg: T) -> Self {
        Self::Serialization(msg.to_string())
    }

    /// Creates a new configuration error.
    pub fn config<T: ToString>(msg: T) -> Self {
        Self::Config(msg.to_string())
    }

    /// Returns the schema violations carried by this error, if any.
    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::Schema(violations) => violations,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_lists_every_violation() {
        let err = ForumError::Schema(vec![
            Violation::UnknownField("bogus".into()),
            Violation::Missing("name".into()),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("bogus"));
        assert!(msg.contains("name"));
        assert_eq!(err.violations().len(), 2);
    }

    #[test]
    fn test_helper_constructors() {
        assert!(matches!(
            ForumError::validation("x"),
            ForumError::Validation(_)
        ));
        assert!(matches!(ForumError::storage("x"), ForumError::Storage(_)));
        assert!(ForumError::storage("x").violations().is_empty());
    }
}
