//! Error types for tablecraft-core

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for tablecraft operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while interpreting Tablecraft configuration.
///
/// Shared by the engine; the client and CLI wrap it in their own error types.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Configuration is missing, malformed, or internally inconsistent
    #[error("Configuration error: {message}")]
    Config {
        /// What configuration is problematic
        message: String,
    },

    /// A named item (table, field, column) does not exist
    #[error("{kind} not found: {name}")]
    NotFound {
        /// Kind of item that was looked up
        kind: String,
        /// Name that was looked up
        name: String,
    },

    /// Input rejected by validation or parsing
    #[error("Validation error: {message}")]
    Validation {
        /// Field that failed validation
        field: Option<String>,
        /// What went wrong
        message: String,
    },

    /// Derived-value dependencies form a cycle
    #[error("Cyclic field dependency in table '{table}': {}", .fields.join(" -> "))]
    CyclicDependency {
        /// Table whose configuration contains the cycle
        table: String,
        /// Fields participating in the cycle
        fields: Vec<String>,
    },

    /// Formula could not be parsed or evaluated
    #[error("Formula error in '{formula}': {message}")]
    Formula {
        /// Formula source text
        formula: String,
        /// What went wrong
        message: String,
    },

    /// A record source or config source failed
    #[error("Source error: {message}")]
    Source {
        /// Human-readable error message
        message: String,
        /// Whether the caller may retry
        retryable: bool,
    },

    /// I/O error with the path that caused it
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        /// Path being read or written
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Returns whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Source { retryable, .. } => *retryable,
            Error::Io { .. } => true,
            Error::Config { .. }
            | Error::NotFound { .. }
            | Error::Validation { .. }
            | Error::CyclicDependency { .. }
            | Error::Formula { .. }
            | Error::Serialization(_) => false,
        }
    }

    /// Creates a new configuration error.
    pub fn config<S: Into<String>>(message: S) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    /// Creates a new not-found error.
    pub fn not_found<K: Into<String>, N: Into<String>>(kind: K, name: N) -> Self {
        Error::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Creates a new validation error.
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Error::Validation {
            field: None,
            message: message.into(),
        }
    }

    /// Creates a new validation error with a field name.
    pub fn validation_field<F, M>(field: F, message: M) -> Self
    where
        F: Into<String>,
        M: Into<String>,
    {
        Error::Validation {
            field: Some(field.into()),
            message: message.into(),
        }
    }

    /// Creates a new formula error.
    pub fn formula<F: Into<String>, M: Into<String>>(formula: F, message: M) -> Self {
        Error::Formula {
            formula: formula.into(),
            message: message.into(),
        }
    }

    /// Creates a source error.
    pub fn source_error<S: Into<String>>(message: S, retryable: bool) -> Self {
        Error::Source {
            message: message.into(),
            retryable,
        }
    }

    /// Wraps an I/O error with the path it concerns.
    pub fn io_with_path(source: std::io::Error, path: impl AsRef<Path>) -> Self {
        Error::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = Error::config("missing formFields");
        assert_eq!(err.to_string(), "Configuration error: missing formFields");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_not_found_display() {
        let err = Error::not_found("table", "orders");
        assert_eq!(err.to_string(), "table not found: orders");
    }

    #[test]
    fn test_validation_error_with_field() {
        let err = Error::validation_field("email", "must be a valid address");
        let Error::Validation { field, message } = err else {
            unreachable!("Expected Validation error variant");
        };
        assert_eq!(field, Some("email".to_string()));
        assert_eq!(message, "must be a valid address");
    }

    #[test]
    fn test_cycle_display_joins_fields() {
        let err = Error::CyclicDependency {
            table: "orders".into(),
            fields: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(
            err.to_string(),
            "Cyclic field dependency in table 'orders': a -> b -> a"
        );
    }

    #[test]
    fn test_source_retryable_flag() {
        assert!(Error::source_error("503", true).is_retryable());
        assert!(!Error::source_error("400", false).is_retryable());
    }

    #[test]
    fn test_io_error_carries_path() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = Error::io_with_path(io, "/tmp/table-config.json");
        assert!(err.to_string().contains("/tmp/table-config.json"));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_serde_error_not_retryable() {
        let serde_err = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let err: Error = serde_err.into();
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_error_implements_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
