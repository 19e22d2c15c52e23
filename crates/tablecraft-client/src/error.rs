//! Error types for tablecraft-client

use thiserror::Error;

/// Result type alias for tablecraft-client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to the backend
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Error from tablecraft-core
    #[error("Core error: {0}")]
    Core(#[from] tablecraft_core::Error),

    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status
    #[error("HTTP {status}: {body}")]
    Status {
        /// Status code
        status: u16,
        /// Response body
        body: String,
    },

    /// Backend answered `success: false`
    #[error("API error: {message}")]
    Api {
        /// Server message
        message: String,
    },
}

impl Error {
    /// Create an API error.
    pub fn api<S: Into<String>>(message: S) -> Self {
        Self::Api {
            message: message.into(),
        }
    }

    /// Check if this error is retryable.
    ///
    /// Server errors, throttling, and transport failures other than
    /// malformed requests or bodies are retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Core(e) => e.is_retryable(),
            Self::Http(e) => !(e.is_builder() || e.is_decode() || e.is_body()),
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::Api { .. } => false,
        }
    }
}

impl From<Error> for tablecraft_core::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Core(inner) => inner,
            other => {
                let retryable = other.is_retryable();
                tablecraft_core::Error::source_error(other.to_string(), retryable)
            }
        }
    }
}
