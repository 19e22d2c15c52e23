//! Error types for tablecraft-cli

use thiserror::Error;

/// Result type alias for tablecraft-cli operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tablecraft-cli
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Error from tablecraft-core or the engine
    #[error("{0}")]
    Core(#[from] tablecraft_core::Error),

    /// Error from tablecraft-client
    #[error("Client error: {0}")]
    Client(#[from] tablecraft_client::Error),

    /// Bad command-line input
    #[error("Invalid argument: {0}")]
    Usage(String),

    /// A record failed validation
    #[error("{count} validation error(s)")]
    Invalid {
        /// Number of violations
        count: usize,
    },
}

impl Error {
    /// Create a usage error.
    pub fn usage<S: Into<String>>(message: S) -> Self {
        Self::Usage(message.into())
    }
}
