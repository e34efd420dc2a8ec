//! Error types for folio.

use thiserror::Error;

/// Result type alias using folio's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for folio operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Live channel transport failed (handshake, read, or write)
    #[error("Transport error: {0}")]
    Transport(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
