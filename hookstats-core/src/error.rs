//! Error types for hookstats-core

use thiserror::Error;

/// Main error type for the hookstats-core library
///
/// These errors stay inside the library: each pipeline component turns them
/// into its own outcome value before returning to the caller.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid log discovery pattern
    #[error("invalid log pattern: {0}")]
    Glob(String),
}

impl From<glob::PatternError> for Error {
    fn from(e: glob::PatternError) -> Self {
        Error::Glob(e.to_string())
    }
}

/// Result type alias for hookstats-core
pub type Result<T> = std::result::Result<T, Error>;
