// src/error.rs
//
// Error taxonomy for the analysis engine.

use serde::Serialize;
use thiserror::Error;

/// Errors raised by the engine
#[derive(Debug, Error)]
pub enum SpectroError {
    /// Container or codec not recognized; the session never starts producing
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Corrupt or truncated stream data, or transient I/O that did not recover
    #[error("decode error: {0}")]
    Decode(String),

    /// Invalid parameter combination, rejected before any decoding
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Operation not allowed in the session's current state
    #[error("invalid session state: {0}")]
    InvalidState(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpectroError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SpectroError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            SpectroError::Decode(_) => ErrorKind::Decode,
            SpectroError::Configuration(_) => ErrorKind::Configuration,
            SpectroError::InvalidState(_) => ErrorKind::InvalidState,
            SpectroError::Io(_) => ErrorKind::Io,
        }
    }
}

/// Error category reported with a `Failed` terminal notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnsupportedFormat,
    Decode,
    Configuration,
    InvalidState,
    Io,
}

impl ErrorKind {
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::UnsupportedFormat => "UnsupportedFormatError",
            ErrorKind::Decode => "DecodeError",
            ErrorKind::Configuration => "ConfigurationError",
            ErrorKind::InvalidState => "InvalidStateError",
            ErrorKind::Io => "IoError",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

pub type Result<T> = std::result::Result<T, SpectroError>;
