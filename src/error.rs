//! Error types and result utilities for recording and signal operations.

use thiserror::Error;

/// Convenience type alias for results that may contain LfpError
pub type LfpResult<T> = Result<T, LfpError>;

/// Error types that can occur while loading recordings or processing signals.
#[derive(Error, Debug)]
pub enum LfpError {
    /// A value failed validation.
    ///
    /// Raised for out-of-range sample indices, invalid filter cutoffs,
    /// malformed event tables, empty channel selections and zero-length ranges.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An argument named something that does not exist.
    ///
    /// This happens when an unknown channel-group name is requested.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The recording source produced data that does not match its own metadata.
    #[error("Recording format error: {0}")]
    Format(String),

    /// Reading or writing a channel-layout file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A channel-layout document could not be parsed or serialized.
    #[error("Channel layout JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LfpError {
    /// Creates a [`LfpError::Validation`] from any message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Creates a [`LfpError::InvalidArgument`] from any message.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Creates a [`LfpError::Format`] from any message.
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }
}
