//! Error types

use thiserror::Error;

/// Errors surfaced synchronously by scheduling and construction calls
///
/// Ticking never produces errors; every failure belongs to the call that
/// caused it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CadenzaError {
    /// An argument was missing or unusable (unknown preset, absent targets,
    /// absent duration, non-finite offsets)
    #[error("Invalid argument `{field}`: {reason}")]
    InvalidArgument { field: String, reason: String },

    /// The keyframe pipeline rejected its input
    #[error("Keyframe error: {0}")]
    Keyframe(String),

    /// A preset file could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CadenzaError {
    /// Build an [`CadenzaError::InvalidArgument`] naming the offending field
    pub fn invalid_arg(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. })
    }
}

/// Result type for Cadenza operations
pub type Result<T> = std::result::Result<T, CadenzaError>;
