//! Error types surfaced by the model core.

use std::fmt;

/// Failures the forward-computation core can report to its caller.
///
/// There is no retry path: every variant is a programming or configuration
/// error and is propagated as-is.
#[derive(Debug)]
pub enum ModelError {
    /// The requested configuration is structurally invalid. Raised at
    /// construction time, before any parameter is allocated.
    InvalidConfig { message: String },
    /// A call-time tensor does not match the configured geometry.
    ShapeMismatch { context: String },
    /// A tensor-engine failure propagated to the caller.
    Backend(candle_core::Error),
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::InvalidConfig { message } => {
                write!(f, "invalid model configuration: {message}")
            }
            ModelError::ShapeMismatch { context } => {
                write!(f, "shape mismatch: {context}")
            }
            ModelError::Backend(err) => write!(f, "backend error: {err}"),
        }
    }
}

impl std::error::Error for ModelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ModelError::Backend(err) => Some(err),
            _ => None,
        }
    }
}

impl From<candle_core::Error> for ModelError {
    fn from(err: candle_core::Error) -> Self {
        ModelError::Backend(err)
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, ModelError>;
