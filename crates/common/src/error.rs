//! Error types shared across clothstim crates.

use std::path::PathBuf;

/// Top-level error type for stimulus setup and export.
///
/// Runtime degeneracies (empty selections, zero durations) are not errors;
/// they are absorbed by the engine and reported in the trial result.
#[derive(Debug, thiserror::Error)]
pub enum StimulusError {
    /// Missing or invalid grid, timing, or size-bound parameters.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Malformed or inconsistent trajectory input.
    #[error("Data error: {message}")]
    Data { message: String },

    /// Telemetry export failed.
    #[error("Export error: {message}")]
    Export { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using StimulusError.
pub type StimulusResult<T> = Result<T, StimulusError>;

impl StimulusError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

    pub fn data(msg: impl Into<String>) -> Self {
        Self::Data {
            message: msg.into(),
        }
    }

    pub fn export(msg: impl Into<String>) -> Self {
        Self::Export {
            message: msg.into(),
        }
    }

    /// Whether this error should abort setup before any tick executes.
    pub fn is_setup_error(&self) -> bool {
        matches!(self, Self::Configuration { .. } | Self::Data { .. })
    }
}
