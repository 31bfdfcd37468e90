//! Unified error types for the crate.

use thiserror::Error;

/// Errors surfaced by the analysis pipeline.
///
/// `Configuration` and `InsufficientData` are fatal and abort the run;
/// per-record anomalies in the VCF are never errors (they are silently
/// dropped and show up only in the scan counters).
#[derive(Error, Debug)]
pub enum BsaError {
    /// I/O errors (file missing, permission denied, read/write failures)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Tabular output errors
    #[error("output error: {0}")]
    Csv(#[from] csv::Error),

    /// Invalid run configuration (bad sample names, malformed masking file,
    /// incompatible option combinations)
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// The data are too sparse for the requested window/threshold settings
    #[error("insufficient data: {message}")]
    InsufficientData { message: String },

    /// Malformed input that cannot be skipped per-record
    #[error("parse error: {message}")]
    Parse { message: String },
}

pub type Result<T> = std::result::Result<T, BsaError>;

impl BsaError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn insufficient_data(message: impl Into<String>) -> Self {
        Self::InsufficientData {
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }
}
