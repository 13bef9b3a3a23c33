//! Error types for configuration and conversion

use thiserror::Error;

/// Core errors
#[derive(Debug, Error)]
pub enum CoreError {
    /// Unknown pitch decoder name
    #[error("Decoder method {0} is not defined")]
    UnknownDecoder(String),

    /// Unknown periodicity method name
    #[error("Periodicity method {0} is not defined")]
    UnknownPeriodicity(String),

    /// Invalid frequency range
    #[error("Invalid frequency range: {min} - {max} Hz")]
    InvalidFrequencyRange { min: f64, max: f64 },

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be parsed
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;
