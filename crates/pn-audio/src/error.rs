//! Error types for audio input

use thiserror::Error;

/// Audio input errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Input file not found: {0}")]
    InputNotFound(String),

    #[error("Failed to read audio file: {0}")]
    ReadError(String),

    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    #[error("Sample rate conversion failed: {0}")]
    SampleRateConversion(String),

    #[error("Invalid framing: {0}")]
    InvalidFraming(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;
