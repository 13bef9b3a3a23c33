//! Error types for inference

use thiserror::Error;

/// Inference error types
#[derive(Error, Debug)]
pub enum MlError {
    /// Checkpoint file not found
    #[error("Model not found: {path}")]
    ModelNotFound { path: String },

    /// Checkpoint could not be turned into a runnable model
    #[error("Failed to load model: {reason}")]
    ModelLoadFailed { reason: String },

    /// Forward pass failed
    #[error("Inference failed: {reason}")]
    InferenceFailed { reason: String },

    /// Invalid output shape
    #[error("Invalid output shape: expected {expected}, got {got}")]
    InvalidOutputShape { expected: String, got: String },

    /// Requested device is not provided by the backend
    #[error("GPU acceleration not available: {reason}")]
    GpuNotAvailable { reason: String },

    /// Tract error
    #[error("Tract error: {0}")]
    TractError(String),
}

/// Result type for inference operations
pub type MlResult<T> = Result<T, MlError>;
