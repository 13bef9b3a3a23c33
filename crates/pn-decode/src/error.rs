//! Error types for postprocessing

use thiserror::Error;

/// Postprocessing error types
#[derive(Error, Debug)]
pub enum DecodeError {
    /// No pitch bin lies inside the requested frequency range
    #[error("Frequency range {fmin} Hz - {fmax} Hz covers no pitch bins")]
    EmptyRange { fmin: f64, fmax: f64 },

    /// Logits do not match the configured pitch-bin axis
    #[error("Expected {expected} pitch bins, got {got}")]
    BinMismatch { expected: usize, got: usize },

    /// A later batch has a different number of time steps
    #[error("Expected {expected} time steps per frame, got {got}")]
    StepMismatch { expected: usize, got: usize },

    /// Every allowed score of a frame is -inf or NaN
    #[error("Frame {frame} has no finite score inside the allowed range")]
    DegenerateFrame { frame: usize },
}

/// Result type for postprocessing
pub type DecodeResult<T> = Result<T, DecodeError>;
