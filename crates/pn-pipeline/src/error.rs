//! Error types for the estimator

use pn_audio::AudioError;
use pn_core::CoreError;
use pn_decode::DecodeError;
use pn_ml::MlError;
use safetensors::tensor::SafeTensorError;
use thiserror::Error;

/// Estimator errors
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] CoreError),

    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Model error: {0}")]
    Model(#[from] MlError),

    #[error("Decoding error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("safetensors error: {0}")]
    SafeTensors(#[from] SafeTensorError),

    #[error("Invalid track file {path}: {reason}")]
    InvalidTrack { path: String, reason: String },

    #[error("Got {prefixes} output prefixes for {files} files")]
    PrefixCount { files: usize, prefixes: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for estimator operations
pub type PipelineResult<T> = Result<T, PipelineError>;
