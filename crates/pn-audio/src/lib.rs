//! # PitchNet Audio Input
//!
//! Everything between an audio file and a batch of model input frames:
//!
//! ```text
//! ┌──────────────┐   ┌─────────────┐   ┌──────────────────────────────┐
//! │ AudioDecoder │ → │ Resampler   │ → │ Framer                       │
//! │ (symphonia)  │   │ (rubato)    │   │ pad, unfold, batch, normalize│
//! └──────────────┘   └─────────────┘   └──────────────────────────────┘
//! ```

mod decoder;
mod error;
mod framer;
mod resample;

pub use decoder::AudioDecoder;
pub use error::{AudioError, AudioResult};
pub use framer::{FrameBatch, Framer};
pub use resample::Resampler;

/// Mono audio at a known sample rate
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Samples in [-1, 1]
    pub samples: Vec<f32>,
    /// Sample rate (Hz)
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Wrap mono samples
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Mix interleaved multichannel samples down to mono
    pub fn from_interleaved(interleaved: &[f32], channels: usize, sample_rate: u32) -> Self {
        if channels <= 1 {
            return Self::new(interleaved.to_vec(), sample_rate);
        }

        let samples = interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect();

        Self::new(samples, sample_rate)
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// No samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        pn_core::samples_to_seconds(self.samples.len(), self.sample_rate)
    }
}
