//! # PitchNet Core
//!
//! Shared building blocks for neural pitch and periodicity estimation:
//! - **Pitch-bin axis**: log-frequency discretization of the model output
//! - **Configuration**: validated estimator settings with strategy enums
//! - **Timing**: named stage timers and real-time-factor reports
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pn_core::{PitchConfig, Decoder};
//!
//! let config = PitchConfig {
//!     decoder: "viterbi".parse::<Decoder>()?,
//!     ..Default::default()
//! };
//! config.validate()?;
//!
//! let axis = config.axis();
//! let bin = axis.frequency_to_bin(440.0);
//! ```

pub mod config;
pub mod convert;
pub mod time;

mod error;

pub use config::{Decoder, PeriodicityMethod, PitchConfig, ViterbiParams};
pub use convert::{PitchAxis, Quantize, samples_to_seconds, seconds_to_samples};
pub use error::{CoreError, CoreResult};
pub use time::{Timer, TimingEntry, TimingReport};

/// Model constants of the default checkpoint
pub mod defaults {
    /// Model input sample rate (Hz)
    pub const SAMPLE_RATE: u32 = 8000;

    /// Hop between frames (seconds)
    pub const HOPSIZE_SECONDS: f64 = 0.01;

    /// Analysis window (samples)
    pub const WINDOW_SIZE: usize = 1024;

    /// Lowest representable frequency; also the first bin (Hz)
    pub const FMIN: f64 = 31.0;

    /// Highest representable frequency (Hz)
    pub const FMAX: f64 = 1984.0;

    /// Width of one pitch bin (cents)
    pub const CENTS_PER_BIN: f64 = 5.0;

    /// Number of pitch bins predicted by the model
    pub const PITCH_BINS: usize = 1440;

    /// Bins considered by the local average decoder
    pub const LOCAL_PITCH_WINDOW_SIZE: usize = 19;

    /// Fastest pitch movement allowed by the viterbi decoder
    pub const MAX_OCTAVES_PER_SECOND: f64 = 35.92;

    /// Default checkpoint location
    pub const DEFAULT_CHECKPOINT: &str = "models/fcnf0++.onnx";

    /// Default configuration name
    pub const CONFIG_NAME: &str = "fcnf0++";
}

/// Cents per octave
pub const OCTAVE: f64 = 1200.0;
