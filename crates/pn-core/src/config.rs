//! Estimator configuration
//!
//! Strategy names are parsed into enums when the configuration is built, so
//! an unknown decoder or periodicity method fails before any audio is read.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::convert::{PitchAxis, Quantize, seconds_to_samples};
use crate::defaults;
use crate::error::{CoreError, CoreResult};

// ═══════════════════════════════════════════════════════════════════════════════
// STRATEGIES
// ═══════════════════════════════════════════════════════════════════════════════

/// Transition parameters of the viterbi decoder family
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViterbiParams {
    /// Fastest allowed pitch movement
    pub max_octaves_per_second: f64,
}

impl Default for ViterbiParams {
    fn default() -> Self {
        Self {
            max_octaves_per_second: defaults::MAX_OCTAVES_PER_SECOND,
        }
    }
}

/// Pitch decoding strategy
///
/// Textual form: `argmax`, `average`, `weighted`, `viterbi` or
/// `viterbi-<octaves per second>`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Decoder {
    /// Highest-scoring bin
    Argmax,
    /// Softmax centroid in a local window around the peak
    Average,
    /// Globally smoothest path through the bin trellis
    Viterbi(ViterbiParams),
    /// Softmax centroid over every allowed bin
    Weighted,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::Average
    }
}

impl FromStr for Decoder {
    type Err = CoreError;

    fn from_str(name: &str) -> CoreResult<Self> {
        match name {
            "argmax" => Ok(Self::Argmax),
            "average" => Ok(Self::Average),
            "weighted" => Ok(Self::Weighted),
            "viterbi" => Ok(Self::Viterbi(ViterbiParams::default())),
            _ => {
                let rate = name
                    .strip_prefix("viterbi-")
                    .and_then(|rate| rate.parse::<f64>().ok())
                    .filter(|rate| rate.is_finite() && *rate > 0.0)
                    .ok_or_else(|| CoreError::UnknownDecoder(name.to_string()))?;
                Ok(Self::Viterbi(ViterbiParams {
                    max_octaves_per_second: rate,
                }))
            }
        }
    }
}

impl fmt::Display for Decoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Argmax => f.write_str("argmax"),
            Self::Average => f.write_str("average"),
            Self::Weighted => f.write_str("weighted"),
            Self::Viterbi(params) if *params == ViterbiParams::default() => f.write_str("viterbi"),
            Self::Viterbi(params) => write!(f, "viterbi-{}", params.max_octaves_per_second),
        }
    }
}

impl TryFrom<String> for Decoder {
    type Error = CoreError;

    fn try_from(name: String) -> CoreResult<Self> {
        name.parse()
    }
}

impl From<Decoder> for String {
    fn from(decoder: Decoder) -> Self {
        decoder.to_string()
    }
}

/// Periodicity (voicing confidence) strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(try_from = "String", into = "String")]
pub enum PeriodicityMethod {
    /// One minus the normalized entropy of the bin distribution
    #[default]
    Entropy,
    /// Probability of the most likely bin
    Max,
    /// Probability mass inside the allowed frequency range
    Sum,
}

impl FromStr for PeriodicityMethod {
    type Err = CoreError;

    fn from_str(name: &str) -> CoreResult<Self> {
        match name {
            "entropy" => Ok(Self::Entropy),
            "max" => Ok(Self::Max),
            "sum" => Ok(Self::Sum),
            _ => Err(CoreError::UnknownPeriodicity(name.to_string())),
        }
    }
}

impl fmt::Display for PeriodicityMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Entropy => "entropy",
            Self::Max => "max",
            Self::Sum => "sum",
        })
    }
}

impl TryFrom<String> for PeriodicityMethod {
    type Error = CoreError;

    fn try_from(name: String) -> CoreResult<Self> {
        name.parse()
    }
}

impl From<PeriodicityMethod> for String {
    fn from(method: PeriodicityMethod) -> Self {
        method.to_string()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIG
// ═══════════════════════════════════════════════════════════════════════════════

/// Pitch estimator configuration
///
/// Every field has a default, so a JSON file only needs the keys it
/// overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PitchConfig {
    /// Configuration name (used in progress messages)
    pub name: String,

    /// Model input sample rate (Hz)
    pub sample_rate: u32,

    /// Hop between frames (seconds)
    pub hopsize: f64,

    /// Analysis window (samples)
    pub window_size: usize,

    /// Lowest allowed output frequency (Hz)
    pub fmin: f64,

    /// Highest allowed output frequency (Hz)
    pub fmax: f64,

    /// Frequency of the first pitch bin (Hz)
    pub base_frequency: f64,

    /// Width of a pitch bin (cents)
    pub cents_per_bin: f64,

    /// Number of pitch bins predicted by the model
    pub pitch_bins: usize,

    /// Bins used by the local average decoder
    pub local_window: usize,

    /// Pitch decoder
    pub decoder: Decoder,

    /// Periodicity method
    pub periodicity: PeriodicityMethod,

    /// Normalize each frame to zero mean and unit variance
    pub normalize_frames: bool,

    /// Model checkpoint
    pub checkpoint: PathBuf,

    /// Frames per inference call (None = all frames at once)
    pub batch_size: Option<usize>,

    /// GPU index (None = CPU)
    pub gpu: Option<usize>,
}

impl Default for PitchConfig {
    fn default() -> Self {
        Self {
            name: defaults::CONFIG_NAME.to_string(),
            sample_rate: defaults::SAMPLE_RATE,
            hopsize: defaults::HOPSIZE_SECONDS,
            window_size: defaults::WINDOW_SIZE,
            fmin: defaults::FMIN,
            fmax: defaults::FMAX,
            base_frequency: defaults::FMIN,
            cents_per_bin: defaults::CENTS_PER_BIN,
            pitch_bins: defaults::PITCH_BINS,
            local_window: defaults::LOCAL_PITCH_WINDOW_SIZE,
            decoder: Decoder::default(),
            periodicity: PeriodicityMethod::default(),
            normalize_frames: true,
            checkpoint: PathBuf::from(defaults::DEFAULT_CHECKPOINT),
            batch_size: None,
            gpu: None,
        }
    }
}

impl PitchConfig {
    /// Load a (partial) configuration from a JSON file and validate it
    pub fn from_json_file(path: &Path) -> CoreResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&text)?;
        log::debug!("Loaded configuration '{}' from {}", config.name, path.display());
        Ok(config)
    }

    /// Parse a (partial) configuration from JSON text and validate it
    pub fn from_json_str(text: &str) -> CoreResult<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> CoreResult<()> {
        if self.sample_rate == 0 {
            return Err(CoreError::InvalidConfig("sample rate must be positive".into()));
        }
        if !(self.hopsize.is_finite() && self.hopsize > 0.0) || self.hop_samples() == 0 {
            return Err(CoreError::InvalidConfig(format!(
                "hopsize {} s is less than one sample at {} Hz",
                self.hopsize, self.sample_rate
            )));
        }
        if self.window_size < self.hop_samples() {
            return Err(CoreError::InvalidConfig(format!(
                "window of {} samples is shorter than the hop of {} samples",
                self.window_size,
                self.hop_samples()
            )));
        }
        if self.pitch_bins == 0 || !(self.cents_per_bin > 0.0) || !(self.base_frequency > 0.0) {
            return Err(CoreError::InvalidConfig("empty pitch-bin axis".into()));
        }
        if !(self.fmin > 0.0 && self.fmin < self.fmax) {
            return Err(CoreError::InvalidFrequencyRange {
                min: self.fmin,
                max: self.fmax,
            });
        }
        let axis = self.axis();
        if axis.clamped_bin(self.fmin, Quantize::Floor) >= axis.clamped_bin(self.fmax, Quantize::Ceil) {
            return Err(CoreError::InvalidConfig(format!(
                "frequency range {} - {} Hz lies outside the pitch-bin axis ({:.1} - {:.1} Hz)",
                self.fmin,
                self.fmax,
                axis.bin_to_frequency(0.0),
                axis.bin_to_frequency(axis.bins() as f64)
            )));
        }
        if self.batch_size == Some(0) {
            return Err(CoreError::InvalidConfig("batch size must be positive".into()));
        }
        if self.local_window == 0 {
            return Err(CoreError::InvalidConfig("local window must be positive".into()));
        }
        Ok(())
    }

    /// Pitch-bin axis of the model output
    pub fn axis(&self) -> PitchAxis {
        PitchAxis::new(self.base_frequency, self.cents_per_bin, self.pitch_bins)
    }

    /// Hop in samples at the model sample rate
    pub fn hop_samples(&self) -> usize {
        seconds_to_samples(self.hopsize, self.sample_rate)
    }
}
