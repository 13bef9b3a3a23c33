//! Pitch-bin axis and unit conversion
//!
//! The model predicts a distribution over `N` bins spaced evenly in cents
//! above a base frequency. Bin `0` starts at the base frequency and every
//! bin spans `cents_per_bin` cents.

use crate::OCTAVE;

/// Rounding applied when mapping a frequency onto the bin axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quantize {
    /// Round toward the lower bin
    #[default]
    Floor,
    /// Round toward the upper bin
    Ceil,
    /// Nearest bin
    Round,
}

impl Quantize {
    fn apply(self, value: f64) -> f64 {
        match self {
            Quantize::Floor => value.floor(),
            Quantize::Ceil => value.ceil(),
            Quantize::Round => value.round(),
        }
    }
}

/// Discretized log-frequency axis of the model output
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchAxis {
    /// Frequency of bin 0 (Hz)
    base_frequency: f64,
    /// Bin width (cents)
    cents_per_bin: f64,
    /// Number of bins
    bins: usize,
}

impl PitchAxis {
    /// Create a new axis
    pub fn new(base_frequency: f64, cents_per_bin: f64, bins: usize) -> Self {
        Self {
            base_frequency,
            cents_per_bin,
            bins,
        }
    }

    /// Number of bins
    pub fn bins(&self) -> usize {
        self.bins
    }

    /// Bin width in cents
    pub fn cents_per_bin(&self) -> f64 {
        self.cents_per_bin
    }

    /// Frequency of bin 0
    pub fn base_frequency(&self) -> f64 {
        self.base_frequency
    }

    /// Bins spanning one octave
    pub fn bins_per_octave(&self) -> f64 {
        OCTAVE / self.cents_per_bin
    }

    /// Highest frequency on the axis (upper edge of the last bin)
    pub fn max_frequency(&self) -> f64 {
        self.bin_to_frequency(self.bins as f64)
    }

    /// Frequency (Hz) to cents above the base frequency
    pub fn frequency_to_cents(&self, frequency: f64) -> f64 {
        OCTAVE * (frequency / self.base_frequency).log2()
    }

    /// Cents above the base frequency to frequency (Hz)
    pub fn cents_to_frequency(&self, cents: f64) -> f64 {
        self.base_frequency * 2f64.powf(cents / OCTAVE)
    }

    /// Fractional bin position to cents
    pub fn bin_to_cents(&self, bin: f64) -> f64 {
        bin * self.cents_per_bin
    }

    /// Fractional bin position to frequency (Hz)
    pub fn bin_to_frequency(&self, bin: f64) -> f64 {
        self.cents_to_frequency(self.bin_to_cents(bin))
    }

    /// Frequency to bin index, rounding down
    ///
    /// May be negative or exceed `bins()` for frequencies off the axis.
    pub fn frequency_to_bin(&self, frequency: f64) -> i64 {
        self.frequency_to_bin_with(frequency, Quantize::Floor)
    }

    /// Frequency to bin index with explicit rounding
    pub fn frequency_to_bin_with(&self, frequency: f64, quantize: Quantize) -> i64 {
        let bins = self.frequency_to_cents(frequency) / self.cents_per_bin;
        quantize.apply(bins) as i64
    }

    /// Frequency to a bin index clamped onto `[0, bins]`
    pub fn clamped_bin(&self, frequency: f64, quantize: Quantize) -> usize {
        self.frequency_to_bin_with(frequency, quantize)
            .clamp(0, self.bins as i64) as usize
    }
}

impl Default for PitchAxis {
    fn default() -> Self {
        use crate::defaults;
        Self::new(defaults::FMIN, defaults::CENTS_PER_BIN, defaults::PITCH_BINS)
    }
}

/// Seconds to a whole number of samples
pub fn seconds_to_samples(seconds: f64, sample_rate: u32) -> usize {
    (seconds * sample_rate as f64).round().max(0.0) as usize
}

/// Samples to seconds
pub fn samples_to_seconds(samples: usize, sample_rate: u32) -> f64 {
    samples as f64 / sample_rate as f64
}
