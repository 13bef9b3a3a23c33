//! Sample rate conversion using rubato
//!
//! Normalizes input audio to the model sample rate. Sinc filters are built
//! once per source rate and reused across files.

use std::borrow::Cow;
use std::collections::HashMap;

use rubato::{
    Resampler as _, SincFixedIn, SincInterpolationParameters, SincInterpolationType,
    WindowFunction,
};

use crate::error::{AudioError, AudioResult};

/// Input frames per resampler call
const CHUNK_SIZE: usize = 1024;

/// Bandlimited resampler to a fixed target rate
pub struct Resampler {
    /// Output sample rate
    target_rate: u32,
    /// Filters keyed by source rate
    filters: HashMap<u32, SincFixedIn<f32>>,
}

impl Resampler {
    /// Create resampler producing `target_rate` audio
    pub fn new(target_rate: u32) -> Self {
        Self {
            target_rate,
            filters: HashMap::new(),
        }
    }

    /// Output sample rate
    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    /// Number of cached filters
    pub fn cached_filters(&self) -> usize {
        self.filters.len()
    }

    /// Resample `samples` from `source_rate` to the target rate
    ///
    /// Returns the input unchanged when the rates already match. The output
    /// holds `floor(len * target / source)` samples with the filter delay
    /// removed.
    pub fn resample<'a>(&mut self, samples: &'a [f32], source_rate: u32) -> AudioResult<Cow<'a, [f32]>> {
        if source_rate == 0 {
            return Err(AudioError::InvalidSampleRate(source_rate));
        }
        if source_rate == self.target_rate {
            return Ok(Cow::Borrowed(samples));
        }

        let ratio = self.target_rate as f64 / source_rate as f64;
        let expected_len = (samples.len() as f64 * ratio) as usize;
        if expected_len == 0 {
            return Ok(Cow::Owned(Vec::new()));
        }

        let resampler = match self.filters.entry(source_rate) {
            std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::hash_map::Entry::Vacant(entry) => {
                log::debug!("Building resampler {} Hz -> {} Hz", source_rate, self.target_rate);
                entry.insert(Self::build(ratio)?)
            }
        };
        resampler.reset();

        let delay = resampler.output_delay();
        let mut output = Vec::with_capacity(expected_len + delay + CHUNK_SIZE);

        let mut chunks = samples.chunks_exact(CHUNK_SIZE);
        for chunk in &mut chunks {
            let resampled = resampler
                .process(&[chunk], None)
                .map_err(|e| AudioError::SampleRateConversion(e.to_string()))?;
            output.extend_from_slice(&resampled[0]);
        }

        let remainder = chunks.remainder();
        if !remainder.is_empty() {
            let tail: [&[f32]; 1] = [remainder];
            let resampled = resampler
                .process_partial(Some(&tail[..]), None)
                .map_err(|e| AudioError::SampleRateConversion(e.to_string()))?;
            output.extend_from_slice(&resampled[0]);
        }

        // Flush the filter tail
        while output.len() < expected_len + delay {
            let flush: Option<&[Vec<f32>]> = None;
            let resampled = resampler
                .process_partial(flush, None)
                .map_err(|e| AudioError::SampleRateConversion(e.to_string()))?;
            if resampled[0].is_empty() {
                break;
            }
            output.extend_from_slice(&resampled[0]);
        }

        output.drain(..delay.min(output.len()));
        output.truncate(expected_len);
        output.resize(expected_len, 0.0);

        Ok(Cow::Owned(output))
    }

    fn build(ratio: f64) -> AudioResult<SincFixedIn<f32>> {
        let params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };

        SincFixedIn::<f32>::new(ratio, 1.0, params, CHUNK_SIZE, 1)
            .map_err(|e| AudioError::SampleRateConversion(format!("Failed to create resampler: {}", e)))
    }
}
