//! Pitch estimation pipeline
//!
//! ```text
//! file ─load─→ audio ─resample─→ 8 kHz ─frame─→ batches
//!   batches ─model/infer─→ logits ─postprocess─→ pitch, periodicity
//!   pitch, periodicity ─concatenate─→ PitchTrack ─save─→ safetensors
//! ```
//!
//! Every stage is timed under the name shown above.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ndarray::Array2;
use pn_audio::{AudioDecoder, Framer, Resampler};
use pn_core::{PitchConfig, Timer, TimingReport};
use pn_decode::Postprocessor;
use pn_ml::{Device, InferenceRunner, ModelLoader, TractLoader};

use crate::error::{PipelineError, PipelineResult};
use crate::output::{self, OutputPaths, PERIODICITY_TENSOR, PITCH_TENSOR};

// ═══════════════════════════════════════════════════════════════════════════════
// PITCH TRACK
// ═══════════════════════════════════════════════════════════════════════════════

/// Pitch and periodicity for a whole input, shaped `(1, frames)`
#[derive(Debug, Clone, PartialEq)]
pub struct PitchTrack {
    /// Pitch (Hz)
    pub pitch: Array2<f32>,
    /// Voicing confidence in [0, 1]
    pub periodicity: Array2<f32>,
}

impl PitchTrack {
    /// Track with no frames
    pub fn empty() -> Self {
        Self {
            pitch: Array2::zeros((1, 0)),
            periodicity: Array2::zeros((1, 0)),
        }
    }

    /// Number of frames
    pub fn frames(&self) -> usize {
        self.pitch.ncols()
    }
}

/// Reported after each file of a multi-file run
#[derive(Debug, Clone, PartialEq)]
pub struct FileProgress {
    /// Files finished so far
    pub completed: usize,
    /// Files in the run
    pub total: usize,
    /// File just finished
    pub path: PathBuf,
}

impl FileProgress {
    /// Completed share of the run (0.0 - 1.0)
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ESTIMATOR
// ═══════════════════════════════════════════════════════════════════════════════

/// Runs audio through resampling, framing, inference and postprocessing
///
/// Owns the loaded model; it is loaded on first use and reused until the
/// checkpoint or device kind changes.
pub struct Estimator<L: ModelLoader = TractLoader> {
    config: PitchConfig,
    resampler: Resampler,
    runner: InferenceRunner<L>,
    postprocessor: Postprocessor,
    timer: Timer,
    /// Samples processed at the model rate, for the timing report
    samples: usize,
}

impl Estimator<TractLoader> {
    /// Estimator using the ONNX backend
    pub fn new(config: PitchConfig) -> PipelineResult<Self> {
        Self::with_loader(config, TractLoader)
    }
}

impl<L: ModelLoader> Estimator<L> {
    /// Estimator using a custom model loader
    pub fn with_loader(config: PitchConfig, loader: L) -> PipelineResult<Self> {
        config.validate()?;
        log::debug!(
            "Estimator '{}': decoder={} periodicity={} hop={}s",
            config.name,
            config.decoder,
            config.periodicity,
            config.hopsize
        );

        Ok(Self {
            resampler: Resampler::new(config.sample_rate),
            runner: InferenceRunner::new(loader),
            postprocessor: Postprocessor::new(&config),
            timer: Timer::new(),
            samples: 0,
            config,
        })
    }

    /// Active configuration
    pub fn config(&self) -> &PitchConfig {
        &self.config
    }

    /// Device inference runs on
    pub fn device(&self) -> Device {
        Device::from_gpu(self.config.gpu)
    }

    /// Synchronize accelerators after each batch so stage timers are exact
    pub fn set_benchmark(&mut self, benchmark: bool) {
        self.runner.set_benchmark(benchmark);
    }

    /// Stage timers
    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    /// Stage timings relative to the audio processed so far
    pub fn timing_report(&self) -> TimingReport {
        self.timer.report(self.samples, self.config.sample_rate)
    }

    /// Clear timers and the processed sample count
    pub fn reset_timer(&mut self) {
        self.timer.reset();
        self.samples = 0;
    }

    /// Number of checkpoint loads so far
    pub fn model_loads(&self) -> usize {
        self.runner.loads()
    }

    /// Estimate pitch and periodicity of mono audio at `sample_rate`
    pub fn from_audio(&mut self, audio: &[f32], sample_rate: u32) -> PipelineResult<PitchTrack> {
        let resampler = &mut self.resampler;
        let audio = self.timer.time("resample", || resampler.resample(audio, sample_rate))?;

        let framer = Framer::new(
            &audio,
            self.config.hop_samples(),
            self.config.window_size,
            self.config.batch_size,
        )?
        .with_normalization(self.config.normalize_frames);

        log::debug!(
            "{} samples -> {} frames in {} batches",
            audio.len(),
            framer.total_frames(),
            framer.num_batches()
        );

        let device = self.device();
        let checkpoint = self.config.checkpoint.as_path();
        let (fmin, fmax) = (self.config.fmin, self.config.fmax);

        let postprocessor = &self.postprocessor;
        let mut stream = postprocessor.stream(fmin, fmax)?;

        for batch in framer {
            let runner = &mut self.runner;
            self.timer
                .time("model", || runner.ensure_loaded(checkpoint, device).map(|_| ()))?;
            let logits = self
                .timer
                .time("infer", || runner.infer(&batch.frames, checkpoint, device))?;

            self.timer.time("postprocess", || stream.push(&logits))?;
            log::trace!("Batch at frame {}: {} frames", batch.start_frame, batch.len());
        }

        let decoded = self.timer.time("postprocess", || stream.finish());
        self.samples += audio.len();

        Ok(PitchTrack {
            pitch: decoded.pitch,
            periodicity: decoded.periodicity,
        })
    }

    /// Estimate pitch and periodicity of an audio file
    pub fn from_file(&mut self, path: &Path) -> PipelineResult<PitchTrack> {
        let buffer = self.timer.time("load", || AudioDecoder::decode(path))?;
        log::debug!(
            "Loaded {} ({:.2}s at {} Hz)",
            path.display(),
            buffer.duration(),
            buffer.sample_rate
        );
        self.from_audio(&buffer.samples, buffer.sample_rate)
    }

    /// Estimate an audio file and save the track next to `prefix`
    ///
    /// Without a prefix the input path minus its extension is used.
    pub fn from_file_to_file(&mut self, path: &Path, prefix: Option<&Path>) -> PipelineResult<OutputPaths> {
        let track = self.from_file(path)?;

        let prefix = prefix.map(Path::to_path_buf).unwrap_or_else(|| output::default_prefix(path));
        let paths = OutputPaths::from_prefix(&prefix);
        let metadata = Some(self.track_metadata());

        self.timer.time("save", || -> PipelineResult<()> {
            output::write_track(&paths.pitch, PITCH_TENSOR, &track.pitch, &metadata)?;
            output::write_track(&paths.periodicity, PERIODICITY_TENSOR, &track.periodicity, &metadata)
        })?;

        Ok(paths)
    }

    /// Estimate many files, one after another
    ///
    /// `progress` is called after each file. The first failure stops the run.
    pub fn from_files_to_files<F>(
        &mut self,
        files: &[PathBuf],
        prefixes: Option<&[PathBuf]>,
        mut progress: F,
    ) -> PipelineResult<Vec<OutputPaths>>
    where
        F: FnMut(&FileProgress),
    {
        if let Some(prefixes) = prefixes {
            if prefixes.len() != files.len() {
                return Err(PipelineError::PrefixCount {
                    files: files.len(),
                    prefixes: prefixes.len(),
                });
            }
        }

        let mut written = Vec::with_capacity(files.len());
        for (index, file) in files.iter().enumerate() {
            let prefix = prefixes.map(|prefixes| prefixes[index].as_path());
            log::info!("[{}] {} ({}/{})", self.config.name, file.display(), index + 1, files.len());

            written.push(self.from_file_to_file(file, prefix)?);

            progress(&FileProgress {
                completed: index + 1,
                total: files.len(),
                path: file.clone(),
            });
        }

        Ok(written)
    }

    fn track_metadata(&self) -> HashMap<String, String> {
        HashMap::from([
            ("config".to_string(), self.config.name.clone()),
            ("decoder".to_string(), self.config.decoder.to_string()),
            ("periodicity".to_string(), self.config.periodicity.to_string()),
            ("hopsize".to_string(), self.config.hopsize.to_string()),
            ("sample_rate".to_string(), self.config.sample_rate.to_string()),
            ("fmin".to_string(), self.config.fmin.to_string()),
            ("fmax".to_string(), self.config.fmax.to_string()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_track() {
        let track = PitchTrack::empty();
        assert_eq!(track.pitch.shape(), &[1, 0]);
        assert_eq!(track.frames(), 0);
    }

    #[test]
    fn test_progress_fraction() {
        let progress = FileProgress {
            completed: 1,
            total: 4,
            path: PathBuf::from("a.wav"),
        };
        assert_eq!(progress.fraction(), 0.25);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = PitchConfig {
            fmin: 500.0,
            fmax: 100.0,
            ..PitchConfig::default()
        };
        assert!(matches!(Estimator::new(config), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_range_off_axis_rejected_up_front() {
        let config = PitchConfig {
            fmin: 2500.0,
            fmax: 4000.0,
            ..PitchConfig::default()
        };
        assert!(matches!(Estimator::new(config), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_gpu_request_fails_on_tract() {
        let config = PitchConfig {
            gpu: Some(0),
            ..PitchConfig::default()
        };
        let mut estimator = Estimator::new(config).unwrap();
        let err = estimator.from_audio(&[0.0; 800], 8000).unwrap_err();
        assert!(matches!(err, PipelineError::Model(pn_ml::MlError::GpuNotAvailable { .. })));
    }
}
