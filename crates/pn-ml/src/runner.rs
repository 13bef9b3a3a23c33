//! Cached model execution
//!
//! The runner owns at most one loaded model. It is reused while the
//! checkpoint path and device kind match the previous call and replaced
//! otherwise.

use std::path::{Path, PathBuf};

use ndarray::Array3;

use crate::device::{Device, DeviceKind};
use crate::error::MlResult;
use crate::model::{ModelLoader, PitchModel, TractLoader};
use crate::scope::InferenceScope;

/// Model currently held by the runner
struct LoadedModel {
    model: Box<dyn PitchModel>,
    checkpoint: PathBuf,
    device_kind: DeviceKind,
}

/// Owns the loaded model and runs batches through it
pub struct InferenceRunner<L: ModelLoader = TractLoader> {
    /// Checkpoint loader
    loader: L,
    /// Cached model
    loaded: Option<LoadedModel>,
    /// Block on device work after each forward pass
    benchmark: bool,
    /// Number of checkpoint loads so far
    loads: usize,
}

impl Default for InferenceRunner<TractLoader> {
    fn default() -> Self {
        Self::new(TractLoader)
    }
}

impl<L: ModelLoader> InferenceRunner<L> {
    /// Create runner with no model loaded
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            loaded: None,
            benchmark: false,
            loads: 0,
        }
    }

    /// Synchronize accelerators after every forward pass so timers see the
    /// full cost of inference
    pub fn set_benchmark(&mut self, benchmark: bool) {
        self.benchmark = benchmark;
    }

    /// Benchmark mode enabled
    pub fn benchmark(&self) -> bool {
        self.benchmark
    }

    /// Checkpoint loads performed so far
    pub fn loads(&self) -> usize {
        self.loads
    }

    /// Whether a model for `checkpoint` on `device` is already cached
    pub fn is_loaded(&self, checkpoint: &Path, device: Device) -> bool {
        self.loaded
            .as_ref()
            .is_some_and(|loaded| loaded.checkpoint == checkpoint && loaded.device_kind == device.kind())
    }

    /// Load `checkpoint` onto `device` unless it is already cached
    pub fn ensure_loaded(&mut self, checkpoint: &Path, device: Device) -> MlResult<&mut dyn PitchModel> {
        let loaded = match self.loaded.take() {
            Some(loaded) if loaded.checkpoint == checkpoint && loaded.device_kind == device.kind() => loaded,
            previous => {
                if let Some(previous) = previous {
                    log::debug!(
                        "Replacing model {} ({:?})",
                        previous.checkpoint.display(),
                        previous.device_kind
                    );
                    // Old weights are released before the new ones load
                    drop(previous);
                }

                let model = self.loader.load(checkpoint, device)?;
                self.loads += 1;
                LoadedModel {
                    model,
                    checkpoint: checkpoint.to_path_buf(),
                    device_kind: device.kind(),
                }
            }
        };

        Ok(self.loaded.insert(loaded).model.as_mut())
    }

    /// Forward `frames` through the model for `checkpoint` on `device`
    ///
    /// Returns logits shaped `(frames, bins, time_steps)`.
    pub fn infer(&mut self, frames: &Array3<f32>, checkpoint: &Path, device: Device) -> MlResult<Array3<f32>> {
        let benchmark = self.benchmark;
        let model = self.ensure_loaded(checkpoint, device)?;

        let mut scope = InferenceScope::enter(model);
        let logits = scope.forward(frames)?;

        if benchmark && device.is_accelerator() {
            scope.synchronize()?;
        }

        log::trace!("Inferred {} frames -> {:?}", frames.shape()[0], logits.shape());
        Ok(logits)
    }

    /// Release the cached model
    pub fn unload(&mut self) {
        self.loaded = None;
    }
}
