//! Scoped inference mode
//!
//! Evaluation mode and precision are restored when the scope drops, on
//! success and on error alike.

use ndarray::Array3;

use crate::error::MlResult;
use crate::model::{ModelMode, PitchModel, Precision};

/// Model switched to inference settings for the lifetime of the scope
pub struct InferenceScope<'m> {
    model: &'m mut dyn PitchModel,
    previous_mode: ModelMode,
    previous_precision: Precision,
}

impl<'m> InferenceScope<'m> {
    /// Enter evaluation mode; mixed precision on accelerators
    pub fn enter(model: &'m mut dyn PitchModel) -> Self {
        let previous_mode = model.mode();
        let previous_precision = model.precision();

        model.set_mode(ModelMode::Eval);
        if model.device().is_accelerator() {
            model.set_precision(Precision::Mixed);
        }

        Self {
            model,
            previous_mode,
            previous_precision,
        }
    }

    /// Forward pass under inference settings
    pub fn forward(&mut self, frames: &Array3<f32>) -> MlResult<Array3<f32>> {
        self.model.forward(frames)
    }

    /// Wait for queued device work
    pub fn synchronize(&self) -> MlResult<()> {
        self.model.synchronize()
    }
}

impl Drop for InferenceScope<'_> {
    fn drop(&mut self) {
        self.model.set_precision(self.previous_precision);
        self.model.set_mode(self.previous_mode);
    }
}
