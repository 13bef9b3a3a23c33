//! Model abstraction and the tract ONNX backend

use std::path::Path;

use ndarray::Array3;

use crate::device::Device;
use crate::error::{MlError, MlResult};

/// Execution mode of a model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelMode {
    /// Training behaviour (dropout, batch statistics)
    Train,
    /// Inference behaviour
    Eval,
}

/// Numeric precision of the forward pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    /// f32 throughout
    Full,
    /// Reduced precision where the backend supports it
    Mixed,
}

/// A loaded pitch classification network
///
/// `forward` maps frames shaped `(frames, 1, window)` to logits shaped
/// `(frames, pitch_bins, time_steps)`.
pub trait PitchModel: Send {
    /// Forward pass
    fn forward(&mut self, frames: &Array3<f32>) -> MlResult<Array3<f32>>;

    /// Device holding the weights
    fn device(&self) -> Device;

    /// Current execution mode
    fn mode(&self) -> ModelMode;

    /// Switch execution mode
    fn set_mode(&mut self, mode: ModelMode);

    /// Current precision
    fn precision(&self) -> Precision {
        Precision::Full
    }

    /// Switch precision; backends without reduced precision ignore this
    fn set_precision(&mut self, _precision: Precision) {}

    /// Block until queued device work has finished
    fn synchronize(&self) -> MlResult<()> {
        Ok(())
    }
}

/// Builds models from checkpoints
pub trait ModelLoader {
    /// Load `checkpoint` onto `device`
    fn load(&self, checkpoint: &Path, device: Device) -> MlResult<Box<dyn PitchModel>>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRACT BACKEND
// ═══════════════════════════════════════════════════════════════════════════════

type TractPlan = tract_onnx::prelude::SimplePlan<
    tract_onnx::prelude::TypedFact,
    Box<dyn tract_onnx::prelude::TypedOp>,
    tract_onnx::prelude::Graph<
        tract_onnx::prelude::TypedFact,
        Box<dyn tract_onnx::prelude::TypedOp>,
    >,
>;

/// ONNX model executed by tract on the CPU
pub struct TractModel {
    plan: TractPlan,
    mode: ModelMode,
}

impl TractModel {
    /// Load and optimize an ONNX graph
    pub fn load(path: &Path) -> MlResult<Self> {
        use tract_onnx::prelude::*;

        if !path.exists() {
            return Err(MlError::ModelNotFound {
                path: path.display().to_string(),
            });
        }

        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .map_err(|e| MlError::ModelLoadFailed {
                reason: e.to_string(),
            })?
            .into_optimized()
            .map_err(|e| MlError::TractError(e.to_string()))?
            .into_runnable()
            .map_err(|e| MlError::TractError(e.to_string()))?;

        Ok(Self {
            plan,
            mode: ModelMode::Train,
        })
    }
}

impl PitchModel for TractModel {
    fn forward(&mut self, frames: &Array3<f32>) -> MlResult<Array3<f32>> {
        use tract_onnx::prelude::*;

        let frames = frames.as_standard_layout();
        let data = frames.as_slice().ok_or_else(|| MlError::InferenceFailed {
            reason: "frames are not contiguous".into(),
        })?;
        let input = Tensor::from_shape::<f32>(frames.shape(), data)
            .map_err(|e| MlError::TractError(e.to_string()))?;

        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|e| MlError::TractError(e.to_string()))?;

        let output = outputs.first().ok_or_else(|| MlError::InferenceFailed {
            reason: "No output from model".into(),
        })?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| MlError::TractError(e.to_string()))?;

        let shape = view.shape().to_vec();
        let values: Vec<f32> = view.iter().copied().collect();
        logits_from_raw(&shape, values)
    }

    fn device(&self) -> Device {
        Device::Cpu
    }

    fn mode(&self) -> ModelMode {
        self.mode
    }

    fn set_mode(&mut self, mode: ModelMode) {
        self.mode = mode;
    }
}

/// Loads ONNX checkpoints with tract
#[derive(Debug, Clone, Copy, Default)]
pub struct TractLoader;

impl ModelLoader for TractLoader {
    fn load(&self, checkpoint: &Path, device: Device) -> MlResult<Box<dyn PitchModel>> {
        if device.is_accelerator() {
            return Err(MlError::GpuNotAvailable {
                reason: format!("tract backend runs on the CPU only (requested {})", device),
            });
        }

        log::info!("Loading model {} on {}", checkpoint.display(), device);
        Ok(Box::new(TractModel::load(checkpoint)?))
    }
}

/// Shape raw model output into `(frames, bins, time_steps)`
///
/// Two-dimensional `(frames, bins)` output gains a unit time axis.
fn logits_from_raw(shape: &[usize], values: Vec<f32>) -> MlResult<Array3<f32>> {
    let dims = match *shape {
        [frames, bins] => (frames, bins, 1),
        [frames, bins, steps] => (frames, bins, steps),
        _ => {
            return Err(MlError::InvalidOutputShape {
                expected: "2D or 3D tensor [frames, bins, (steps)]".into(),
                got: format!("{}D tensor {:?}", shape.len(), shape),
            });
        }
    };

    Array3::from_shape_vec(dims, values).map_err(|e| MlError::InvalidOutputShape {
        expected: format!("{:?}", dims),
        got: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_checkpoint() {
        let err = TractLoader
            .load(Path::new("/nonexistent/model.onnx"), Device::Cpu)
            .err()
            .unwrap();
        assert!(matches!(err, MlError::ModelNotFound { .. }));
    }

    #[test]
    fn test_gpu_rejected_by_tract() {
        let err = TractLoader
            .load(Path::new("/nonexistent/model.onnx"), Device::Gpu(0))
            .err()
            .unwrap();
        assert!(matches!(err, MlError::GpuNotAvailable { .. }));
    }

    #[test]
    fn test_logits_widened_to_three_axes() {
        let logits = logits_from_raw(&[2, 3], vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_eq!(logits.shape(), &[2, 3, 1]);
        assert_eq!(logits[[1, 2, 0]], 5.0);

        let logits = logits_from_raw(&[1, 2, 2], vec![0.0; 4]).unwrap();
        assert_eq!(logits.shape(), &[1, 2, 2]);
    }

    #[test]
    fn test_logits_bad_rank() {
        let err = logits_from_raw(&[4], vec![0.0; 4]).unwrap_err();
        assert!(matches!(err, MlError::InvalidOutputShape { .. }));

        let err = logits_from_raw(&[2, 3], vec![0.0; 5]).unwrap_err();
        assert!(matches!(err, MlError::InvalidOutputShape { .. }));
    }
}
