//! # PitchNet Inference
//!
//! Runs the pitch classification network over batches of frames.
//!
//! ## Architecture
//!
//! - [`ModelLoader`] turns a checkpoint into a [`PitchModel`] on a [`Device`]
//! - [`InferenceRunner`] owns the loaded model and reloads it only when the
//!   checkpoint or device kind changes
//! - [`InferenceScope`] puts the model in evaluation mode (mixed precision on
//!   accelerators) for the duration of a forward pass and restores it on drop
//!
//! The default backend is `tract` (pure Rust, CPU). Other engines plug in by
//! implementing the two traits.

mod device;
mod error;
mod model;
mod runner;
mod scope;

pub use device::{Device, DeviceKind};
pub use error::{MlError, MlResult};
pub use model::{ModelLoader, ModelMode, PitchModel, Precision, TractLoader, TractModel};
pub use runner::InferenceRunner;
pub use scope::InferenceScope;
