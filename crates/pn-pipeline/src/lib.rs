//! # PitchNet Estimator
//!
//! Neural pitch and periodicity estimation for audio:
//!
//! - `from_audio`: samples in memory to a [`PitchTrack`]
//! - `from_file`: any format symphonia decodes
//! - `from_file_to_file`: track saved as safetensors next to a prefix
//! - `from_files_to_files`: many files in sequence with progress reports
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pn_core::PitchConfig;
//! use pn_pipeline::Estimator;
//!
//! let mut estimator = Estimator::new(PitchConfig::default())?;
//! let track = estimator.from_file(Path::new("voice.wav"))?;
//! println!("{} frames", track.frames());
//! ```

mod error;
pub mod output;
mod pipeline;

pub use error::{PipelineError, PipelineResult};
pub use output::OutputPaths;
pub use pipeline::{Estimator, FileProgress, PitchTrack};
