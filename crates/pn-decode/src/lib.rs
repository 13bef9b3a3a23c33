//! PitchNet postprocessing
//!
//! Converts the model's scores over the pitch-bin axis into pitch (Hz) and
//! periodicity (voicing confidence):
//!
//! - **Range masking**: bins outside `[fmin, fmax]` never win
//! - **Decoders**: argmax, local average, global weighted average, viterbi
//! - **Periodicity**: entropy, max probability, in-range mass
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pn_decode::Postprocessor;
//!
//! let post = Postprocessor::new(&config);
//! let decoded = post.postprocess(&logits, config.fmin, config.fmax)?;
//! println!("{} frames", decoded.frames());
//! ```

pub mod decode;
mod error;
pub mod periodicity;
mod postprocess;
pub mod viterbi;

pub use error::{DecodeError, DecodeResult};
pub use postprocess::{DecodeStream, Decoded, Postprocessor};
pub use viterbi::{Transition, Trellis};
