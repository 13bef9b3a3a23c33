//! Pitch track files
//!
//! Each input produces two safetensors files next to the output prefix:
//! `<prefix>-pitch.safetensors` and `<prefix>-periodicity.safetensors`.
//! Each holds a single f32 tensor shaped `(1, frames)`.

use std::borrow::Cow;
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use ndarray::Array2;
use safetensors::SafeTensors;
use safetensors::tensor::{Dtype, View, serialize_to_file};

use crate::error::{PipelineError, PipelineResult};

/// Tensor name inside the pitch file
pub const PITCH_TENSOR: &str = "pitch";

/// Tensor name inside the periodicity file
pub const PERIODICITY_TENSOR: &str = "periodicity";

/// Files written for one input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub pitch: PathBuf,
    pub periodicity: PathBuf,
}

impl OutputPaths {
    /// Paths for an output prefix
    pub fn from_prefix(prefix: &Path) -> Self {
        Self {
            pitch: with_suffix(prefix, "-pitch.safetensors"),
            periodicity: with_suffix(prefix, "-periodicity.safetensors"),
        }
    }
}

/// Input path without its extension
pub fn default_prefix(input: &Path) -> PathBuf {
    input.with_extension("")
}

fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut path = OsString::from(prefix.as_os_str());
    path.push(suffix);
    PathBuf::from(path)
}

/// f32 tensor borrowed as little-endian bytes
struct TrackTensor {
    shape: Vec<usize>,
    data: Vec<u8>,
}

impl TrackTensor {
    fn new(values: &Array2<f32>) -> Self {
        let mut data = Vec::with_capacity(values.len() * 4);
        for value in values.iter() {
            data.extend_from_slice(&value.to_le_bytes());
        }
        Self {
            shape: values.shape().to_vec(),
            data,
        }
    }
}

impl View for TrackTensor {
    fn dtype(&self) -> Dtype {
        Dtype::F32
    }

    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn data(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(&self.data)
    }

    fn data_len(&self) -> usize {
        self.data.len()
    }
}

/// Write `values` as tensor `name`, replacing any existing file
pub fn write_track(
    path: &Path,
    name: &str,
    values: &Array2<f32>,
    metadata: &Option<HashMap<String, String>>,
) -> PipelineResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    serialize_to_file([(name, TrackTensor::new(values))], metadata, path)?;
    log::debug!("Wrote {} {:?} to {}", name, values.shape(), path.display());
    Ok(())
}

/// Read tensor `name` from a track file
pub fn read_track(path: &Path, name: &str) -> PipelineResult<Array2<f32>> {
    let bytes = std::fs::read(path)?;
    let tensors = SafeTensors::deserialize(&bytes)?;
    let tensor = tensors.tensor(name)?;

    let invalid = |reason: String| PipelineError::InvalidTrack {
        path: path.display().to_string(),
        reason,
    };

    if tensor.dtype() != Dtype::F32 {
        return Err(invalid(format!("expected F32, got {:?}", tensor.dtype())));
    }
    let (rows, cols) = match *tensor.shape() {
        [rows, cols] => (rows, cols),
        ref shape => return Err(invalid(format!("expected 2 dimensions, got {:?}", shape))),
    };

    let values = tensor
        .data()
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    Ok(Array2::from_shape_vec((rows, cols), values)?)
}

/// Metadata keys stored in the header of every track file
pub fn read_metadata(path: &Path) -> PipelineResult<HashMap<String, String>> {
    let bytes = std::fs::read(path)?;
    let (_, metadata) = SafeTensors::read_metadata(&bytes)?;
    Ok(metadata.metadata().clone().unwrap_or_default())
}
