//! Frame extraction
//!
//! Slices audio into overlapping, centered analysis windows:
//! `total_frames = floor(samples / hop)` and the audio is zero-padded by
//! `(window - hop) / 2` on each side so frame `i` is centered on sample
//! `i * hop + hop / 2`. Frames are emitted in batches of `batch_size`.

use ndarray::{Array3, ArrayViewMut1, Axis};

use crate::error::{AudioError, AudioResult};

/// Standard deviation floor used by frame normalization
const NORMALIZE_EPSILON: f32 = 1e-10;

/// One batch of model input frames
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBatch {
    /// Frames shaped `(frames, 1, window)`
    pub frames: Array3<f32>,
    /// Index of the first frame within the whole input
    pub start_frame: usize,
}

impl FrameBatch {
    /// Number of frames in the batch
    pub fn len(&self) -> usize {
        self.frames.len_of(Axis(0))
    }

    /// Batch holds no frames
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Restartable batch iterator over centered frames
#[derive(Debug, Clone)]
pub struct Framer {
    /// Zero-padded audio
    padded: Vec<f32>,
    /// Hop (samples)
    hop: usize,
    /// Window (samples)
    window: usize,
    /// Frames per batch
    batch_size: usize,
    /// Total frames in the input
    total_frames: usize,
    /// Normalize each frame
    normalize: bool,
    /// Next frame to emit
    cursor: usize,
}

impl Framer {
    /// Create framer
    ///
    /// `batch_size` of `None` emits every frame in a single batch.
    pub fn new(
        audio: &[f32],
        hop: usize,
        window: usize,
        batch_size: Option<usize>,
    ) -> AudioResult<Self> {
        if hop == 0 {
            return Err(AudioError::InvalidFraming("hop must be at least one sample".into()));
        }
        if window < hop {
            return Err(AudioError::InvalidFraming(format!(
                "window of {} samples is shorter than hop of {}",
                window, hop
            )));
        }
        if batch_size == Some(0) {
            return Err(AudioError::InvalidFraming("batch size must be positive".into()));
        }

        let total_frames = audio.len() / hop;

        let padding = (window - hop) / 2;
        let mut padded = Vec::with_capacity(audio.len() + 2 * padding);
        padded.resize(padding, 0.0);
        padded.extend_from_slice(audio);
        padded.resize(audio.len() + 2 * padding, 0.0);

        Ok(Self {
            padded,
            hop,
            window,
            batch_size: batch_size.unwrap_or(total_frames).max(1),
            total_frames,
            normalize: false,
            cursor: 0,
        })
    }

    /// Normalize every frame to zero mean and unit standard deviation
    pub fn with_normalization(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    /// Total frames across all batches
    pub fn total_frames(&self) -> usize {
        self.total_frames
    }

    /// Number of batches
    pub fn num_batches(&self) -> usize {
        self.total_frames.div_ceil(self.batch_size)
    }

    /// Frames per batch
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Rewind to the first batch
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    fn extract(&self, start_frame: usize, len: usize) -> Array3<f32> {
        let mut frames = Array3::<f32>::zeros((len, 1, self.window));

        for (i, mut frame) in frames.axis_iter_mut(Axis(0)).enumerate() {
            let start = (start_frame + i) * self.hop;
            // The last window may run one sample past odd padding
            let end = (start + self.window).min(self.padded.len());
            let mut row = frame.index_axis_mut(Axis(0), 0);
            for (dst, src) in row.iter_mut().zip(&self.padded[start..end]) {
                *dst = *src;
            }
            if self.normalize {
                normalize(row.view_mut());
            }
        }

        frames
    }
}

impl Iterator for Framer {
    type Item = FrameBatch;

    fn next(&mut self) -> Option<FrameBatch> {
        if self.cursor >= self.total_frames {
            return None;
        }

        let len = self.batch_size.min(self.total_frames - self.cursor);
        let batch = FrameBatch {
            frames: self.extract(self.cursor, len),
            start_frame: self.cursor,
        };
        self.cursor += len;

        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.total_frames - self.cursor).div_ceil(self.batch_size);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Framer {}

/// Mean-center and scale one frame
fn normalize(mut frame: ArrayViewMut1<f32>) {
    let n = frame.len() as f32;
    let mean = frame.sum() / n;
    frame.mapv_inplace(|s| s - mean);
    let std = (frame.iter().map(|s| s * s).sum::<f32>() / n).sqrt();
    let scale = std.max(NORMALIZE_EPSILON);
    frame.mapv_inplace(|s| s / scale);
}
