//! Logits to pitch and periodicity
//!
//! ```text
//! logits (frames, bins, steps)
//!   → range mask  (bins outside [fmin, fmax] = -inf)
//!   → decoder     (argmax | average | weighted | viterbi)
//!   → periodicity (entropy | max | sum)
//!   → bins / pitch / periodicity (steps, frames)
//! ```

use std::ops::Range;

use ndarray::{Array1, Array2, Array3, ArrayView1, s};
use pn_core::{Decoder, PeriodicityMethod, PitchAxis, PitchConfig, Quantize};

use crate::decode::{self, argmax, log_softmax, softmax};
use crate::error::{DecodeError, DecodeResult};
use crate::periodicity;
use crate::viterbi::{Transition, Trellis};

/// Decoded output, time-major `(time_steps, frames)`
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    /// Selected pitch bin
    pub bins: Array2<usize>,
    /// Pitch (Hz)
    pub pitch: Array2<f32>,
    /// Voicing confidence in [0, 1]
    pub periodicity: Array2<f32>,
}

impl Decoded {
    /// Number of frames
    pub fn frames(&self) -> usize {
        self.pitch.ncols()
    }
}

/// Turns model logits into pitch and periodicity
#[derive(Debug, Clone)]
pub struct Postprocessor {
    axis: PitchAxis,
    decoder: Decoder,
    periodicity: PeriodicityMethod,
    local_window: usize,
    /// Built once for viterbi decoders
    transition: Option<Transition>,
}

impl Postprocessor {
    /// Postprocessor for the decoder and periodicity method in `config`
    pub fn new(config: &PitchConfig) -> Self {
        let axis = config.axis();
        let transition = match config.decoder {
            Decoder::Viterbi(params) => {
                let transition = Transition::from_params(&params, config.hopsize, &axis);
                log::debug!(
                    "Viterbi transition radius {} bins ({} octaves/s)",
                    transition.radius(),
                    params.max_octaves_per_second
                );
                Some(transition)
            }
            _ => None,
        };

        Self {
            axis,
            decoder: config.decoder,
            periodicity: config.periodicity,
            local_window: config.local_window,
            transition,
        }
    }

    /// Pitch-bin axis
    pub fn axis(&self) -> &PitchAxis {
        &self.axis
    }

    /// Pitch decoder
    pub fn decoder(&self) -> Decoder {
        self.decoder
    }

    /// Periodicity method
    pub fn periodicity(&self) -> PeriodicityMethod {
        self.periodicity
    }

    /// Bins allowed by `[fmin, fmax]`: floor of fmin up to ceil of fmax
    pub fn allowed_bins(&self, fmin: f64, fmax: f64) -> DecodeResult<Range<usize>> {
        let min = self.axis.clamped_bin(fmin, Quantize::Floor);
        let max = self.axis.clamped_bin(fmax, Quantize::Ceil);
        if !(fmin <= fmax) || min >= max {
            return Err(DecodeError::EmptyRange { fmin, fmax });
        }
        Ok(min..max)
    }

    /// Decode logits shaped `(frames, bins, time_steps)`
    pub fn postprocess(&self, logits: &Array3<f32>, fmin: f64, fmax: f64) -> DecodeResult<Decoded> {
        let mut stream = self.stream(fmin, fmax)?;
        stream.push(logits)?;
        Ok(stream.finish())
    }

    /// Decoder for consecutive batches of one input
    pub fn stream(&self, fmin: f64, fmax: f64) -> DecodeResult<DecodeStream<'_>> {
        Ok(DecodeStream {
            post: self,
            allowed: self.allowed_bins(fmin, fmax)?,
            steps: None,
            frames: 0,
            trellises: Vec::new(),
            bins: Vec::new(),
            pitch: Vec::new(),
            periodicity: Vec::new(),
        })
    }

    fn frame_periodicity(&self, raw: ArrayView1<'_, f32>, probs: &[f64], allowed: &Range<usize>) -> f32 {
        match self.periodicity {
            PeriodicityMethod::Entropy => periodicity::entropy(probs, self.axis.bins()),
            PeriodicityMethod::Max => periodicity::max(probs),
            PeriodicityMethod::Sum => periodicity::sum(raw, allowed.clone()),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STREAM
// ═══════════════════════════════════════════════════════════════════════════════

/// Postprocessing fed batch by batch
///
/// Frame-local decoders settle each frame as it arrives. Viterbi keeps one
/// trellis per time step across batches and backtraces in [`finish`], so
/// the result does not depend on how the frames were batched.
///
/// [`finish`]: DecodeStream::finish
#[derive(Debug)]
pub struct DecodeStream<'p> {
    post: &'p Postprocessor,
    allowed: Range<usize>,
    /// Time steps per frame, fixed by the first batch
    steps: Option<usize>,
    frames: usize,
    /// One per time step, viterbi only
    trellises: Vec<Trellis<'p>>,
    /// Per time step; left empty for viterbi until `finish`
    bins: Vec<Vec<usize>>,
    pitch: Vec<Vec<f32>>,
    periodicity: Vec<Vec<f32>>,
}

impl<'p> DecodeStream<'p> {
    /// Frames decoded so far
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Decode the next batch of logits shaped `(frames, bins, time_steps)`
    pub fn push(&mut self, logits: &Array3<f32>) -> DecodeResult<()> {
        let post = self.post;
        let (frames, bins, steps) = logits.dim();
        if bins != post.axis.bins() {
            return Err(DecodeError::BinMismatch {
                expected: post.axis.bins(),
                got: bins,
            });
        }

        match self.steps {
            None => {
                self.steps = Some(steps);
                self.bins = vec![Vec::new(); steps];
                self.pitch = vec![Vec::new(); steps];
                self.periodicity = vec![Vec::new(); steps];
                if let Some(transition) = &post.transition {
                    self.trellises = (0..steps).map(|_| Trellis::new(transition)).collect();
                }
            }
            Some(expected) if expected != steps => {
                return Err(DecodeError::StepMismatch { expected, got: steps });
            }
            Some(_) => {}
        }

        let mut masked = Array1::from_elem(bins, f32::NEG_INFINITY);
        for step in 0..steps {
            for frame in 0..frames {
                let index = self.frames + frame;
                let raw = logits.slice(s![frame, .., step]);
                mask_into(raw, &self.allowed, &mut masked);

                let degenerate = DecodeError::DegenerateFrame { frame: index };

                let probs: Vec<f64> = match self.trellises.get_mut(step) {
                    Some(trellis) => {
                        let logs = log_softmax(masked.view()).ok_or(degenerate)?;
                        trellis.push(&logs)?;
                        logs.into_iter().map(f64::exp).collect()
                    }
                    None => {
                        let (peak, _) = argmax(masked.view()).ok_or(degenerate)?;
                        let Some(probs) = softmax(masked.view()) else {
                            return Err(DecodeError::DegenerateFrame { frame: index });
                        };
                        let pitch = match post.decoder {
                            Decoder::Average => {
                                decode::average_pitch(&probs, peak, post.local_window, &post.axis)
                            }
                            Decoder::Weighted => decode::weighted_pitch(&probs, peak, &post.axis),
                            Decoder::Argmax | Decoder::Viterbi(_) => {
                                decode::argmax_pitch(peak, &post.axis)
                            }
                        };
                        self.bins[step].push(peak);
                        self.pitch[step].push(pitch);
                        probs
                    }
                };

                self.periodicity[step].push(post.frame_periodicity(raw, &probs, &self.allowed));
            }
        }

        self.frames += frames;
        log::trace!("Decoded frames {}..{}", self.frames - frames, self.frames);
        Ok(())
    }

    /// Decoded output for every frame pushed, time-major `(time_steps, frames)`
    pub fn finish(self) -> Decoded {
        let Self {
            post,
            steps,
            frames,
            trellises,
            mut bins,
            mut pitch,
            mut periodicity,
            ..
        } = self;

        let steps = steps.unwrap_or(1);
        if bins.is_empty() {
            bins = vec![Vec::new(); steps];
            pitch = vec![Vec::new(); steps];
            periodicity = vec![Vec::new(); steps];
        }

        for (step, trellis) in trellises.into_iter().enumerate() {
            let path = trellis.finish();
            pitch[step] = path.iter().map(|&bin| decode::argmax_pitch(bin, &post.axis)).collect();
            bins[step] = path;
        }

        Decoded {
            bins: Array2::from_shape_fn((steps, frames), |(step, frame)| bins[step][frame]),
            pitch: Array2::from_shape_fn((steps, frames), |(step, frame)| pitch[step][frame]),
            periodicity: Array2::from_shape_fn((steps, frames), |(step, frame)| {
                periodicity[step][frame]
            }),
        }
    }
}

/// Copy `scores` into `out` with every bin outside `allowed` set to `-inf`
fn mask_into(scores: ArrayView1<'_, f32>, allowed: &Range<usize>, out: &mut Array1<f32>) {
    out.assign(&scores);
    out.slice_mut(s![..allowed.start]).fill(f32::NEG_INFINITY);
    out.slice_mut(s![allowed.end..]).fill(f32::NEG_INFINITY);
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pn_core::ViterbiParams;

    fn config(decoder: Decoder, periodicity: PeriodicityMethod) -> PitchConfig {
        PitchConfig {
            decoder,
            periodicity,
            ..PitchConfig::default()
        }
    }

    /// Frames peaked at the given bins
    fn logits(peaks: &[usize]) -> Array3<f32> {
        let mut logits = Array3::zeros((peaks.len(), 1440, 1));
        for (frame, &bin) in peaks.iter().enumerate() {
            logits[[frame, bin, 0]] = 20.0;
        }
        logits
    }

    const DECODERS: [Decoder; 4] = [
        Decoder::Argmax,
        Decoder::Average,
        Decoder::Weighted,
        Decoder::Viterbi(ViterbiParams {
            max_octaves_per_second: 35.92,
        }),
    ];

    #[test]
    fn test_allowed_bins_default_range() {
        let post = Postprocessor::new(&PitchConfig::default());
        assert_eq!(post.allowed_bins(31.0, 1984.0).unwrap(), 0..1440);
        assert_eq!(post.allowed_bins(1.0, 10_000.0).unwrap(), 0..1440);
    }

    #[test]
    fn test_allowed_bins_empty() {
        let post = Postprocessor::new(&PitchConfig::default());
        assert!(matches!(
            post.allowed_bins(5000.0, 6000.0),
            Err(DecodeError::EmptyRange { .. })
        ));
        assert!(post.allowed_bins(400.0, 200.0).is_err());
    }

    #[test]
    fn test_time_major_shape() {
        let post = Postprocessor::new(&PitchConfig::default());
        let decoded = post.postprocess(&logits(&[100, 200, 300]), 31.0, 1984.0).unwrap();
        assert_eq!(decoded.pitch.shape(), &[1, 3]);
        assert_eq!(decoded.bins.shape(), &[1, 3]);
        assert_eq!(decoded.periodicity.shape(), &[1, 3]);
        assert_eq!(decoded.frames(), 3);
    }

    #[test]
    fn test_every_decoder_deterministic() {
        let input = logits(&[400, 402, 405, 405, 404]);
        for decoder in DECODERS {
            let post = Postprocessor::new(&config(decoder, PeriodicityMethod::Entropy));
            let first = post.postprocess(&input, 31.0, 1984.0).unwrap();
            let second = post.postprocess(&input, 31.0, 1984.0).unwrap();
            assert_eq!(first, second, "{}", decoder);
            assert_eq!(first.bins.row(0).to_vec(), vec![400, 402, 405, 405, 404], "{}", decoder);
        }
    }

    #[test]
    fn test_masking_keeps_pitch_in_range() {
        // Peak sits below fmin; decoders must pick an allowed bin instead
        let input = logits(&[10, 10, 10]);
        let (fmin, fmax) = (100.0, 800.0);

        for decoder in DECODERS {
            let post = Postprocessor::new(&config(decoder, PeriodicityMethod::Entropy));
            let range = post.allowed_bins(fmin, fmax).unwrap();
            let decoded = post.postprocess(&input, fmin, fmax).unwrap();
            for &bin in decoded.bins.iter() {
                assert!(range.contains(&bin), "{} picked bin {}", decoder, bin);
            }
            let lo = post.axis().bin_to_frequency(range.start as f64) as f32;
            let hi = post.axis().bin_to_frequency(range.end as f64) as f32;
            for &pitch in decoded.pitch.iter() {
                assert!(pitch >= lo * 0.999 && pitch <= hi * 1.001, "{} gave {}", decoder, pitch);
            }
        }
    }

    #[test]
    fn test_argmax_pitch_is_bin_frequency() {
        let post = Postprocessor::new(&config(Decoder::Argmax, PeriodicityMethod::Max));
        let decoded = post.postprocess(&logits(&[480]), 31.0, 1984.0).unwrap();
        // 480 bins = 2 octaves above 31 Hz
        assert_relative_eq!(decoded.pitch[[0, 0]], 124.0, max_relative = 1e-5);
    }

    #[test]
    fn test_periodicity_bounds() {
        let mut input = logits(&[300, 600]);
        input.slice_mut(s![1, .., 0]).fill(-3.0);
        for method in [PeriodicityMethod::Entropy, PeriodicityMethod::Max, PeriodicityMethod::Sum] {
            let post = Postprocessor::new(&config(Decoder::Average, method));
            let decoded = post.postprocess(&input, 50.0, 1000.0).unwrap();
            for &value in decoded.periodicity.iter() {
                assert!((0.0..=1.0).contains(&value), "{} gave {}", method, value);
            }
        }
    }

    #[test]
    fn test_confident_frame_scores_high() {
        let mut input = logits(&[300, 0]);
        input.slice_mut(s![1, .., 0]).fill(0.0);
        for method in [PeriodicityMethod::Entropy, PeriodicityMethod::Max] {
            let post = Postprocessor::new(&config(Decoder::Argmax, method));
            let decoded = post.postprocess(&input, 31.0, 1984.0).unwrap();
            assert!(decoded.periodicity[[0, 0]] > 0.9, "{}", method);
            assert!(decoded.periodicity[[0, 1]] < 0.1, "{}", method);
        }
    }

    #[test]
    fn test_sum_uses_unmasked_mass() {
        // Flat scores: mass inside the range equals its share of the axis
        let input = Array3::zeros((1, 1440, 1));
        let post = Postprocessor::new(&config(Decoder::Argmax, PeriodicityMethod::Sum));
        let range = post.allowed_bins(62.0, 124.0).unwrap();
        let decoded = post.postprocess(&input, 62.0, 124.0).unwrap();
        assert_relative_eq!(
            decoded.periodicity[[0, 0]],
            range.len() as f32 / 1440.0,
            epsilon = 1e-5
        );
    }

    #[test]
    fn test_viterbi_smooths_octave_error() {
        let mut peaks = vec![400usize; 11];
        peaks[5] = 640;
        let input = logits(&peaks);

        let argmax = Postprocessor::new(&config(Decoder::Argmax, PeriodicityMethod::Entropy))
            .postprocess(&input, 31.0, 1984.0)
            .unwrap();
        assert_eq!(argmax.bins[[0, 5]], 640);

        let viterbi = Postprocessor::new(&config(Decoder::Viterbi(ViterbiParams::default()), PeriodicityMethod::Entropy))
            .postprocess(&input, 31.0, 1984.0)
            .unwrap();
        assert!(viterbi.bins.iter().all(|&bin| bin == 400));
    }

    #[test]
    fn test_multiple_time_steps() {
        let mut input = Array3::zeros((2, 1440, 3));
        for step in 0..3 {
            input[[0, 100 + step, step]] = 10.0;
            input[[1, 200 + step, step]] = 10.0;
        }
        let post = Postprocessor::new(&config(Decoder::Argmax, PeriodicityMethod::Entropy));
        let decoded = post.postprocess(&input, 31.0, 1984.0).unwrap();
        assert_eq!(decoded.bins.shape(), &[3, 2]);
        assert_eq!(decoded.bins[[2, 0]], 102);
        assert_eq!(decoded.bins[[1, 1]], 201);
    }

    #[test]
    fn test_wrong_bin_count() {
        let post = Postprocessor::new(&PitchConfig::default());
        let err = post.postprocess(&Array3::zeros((1, 360, 1)), 31.0, 1984.0).unwrap_err();
        assert!(matches!(err, DecodeError::BinMismatch { expected: 1440, got: 360 }));
    }

    #[test]
    fn test_no_frames() {
        let post = Postprocessor::new(&PitchConfig::default());
        let decoded = post.postprocess(&Array3::zeros((0, 1440, 1)), 31.0, 1984.0).unwrap();
        assert_eq!(decoded.pitch.shape(), &[1, 0]);
    }

    #[test]
    fn test_stream_batches_match_single_batch() {
        // Octave jump at frame 5 sits right at a batch boundary
        let mut peaks = vec![400usize; 11];
        peaks[5] = 640;
        peaks[8] = 404;
        let input = logits(&peaks);

        for decoder in DECODERS {
            let post = Postprocessor::new(&config(decoder, PeriodicityMethod::Entropy));
            let whole = post.postprocess(&input, 31.0, 1984.0).unwrap();

            for split in [1, 4, 5, 6, 10] {
                let mut stream = post.stream(31.0, 1984.0).unwrap();
                stream.push(&input.slice(s![..split, .., ..]).to_owned()).unwrap();
                stream.push(&input.slice(s![split.., .., ..]).to_owned()).unwrap();
                assert_eq!(stream.frames(), 11);
                assert_eq!(stream.finish(), whole, "{} split at {}", decoder, split);
            }
        }
    }

    #[test]
    fn test_stream_rejects_step_change() {
        let post = Postprocessor::new(&PitchConfig::default());
        let mut stream = post.stream(31.0, 1984.0).unwrap();
        stream.push(&Array3::zeros((2, 1440, 1))).unwrap();
        let err = stream.push(&Array3::zeros((2, 1440, 2))).unwrap_err();
        assert!(matches!(err, DecodeError::StepMismatch { expected: 1, got: 2 }));
    }

    #[test]
    fn test_degenerate_frame_index_spans_batches() {
        let mut bad = Array3::zeros((2, 1440, 1));
        bad.slice_mut(s![1, .., 0]).fill(f32::NAN);

        for decoder in DECODERS {
            let post = Postprocessor::new(&config(decoder, PeriodicityMethod::Entropy));
            let mut stream = post.stream(31.0, 1984.0).unwrap();
            stream.push(&Array3::zeros((3, 1440, 1))).unwrap();
            let err = stream.push(&bad).unwrap_err();
            assert!(matches!(err, DecodeError::DegenerateFrame { frame: 4 }), "{}", decoder);
        }
    }
}
