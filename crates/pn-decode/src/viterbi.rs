//! Viterbi decoding over the pitch-bin trellis
//!
//! Transition weights fall off linearly with bin distance and vanish past
//! the distance a pitch can travel in one hop. Every rate in the family
//! shares the same banded dynamic program.

use ndarray::Array2;
use pn_core::{PitchAxis, ViterbiParams};

use crate::error::{DecodeError, DecodeResult};

/// Banded transition matrix, stored as per-distance weights
#[derive(Debug, Clone)]
pub struct Transition {
    /// Largest bin distance with non-zero weight
    radius: usize,
    /// `ln(width - distance)` for distance `0..=radius`
    log_weights: Vec<f64>,
    /// `ln` of each source bin's row sum
    log_norms: Vec<f64>,
}

impl Transition {
    /// Transition for `bins` states with weight `max(width - distance, 0)`
    pub fn new(bins: usize, width: f64) -> Self {
        let width = width.max(1.0);
        let radius = ((width.ceil() as usize).saturating_sub(1)).min(bins.saturating_sub(1));

        let weights: Vec<f64> = (0..=radius).map(|d| width - d as f64).collect();
        let log_weights = weights.iter().map(|w| w.ln()).collect();

        let log_norms = (0..bins)
            .map(|from| {
                let lo = from.saturating_sub(radius);
                let hi = (from + radius).min(bins - 1);
                (lo..=hi).map(|to| weights[from.abs_diff(to)]).sum::<f64>().ln()
            })
            .collect();

        Self {
            radius,
            log_weights,
            log_norms,
        }
    }

    /// Transition for the given rate limit at a hop of `hop_seconds`
    pub fn from_params(params: &ViterbiParams, hop_seconds: f64, axis: &PitchAxis) -> Self {
        Self::new(axis.bins(), transition_width(params, hop_seconds, axis))
    }

    /// Largest bin jump with non-zero probability
    pub fn radius(&self) -> usize {
        self.radius
    }

    /// Number of states
    pub fn bins(&self) -> usize {
        self.log_norms.len()
    }

    /// Log probability of moving from `from` to `to`
    pub fn log_prob(&self, from: usize, to: usize) -> f64 {
        let distance = from.abs_diff(to);
        if distance > self.radius {
            return f64::NEG_INFINITY;
        }
        self.log_weights[distance] - self.log_norms[from]
    }
}

/// Triangle width in bins: `octaves/s * hop * bins/octave + 1`
pub fn transition_width(params: &ViterbiParams, hop_seconds: f64, axis: &PitchAxis) -> f64 {
    params.max_octaves_per_second * hop_seconds * axis.bins_per_octave() + 1.0
}

/// Most likely bin sequence for `log_emissions` shaped `(frames, bins)`
///
/// The initial distribution is uniform. States with `-inf` emission are
/// never entered. Ties resolve to the lowest bin.
pub fn decode(log_emissions: &Array2<f64>, transition: &Transition) -> DecodeResult<Vec<usize>> {
    let bins = log_emissions.ncols();
    if bins != transition.bins() {
        return Err(DecodeError::BinMismatch {
            expected: transition.bins(),
            got: bins,
        });
    }

    let mut trellis = Trellis::new(transition);
    for row in log_emissions.outer_iter() {
        match row.as_slice() {
            Some(row) => trellis.push(row)?,
            None => trellis.push(&row.to_vec())?,
        }
    }
    Ok(trellis.finish())
}

/// Viterbi forward pass fed one frame at a time
///
/// Scores and backpointers carry over between pushes, so a sequence pushed
/// in pieces decodes to the same path as the whole sequence at once.
#[derive(Debug, Clone)]
pub struct Trellis<'t> {
    transition: &'t Transition,
    /// Best log score ending in each state at the last frame
    scores: Vec<f64>,
    next: Vec<f64>,
    /// `frames * bins` predecessors; row 0 is unused
    backpointers: Vec<u32>,
    frames: usize,
}

impl<'t> Trellis<'t> {
    /// Empty trellis over the states of `transition`
    pub fn new(transition: &'t Transition) -> Self {
        let bins = transition.bins();
        Self {
            transition,
            scores: vec![f64::NEG_INFINITY; bins],
            next: vec![f64::NEG_INFINITY; bins],
            backpointers: Vec::new(),
            frames: 0,
        }
    }

    /// Frames pushed so far
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Advance by one frame of log emissions
    pub fn push(&mut self, log_emissions: &[f64]) -> DecodeResult<()> {
        let bins = self.transition.bins();
        if log_emissions.len() != bins {
            return Err(DecodeError::BinMismatch {
                expected: bins,
                got: log_emissions.len(),
            });
        }

        let frame = self.frames;
        let start = self.backpointers.len();
        self.backpointers.resize(start + bins, 0);

        if frame == 0 {
            let initial = -(bins as f64).ln();
            for (score, &emission) in self.scores.iter_mut().zip(log_emissions) {
                *score = initial + emission;
            }
        } else {
            let radius = self.transition.radius();
            let pointers = &mut self.backpointers[start..];

            for (to, &emission) in log_emissions.iter().enumerate() {
                self.next[to] = f64::NEG_INFINITY;
                if emission == f64::NEG_INFINITY {
                    continue;
                }

                let lo = to.saturating_sub(radius);
                let hi = (to + radius).min(bins - 1);
                let mut best = f64::NEG_INFINITY;
                let mut best_from = lo;
                for from in lo..=hi {
                    if self.scores[from] == f64::NEG_INFINITY {
                        continue;
                    }
                    let score = self.scores[from] + self.transition.log_prob(from, to);
                    if score > best {
                        best = score;
                        best_from = from;
                    }
                }

                if best > f64::NEG_INFINITY {
                    self.next[to] = best + emission;
                    pointers[to] = best_from as u32;
                }
            }

            std::mem::swap(&mut self.scores, &mut self.next);
        }

        if self.scores.iter().all(|&s| s == f64::NEG_INFINITY) {
            return Err(DecodeError::DegenerateFrame { frame });
        }
        self.frames += 1;
        Ok(())
    }

    /// Backtrace the best path through every pushed frame
    pub fn finish(self) -> Vec<usize> {
        let bins = self.transition.bins();
        if self.frames == 0 {
            return Vec::new();
        }

        let mut state = first_max(&self.scores);
        let mut path = vec![0usize; self.frames];
        path[self.frames - 1] = state;
        for frame in (1..self.frames).rev() {
            state = self.backpointers[frame * bins + state] as usize;
            path[frame - 1] = state;
        }
        path
    }
}

fn first_max(scores: &[f64]) -> usize {
    let mut best = 0;
    for (state, &score) in scores.iter().enumerate() {
        if score > scores[best] {
            best = state;
        }
    }
    best
}
