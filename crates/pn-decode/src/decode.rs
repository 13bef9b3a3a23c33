//! Frame-local pitch decoders and distribution helpers
//!
//! Scores arrive as one row per frame over the pitch-bin axis, with bins
//! outside the allowed range already set to `-inf`. Probabilities are
//! computed in f64.

use std::ops::Range;

use ndarray::ArrayView1;
use pn_core::PitchAxis;

/// Index and value of the highest finite score, first one on ties
pub fn argmax(row: ArrayView1<'_, f32>) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (bin, &score) in row.iter().enumerate() {
        if score.is_nan() || score == f32::NEG_INFINITY {
            continue;
        }
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((bin, score)),
        }
    }
    best
}

/// Softmax over a row; `None` when no score is finite
pub fn softmax(row: ArrayView1<'_, f32>) -> Option<Vec<f64>> {
    let (_, max) = argmax(row)?;
    let max = max as f64;

    let mut probs: Vec<f64> = row
        .iter()
        .map(|&score| if score.is_nan() { 0.0 } else { (score as f64 - max).exp() })
        .collect();
    let total: f64 = probs.iter().sum();
    for p in &mut probs {
        *p /= total;
    }
    Some(probs)
}

/// Log-softmax over a row; masked bins stay at `-inf`
pub fn log_softmax(row: ArrayView1<'_, f32>) -> Option<Vec<f64>> {
    let (_, max) = argmax(row)?;
    let max = max as f64;

    let total: f64 = row
        .iter()
        .filter(|score| !score.is_nan())
        .map(|&score| (score as f64 - max).exp())
        .sum();
    let log_total = total.ln();

    Some(
        row.iter()
            .map(|&score| {
                if score.is_nan() {
                    f64::NEG_INFINITY
                } else {
                    score as f64 - max - log_total
                }
            })
            .collect(),
    )
}

/// Probability-weighted mean position (cents) of the bins in `bins`
fn centroid_cents(probs: &[f64], bins: Range<usize>, axis: &PitchAxis) -> Option<f64> {
    let mut mass = 0.0;
    let mut weighted = 0.0;
    for bin in bins {
        let p = probs[bin];
        mass += p;
        weighted += p * axis.bin_to_cents(bin as f64);
    }
    (mass > 0.0).then(|| weighted / mass)
}

/// Bin window of `window` bins centered on `peak`, cut at the axis ends
pub fn local_window(peak: usize, window: usize, bins: usize) -> Range<usize> {
    let half = window / 2;
    peak.saturating_sub(half)..(peak + half + 1).min(bins)
}

/// Pitch of the highest-scoring bin
pub fn argmax_pitch(bin: usize, axis: &PitchAxis) -> f32 {
    axis.bin_to_frequency(bin as f64) as f32
}

/// Softmax centroid of the bins around the peak
///
/// Gives sub-bin resolution while ignoring distant secondary peaks.
pub fn average_pitch(probs: &[f64], peak: usize, window: usize, axis: &PitchAxis) -> f32 {
    let bins = local_window(peak, window, probs.len());
    match centroid_cents(probs, bins, axis) {
        Some(cents) => axis.cents_to_frequency(cents) as f32,
        None => argmax_pitch(peak, axis),
    }
}

/// Softmax centroid over every bin
pub fn weighted_pitch(probs: &[f64], peak: usize, axis: &PitchAxis) -> f32 {
    match centroid_cents(probs, 0..probs.len(), axis) {
        Some(cents) => axis.cents_to_frequency(cents) as f32,
        None => argmax_pitch(peak, axis),
    }
}
