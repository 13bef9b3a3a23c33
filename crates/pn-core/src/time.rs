//! Stage timers
//!
//! Accumulates wall-clock time per named pipeline stage and turns the totals
//! into a throughput report.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::convert::samples_to_seconds;

/// Accumulated time per stage name
#[derive(Debug, Clone, Default)]
pub struct Timer {
    totals: BTreeMap<&'static str, Duration>,
}

impl Timer {
    /// Create empty timer
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f`, charging its duration to `stage`
    pub fn time<T>(&mut self, stage: &'static str, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let result = f();
        self.add(stage, start.elapsed());
        result
    }

    /// Charge a measured duration to `stage`
    pub fn add(&mut self, stage: &'static str, elapsed: Duration) {
        *self.totals.entry(stage).or_default() += elapsed;
    }

    /// Total for one stage
    pub fn get(&self, stage: &str) -> Option<Duration> {
        self.totals.get(stage).copied()
    }

    /// Sum over all stages
    pub fn total(&self) -> Duration {
        self.totals.values().sum()
    }

    /// Clear all totals
    pub fn reset(&mut self) {
        self.totals.clear();
    }

    /// Throughput per stage for `samples` of audio at `sample_rate`
    ///
    /// Includes a `total` entry summing every stage.
    pub fn report(&self, samples: usize, sample_rate: u32) -> TimingReport {
        let audio_seconds = samples_to_seconds(samples, sample_rate);
        let mut stages: BTreeMap<String, TimingEntry> = self
            .totals
            .iter()
            .map(|(stage, elapsed)| {
                (stage.to_string(), TimingEntry::new(*elapsed, samples, audio_seconds))
            })
            .collect();
        stages.insert(
            "total".to_string(),
            TimingEntry::new(self.total(), samples, audio_seconds),
        );
        TimingReport { stages }
    }
}

/// Throughput of one stage
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct TimingEntry {
    /// Processing time divided by audio duration
    pub real_time_factor: f64,
    /// Audio samples processed
    pub samples: usize,
    /// Audio samples per second of processing
    pub samples_per_second: f64,
    /// Processing time
    pub seconds: f64,
}

impl TimingEntry {
    fn new(elapsed: Duration, samples: usize, audio_seconds: f64) -> Self {
        let seconds = elapsed.as_secs_f64();
        Self {
            real_time_factor: if audio_seconds > 0.0 { seconds / audio_seconds } else { 0.0 },
            samples,
            samples_per_second: if seconds > 0.0 { samples as f64 / seconds } else { 0.0 },
            seconds,
        }
    }
}

/// Per-stage throughput report
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct TimingReport {
    pub stages: BTreeMap<String, TimingEntry>,
}

impl TimingReport {
    /// Pretty JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
