//! Per-frame score aggregation.
//!
//! Percentiles use linear interpolation between the nearest order
//! statistics (rank = p/100 * (n - 1)), so p0 is the minimum and p100 the
//! maximum of the samples.

use std::collections::BTreeMap;

/// Percentiles reported for every channel.
pub const PERCENTILES: [u32; 8] = [0, 5, 10, 25, 75, 90, 95, 100];

/// Computes one percentile of already sorted samples.
///
/// Returns `None` for an empty slice. Infinite samples (PSNR of identical
/// frames) propagate as infinity.
#[must_use]
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    match sorted.len() {
        0 => None,
        1 => Some(sorted[0]),
        n => {
            let rank = (p / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = (lower + 1).min(n - 1);
            let fraction = rank - lower as f64;
            let (lo, hi) = (sorted[lower], sorted[upper]);
            // keeps infinite samples from turning into NaN
            if fraction == 0.0 || lo == hi {
                return Some(lo);
            }
            Some(lo + fraction * (hi - lo))
        }
    }
}

/// Mean and fixed percentile set of one channel's per-frame scores.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelScores {
    pub mean: f64,
    /// (percentile, value) in `PERCENTILES` order
    pub percentiles: Vec<(u32, f64)>,
    /// Only reported by VMAF
    pub harmonic_mean: Option<f64>,
    pub frames: usize,
}

impl ChannelScores {
    /// Aggregates `samples`; `None` when there are none.
    #[must_use]
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let mut sorted = samples.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let mean = sorted.iter().sum::<f64>() / sorted.len() as f64;
        let percentiles = PERCENTILES
            .iter()
            .filter_map(|p| percentile(&sorted, f64::from(*p)).map(|v| (*p, v)))
            .collect();
        Some(Self {
            mean,
            percentiles,
            harmonic_mean: None,
            frames: sorted.len(),
        })
    }

    #[must_use]
    pub fn with_harmonic_mean(mut self, harmonic_mean: Option<f64>) -> Self {
        self.harmonic_mean = harmonic_mean;
        self
    }

    #[must_use]
    pub fn percentile(&self, p: u32) -> Option<f64> {
        self.percentiles.iter().find(|(q, _)| *q == p).map(|(_, v)| *v)
    }
}

/// Scores of one metric, keyed by channel (`y`, `u`, `v`, `avg`, or empty
/// for single-channel metrics).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QualityScores {
    pub channels: BTreeMap<String, ChannelScores>,
}

impl QualityScores {
    #[must_use]
    pub fn channel(&self, name: &str) -> Option<&ChannelScores> {
        self.channels.get(name)
    }

    /// Flattens into `(column, value)` pairs, e.g. `psnr_y_mean`,
    /// `psnr_y_p5`, `vmaf_mean`, `vmaf_harmonic_mean`.
    #[must_use]
    pub fn columns(&self, metric: &str) -> Vec<(String, f64)> {
        let mut columns = Vec::new();
        for (channel, scores) in ordered(&self.channels) {
            let prefix = if channel.is_empty() {
                metric.to_string()
            } else {
                format!("{metric}_{channel}")
            };
            columns.push((format!("{prefix}_mean"), scores.mean));
            if let Some(h) = scores.harmonic_mean {
                columns.push((format!("{prefix}_harmonic_mean"), h));
            }
            for (p, v) in &scores.percentiles {
                columns.push((format!("{prefix}_p{p}"), *v));
            }
        }
        columns
    }
}

/// Channels in presentation order: y, u, v, then the rest alphabetically.
fn ordered(channels: &BTreeMap<String, ChannelScores>) -> Vec<(&String, &ChannelScores)> {
    let rank = |c: &str| match c {
        "" => 0,
        "y" => 1,
        "u" => 2,
        "v" => 3,
        _ => 4,
    };
    let mut entries: Vec<_> = channels.iter().collect();
    entries.sort_by_key(|(c, _)| rank(c));
    entries
}
