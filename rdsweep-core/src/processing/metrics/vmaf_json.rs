//! Parser for VMAF JSON reports.
//!
//! Both the libvmaf filter and the standalone scorer write the same shape:
//! `frames[i].metrics.vmaf` per frame plus `pooled_metrics.vmaf.{mean,
//! harmonic_mean}`. All of these are required.

use super::ScoreLogParser;
use crate::error::{CoreResult, metric_error};
use crate::processing::stats::{ChannelScores, QualityScores};

use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct VmafOutput {
    #[serde(default)]
    frames: Vec<VmafFrame>,
    pooled_metrics: PooledMetrics,
}

#[derive(Debug, Deserialize)]
struct VmafFrame {
    metrics: FrameMetrics,
}

#[derive(Debug, Deserialize)]
struct FrameMetrics {
    vmaf: f64,
}

#[derive(Debug, Deserialize)]
struct PooledMetrics {
    vmaf: PooledVmaf,
}

#[derive(Debug, Deserialize)]
struct PooledVmaf {
    mean: f64,
    harmonic_mean: f64,
}

/// Parser for VMAF JSON reports.
#[derive(Debug, Clone, Copy, Default)]
pub struct VmafJsonParser;

impl ScoreLogParser for VmafJsonParser {
    fn metric(&self) -> &str {
        "vmaf"
    }

    fn parse(&self, text: &str) -> CoreResult<QualityScores> {
        let output: VmafOutput = serde_json::from_str(text)
            .map_err(|e| metric_error("vmaf", format!("malformed JSON report: {e}")))?;
        let samples: Vec<f64> = output.frames.iter().map(|f| f.metrics.vmaf).collect();
        if samples.iter().any(|s| !s.is_finite()) {
            return Err(metric_error("vmaf", "non-finite frame score"));
        }

        let mut channel = ChannelScores::from_samples(&samples)
            .ok_or_else(|| metric_error("vmaf", "report contains no frames"))?;

        let pooled = output.pooled_metrics.vmaf;
        if !pooled.mean.is_finite() || !pooled.harmonic_mean.is_finite() {
            return Err(metric_error("vmaf", "non-finite pooled score"));
        }
        // the tool's own pooling replaces the mean computed from frames
        channel.mean = pooled.mean;

        let mut scores = QualityScores::default();
        scores
            .channels
            .insert(String::new(), channel.with_harmonic_mean(Some(pooled.harmonic_mean)));
        Ok(scores)
    }
}
