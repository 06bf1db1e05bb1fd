// ============================================================================
// rdsweep-core/src/processing/metrics/mod.rs
// ============================================================================
//
// METRIC LOG PARSING: Per-Format Parsers for Quality Tool Output
//
// Quality tools write their per-frame scores in one of two formats:
// line-oriented `key:value` statistics files (ffmpeg psnr/ssim filters) and
// JSON reports (libvmaf filter and the standalone vmaf scorer). Each format
// has one `ScoreLogParser` implementation; the quality stage only sees the
// trait.
//
// KEY COMPONENTS:
// - ScoreLogParser: text → QualityScores
// - KeyValueLogParser: psnr/ssim statistics files
// - VmafJsonParser: VMAF JSON reports

use crate::error::CoreResult;
use crate::processing::stats::QualityScores;

pub mod key_value;
pub mod vmaf_json;

pub use key_value::KeyValueLogParser;
pub use vmaf_json::VmafJsonParser;

/// Parses one metric log into per-channel scores.
///
/// Implementations never substitute a default for a missing or unparsable
/// value; such logs are reported as `CoreError::Metric`.
pub trait ScoreLogParser: Send + Sync {
    /// Metric name used in error messages and column prefixes.
    fn metric(&self) -> &str;

    fn parse(&self, text: &str) -> CoreResult<QualityScores>;
}
