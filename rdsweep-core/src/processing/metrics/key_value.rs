//! Parser for ffmpeg `stats_file` logs.
//!
//! Each line holds whitespace-separated `key:value` tokens for one frame, e.g.
//! `n:1 mse_avg:2.59 ... psnr_avg:44.00 psnr_y:40.00 psnr_u:45.00 psnr_v:46.00`
//! or `n:1 Y:0.950000 U:0.960000 V:0.970000 All:0.955000 (18.238620)`.

use super::ScoreLogParser;
use crate::error::{CoreResult, metric_error};
use crate::processing::stats::{ChannelScores, QualityScores};

use log::warn;

use std::collections::HashMap;

/// Channel name used when only the combined average is reported.
pub const AVERAGE_CHANNEL: &str = "avg";

/// Parser for line-oriented `key:value` statistics.
#[derive(Debug, Clone)]
pub struct KeyValueLogParser {
    metric: &'static str,
    /// (log key, channel name), luma first
    channels: &'static [(&'static str, &'static str)],
    /// Key of the combined average used when no luma key is present
    average_key: &'static str,
}

impl KeyValueLogParser {
    /// Parser for the ffmpeg `psnr` filter.
    #[must_use]
    pub fn psnr() -> Self {
        Self {
            metric: "psnr",
            channels: &[("psnr_y", "y"), ("psnr_u", "u"), ("psnr_v", "v")],
            average_key: "psnr_avg",
        }
    }

    /// Parser for the ffmpeg `ssim` filter.
    #[must_use]
    pub fn ssim() -> Self {
        Self {
            metric: "ssim",
            channels: &[("Y", "y"), ("U", "u"), ("V", "v")],
            average_key: "All",
        }
    }

    fn parse_line<'a>(&self, line: &'a str, lineno: usize) -> CoreResult<HashMap<&'a str, f64>> {
        let mut fields = HashMap::new();
        for token in line.split_whitespace() {
            let Some((key, value)) = token.split_once(':') else {
                continue;
            };
            let tracked = key == self.average_key || self.channels.iter().any(|(k, _)| *k == key);
            if !tracked {
                continue;
            }
            let parsed = value.parse::<f64>().map_err(|_| {
                metric_error(self.metric, format!("line {lineno}: unparsable value '{token}'"))
            })?;
            // identical frames report `inf`; NaN or -inf means a broken log
            if parsed.is_nan() || parsed == f64::NEG_INFINITY {
                return Err(metric_error(
                    self.metric,
                    format!("line {lineno}: invalid value '{token}'"),
                ));
            }
            fields.insert(key, parsed);
        }
        Ok(fields)
    }
}

impl ScoreLogParser for KeyValueLogParser {
    fn metric(&self) -> &str {
        self.metric
    }

    fn parse(&self, text: &str) -> CoreResult<QualityScores> {
        let frames = text
            .lines()
            .enumerate()
            .filter(|(_, l)| !l.trim().is_empty())
            .map(|(i, l)| self.parse_line(l, i + 1))
            .collect::<CoreResult<Vec<_>>>()?;
        if frames.is_empty() {
            return Err(metric_error(self.metric, "log contains no frames"));
        }

        let luma_key = self.channels[0].0;
        let has_luma = frames.iter().all(|f| f.contains_key(luma_key));
        let selected: Vec<(&str, &str)> = if has_luma {
            self.channels.iter().copied().collect()
        } else if frames.iter().all(|f| f.contains_key(self.average_key)) {
            warn!(
                "{} log reports no luma channel; using the combined average '{}'",
                self.metric, self.average_key
            );
            vec![(self.average_key, AVERAGE_CHANNEL)]
        } else {
            return Err(metric_error(
                self.metric,
                format!("log carries neither '{luma_key}' nor '{}' on every frame", self.average_key),
            ));
        };

        let mut scores = QualityScores::default();
        for (key, channel) in selected {
            let samples: Vec<f64> = frames.iter().filter_map(|f| f.get(key).copied()).collect();
            if samples.len() != frames.len() {
                // chroma channels are optional as a group, luma is not
                if channel == "y" {
                    return Err(metric_error(self.metric, format!("'{key}' missing on some frames")));
                }
                continue;
            }
            if let Some(s) = ChannelScores::from_samples(&samples) {
                scores.channels.insert(channel.to_string(), s);
            }
        }
        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    const PSNR_LOG: &str = "\
n:1 mse_avg:2.59 mse_y:3.23 mse_u:1.61 mse_v:1.03 psnr_avg:44.00 psnr_y:40.00 psnr_u:45.00 psnr_v:46.00
n:2 mse_avg:2.59 mse_y:3.23 mse_u:1.61 mse_v:1.03 psnr_avg:45.00 psnr_y:42.00 psnr_u:46.00 psnr_v:47.00
";

    #[test]
    fn test_psnr_channels() {
        let scores = KeyValueLogParser::psnr().parse(PSNR_LOG).unwrap();
        let y = scores.channel("y").unwrap();
        assert!((y.mean - 41.0).abs() < 1e-9);
        assert_eq!(y.percentile(0), Some(40.0));
        assert_eq!(y.percentile(100), Some(42.0));
        assert!(scores.channel("u").is_some());
        assert!(scores.channel("v").is_some());
        assert!(scores.channel(AVERAGE_CHANNEL).is_none());
    }

    #[test]
    fn test_ssim_parenthesized_token_is_ignored() {
        let log = "n:1 Y:0.950000 U:0.960000 V:0.970000 All:0.955000 (18.238620)\n";
        let scores = KeyValueLogParser::ssim().parse(log).unwrap();
        assert!((scores.channel("y").unwrap().mean - 0.95).abs() < 1e-9);
    }

    #[test]
    fn test_average_fallback_when_luma_missing() {
        let log = "n:1 All:0.955000 (18.2)\nn:2 All:0.965000 (19.0)\n";
        let scores = KeyValueLogParser::ssim().parse(log).unwrap();
        assert!(scores.channel("y").is_none());
        let avg = scores.channel(AVERAGE_CHANNEL).unwrap();
        assert!((avg.mean - 0.96).abs() < 1e-9);
    }

    #[test]
    fn test_malformed_logs_are_errors_not_zero() {
        let parser = KeyValueLogParser::psnr();
        assert!(matches!(parser.parse(""), Err(CoreError::Metric { .. })));
        assert!(matches!(parser.parse("n:1 mse_avg:2.0\n"), Err(CoreError::Metric { .. })));
        assert!(matches!(parser.parse("n:1 psnr_y:abc psnr_avg:4\n"), Err(CoreError::Metric { .. })));
        assert!(matches!(parser.parse("n:1 psnr_y:nan psnr_avg:4\n"), Err(CoreError::Metric { .. })));
    }

    #[test]
    fn test_identical_frames_carry_infinite_psnr() {
        let log = "\
n:1 mse_avg:0.00 mse_y:0.00 psnr_avg:inf psnr_y:inf psnr_u:inf psnr_v:inf
n:2 mse_avg:0.01 mse_y:0.01 psnr_avg:68.10 psnr_y:inf psnr_u:66.20 psnr_v:inf
";
        let scores = KeyValueLogParser::psnr().parse(log).unwrap();
        let y = scores.channel("y").unwrap();
        assert_eq!(y.mean, f64::INFINITY);
        assert_eq!(y.percentile(0), Some(f64::INFINITY));
        assert_eq!(y.percentile(50), None);
        let u = scores.channel("u").unwrap();
        assert_eq!(u.mean, f64::INFINITY);
        assert_eq!(u.percentile(0), Some(66.2));
        assert_eq!(u.percentile(100), Some(f64::INFINITY));
        assert!(u.percentiles.iter().all(|(_, v)| !v.is_nan()));
    }
}
