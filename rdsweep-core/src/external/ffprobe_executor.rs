//! FFprobe integration for media analysis
//!
//! This module provides the media probe used before and after every
//! transcode: resolution, pixel format, frame rate and duration queries.
//! Each query issues exactly one ffprobe invocation through the injected
//! [`ProcessRunner`] and parses a single CSV field from its output.

use super::{CommandLine, ProcessRunner, RunOptions};
use crate::error::{CoreResult, probe_error};
use crate::media::{FrameRate, Resolution};

use std::path::Path;

/// Queries media properties of a file via ffprobe.
pub struct MediaProbe<'a, R: ProcessRunner + ?Sized> {
    runner: &'a R,
    ffprobe_bin: &'a str,
    options: RunOptions,
}

impl<'a, R: ProcessRunner + ?Sized> MediaProbe<'a, R> {
    pub fn new(runner: &'a R, ffprobe_bin: &'a str, options: RunOptions) -> Self {
        Self {
            runner,
            ffprobe_bin,
            options,
        }
    }

    /// Gets the first video stream's dimensions.
    pub fn resolution(&self, path: &Path) -> CoreResult<Resolution> {
        let raw = self.query(path, "stream=width,height")?;
        raw.trim_end_matches('x')
            .parse::<Resolution>()
            .map_err(|_| probe_error(path, format!("unparsable resolution '{raw}'")))
    }

    /// Gets the first video stream's pixel format (e.g. `yuv420p`).
    pub fn pix_fmt(&self, path: &Path) -> CoreResult<String> {
        let raw = self.query(path, "stream=pix_fmt")?;
        if raw.is_empty() || raw.contains(char::is_whitespace) {
            return Err(probe_error(path, format!("unparsable pixel format '{raw}'")));
        }
        Ok(raw)
    }

    /// Gets the first video stream's frame rate (`r_frame_rate`).
    pub fn framerate(&self, path: &Path) -> CoreResult<FrameRate> {
        let raw = self.query(path, "stream=r_frame_rate")?;
        raw.parse::<FrameRate>().map_err(|e| probe_error(path, e))
    }

    /// Gets the container duration in seconds.
    ///
    /// Uses `format=duration` because the stream-level field is absent for
    /// some containers (webm).
    pub fn duration(&self, path: &Path) -> CoreResult<f64> {
        let raw = self.query(path, "format=duration")?;
        let secs = raw
            .parse::<f64>()
            .map_err(|_| probe_error(path, format!("unparsable duration '{raw}'")))?;
        if !secs.is_finite() || secs <= 0.0 {
            return Err(probe_error(path, format!("non-positive duration '{raw}'")));
        }
        Ok(secs)
    }

    fn query(&self, path: &Path, entries: &str) -> CoreResult<String> {
        let mut cmd = CommandLine::new(self.ffprobe_bin);
        cmd.args(["-v", "0", "-of", "csv=s=x:p=0", "-select_streams", "v:0"]);
        cmd.args(["-show_entries", entries]);
        cmd.path(path);

        let result = self.runner.execute(&cmd, &self.options)?;
        if !result.success() {
            return Err(probe_error(
                path,
                format!(
                    "ffprobe exited with code {}: {}",
                    result.exit_code,
                    result.stderr.trim()
                ),
            ));
        }

        let value = result
            .stdout
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or_default()
            .to_string();
        log::debug!("ffprobe {} {} -> '{}'", entries, path.display(), value);
        if value.is_empty() {
            return Err(probe_error(path, format!("no '{entries}' reported")));
        }
        Ok(value)
    }
}
