//! FFmpeg command builder utilities
//!
//! This module provides a builder pattern for constructing ffmpeg command
//! lines with the options every stage of the pipeline shares (banner
//! suppression, overwrite, quiet statistics).

use super::CommandLine;
use std::path::Path;

/// Builder for creating `FFmpeg` commands with common configurations
pub struct FfmpegCommandBuilder {
    cmd: CommandLine,
    hide_banner: bool,
    overwrite: bool,
    quiet: bool,
}

impl FfmpegCommandBuilder {
    /// Creates a new `FFmpeg` command builder with sensible defaults
    #[must_use]
    pub fn new(ffmpeg_bin: &str) -> Self {
        Self {
            cmd: CommandLine::new(ffmpeg_bin),
            hide_banner: true,
            overwrite: true,
            quiet: false,
        }
    }

    /// Sets whether to hide the `FFmpeg` banner
    #[must_use]
    pub fn with_hide_banner(mut self, hide: bool) -> Self {
        self.hide_banner = hide;
        self
    }

    /// Sets whether existing outputs are overwritten (`-y`)
    #[must_use]
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Suppresses progress statistics and log output
    #[must_use]
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Builds the `FFmpeg` command with all configured options
    #[must_use]
    pub fn build(mut self) -> CommandLine {
        if self.hide_banner {
            self.cmd.arg("-hide_banner");
        }
        if self.overwrite {
            self.cmd.arg("-y");
        }
        if self.quiet {
            self.cmd.args(["-nostats", "-loglevel", "0"]);
        }
        self.cmd
    }
}

/// Builds a two-input comparison command (`distorted` first, `reference`
/// second) that discards its video output.
#[must_use]
pub fn comparison_command(
    ffmpeg_bin: &str,
    distorted: &Path,
    reference: &Path,
    filter_flag: &str,
    filter: &str,
) -> CommandLine {
    let mut cmd = FfmpegCommandBuilder::new(ffmpeg_bin)
        .with_overwrite(false)
        .build();
    cmd.arg("-i").path(distorted);
    cmd.arg("-i").path(reference);
    cmd.args([filter_flag, filter]);
    cmd.args(["-f", "null", "-"]);
    cmd
}
