// ============================================================================
// rdsweep-core/src/processing/reference.rs
// ============================================================================
//
// REFERENCE NORMALIZATION: Raw Reference Artifact per Input
//
// Every measurement compares against one normalized reference: the input
// transcoded once to a raw y4m file at the reference resolution and pixel
// format. The output is probed after the transcode and any mismatch aborts
// with a normalization error instead of producing skewed scores later.

use crate::config::CoreConfig;
use crate::error::{CoreResult, normalization_error};
use crate::external::{FfmpegCommandBuilder, MediaProbe, ProcessRunner};
use crate::media::{FrameRate, Resolution};
use crate::naming;
use crate::utils;

use log::{debug, info};

use std::path::{Path, PathBuf};

/// Normalized raw copy of one input.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceArtifact {
    /// File name of the input; base of every artifact name
    pub base: String,
    pub path: PathBuf,
    pub resolution: Resolution,
    pub pix_fmt: String,
    pub framerate: FrameRate,
    pub duration_secs: f64,
}

/// Produces and verifies reference artifacts.
pub struct ReferenceNormalizer<'a, R: ProcessRunner + ?Sized> {
    runner: &'a R,
    config: &'a CoreConfig,
}

impl<'a, R: ProcessRunner + ?Sized> ReferenceNormalizer<'a, R> {
    pub fn new(runner: &'a R, config: &'a CoreConfig) -> Self {
        Self { runner, config }
    }

    fn probe(&self) -> MediaProbe<'a, R> {
        MediaProbe::new(self.runner, &self.config.ffprobe_bin, self.config.run_options())
    }

    /// Transcodes `input` to `<tmp_dir>/<base>.ref_<WxH>.y4m`.
    ///
    /// `target` of `None` keeps the input resolution.
    pub fn normalize(
        &self,
        input: &Path,
        target: Option<Resolution>,
        pix_fmt: &str,
    ) -> CoreResult<ReferenceArtifact> {
        let probe = self.probe();
        let input_resolution = probe.resolution(input)?;
        let framerate = probe.framerate(input)?;
        let resolution = target.unwrap_or(input_resolution);

        let base = utils::base_name(input)?;
        let path = self.config.tmp_dir.join(naming::reference_name(&base, resolution));
        info!(
            "Normalizing {} ({} @ {}) -> {} {}",
            base, input_resolution, framerate, resolution, pix_fmt
        );

        let mut cmd = FfmpegCommandBuilder::new(&self.config.ffmpeg_bin).build();
        cmd.arg("-i").path(input);
        cmd.args(["-s", &resolution.to_string(), "-pix_fmt", pix_fmt]);
        cmd.path(&path);

        let result = self.runner.execute(&cmd, &self.config.run_options())?;
        if !result.success() {
            return Err(normalization_error(
                input,
                format!(
                    "'{}' exited with code {}: {}",
                    cmd,
                    result.exit_code,
                    result.stderr.trim()
                ),
            ));
        }

        verify_format(&probe, &path, resolution, pix_fmt)?;
        let duration_secs = probe.duration(&path)?;
        debug!("Reference ready: {} ({:.3}s)", path.display(), duration_secs);

        Ok(ReferenceArtifact {
            base,
            path,
            resolution,
            pix_fmt: pix_fmt.to_string(),
            framerate,
            duration_secs,
        })
    }
}

/// Fails unless `path` has exactly `resolution` and `pix_fmt`.
pub(crate) fn verify_format<R: ProcessRunner + ?Sized>(
    probe: &MediaProbe<'_, R>,
    path: &Path,
    resolution: Resolution,
    pix_fmt: &str,
) -> CoreResult<()> {
    let actual_resolution = probe.resolution(path)?;
    if actual_resolution != resolution {
        return Err(normalization_error(
            path,
            format!("must have resolution {resolution} (is {actual_resolution})"),
        ));
    }
    let actual_pix_fmt = probe.pix_fmt(path)?;
    if actual_pix_fmt != pix_fmt {
        return Err(normalization_error(
            path,
            format!("must have pix_fmt {pix_fmt} (is {actual_pix_fmt})"),
        ));
    }
    Ok(())
}
