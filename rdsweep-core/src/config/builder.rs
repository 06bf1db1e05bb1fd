// ============================================================================
// rdsweep-core/src/config/builder.rs
// ============================================================================
//
// CONFIGURATION BUILDER: Builder Pattern for CoreConfig
//
// Fluent construction of `CoreConfig`. Every setter starts from the
// defaults in `CoreConfig::default()`; validation is left to
// `CoreConfig::validate()`, which the orchestrator calls before any external
// process runs.

// ---- Standard library imports ----
use std::path::PathBuf;
use std::time::Duration;

// ---- Internal crate imports ----
use super::{CleanupLevel, CoreConfig, FailurePolicy, VmafBackend};
use crate::media::Resolution;

/// Builder for creating CoreConfig instances.
///
/// # Examples
///
/// ```rust
/// use rdsweep_core::config::{CoreConfigBuilder, FailurePolicy};
///
/// let config = CoreConfigBuilder::new()
///     .label("x264-vs-x265")
///     .failure_policy(FailurePolicy::Skip)
///     .jobs(4)
///     .build();
/// assert_eq!(config.jobs, 4);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CoreConfigBuilder {
    config: CoreConfig,
}

impl CoreConfigBuilder {
    /// Creates a new CoreConfigBuilder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the directory receiving all artifacts.
    pub fn tmp_dir(mut self, tmp_dir: PathBuf) -> Self {
        self.config.tmp_dir = tmp_dir;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.config.label = label.into();
        self
    }

    /// Sets the reference resolution (`None` keeps the input's).
    pub fn reference_resolution(mut self, resolution: Option<Resolution>) -> Self {
        self.config.reference_resolution = resolution;
        self
    }

    pub fn reference_pix_fmt(mut self, pix_fmt: impl Into<String>) -> Self {
        self.config.reference_pix_fmt = pix_fmt.into();
        self
    }

    /// Sets the GoP length (`None` omits the keyframe interval flag).
    pub fn gop_length(mut self, gop_length: Option<u32>) -> Self {
        self.config.gop_length = gop_length;
        self
    }

    pub fn cleanup(mut self, cleanup: CleanupLevel) -> Self {
        self.config.cleanup = cleanup;
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    pub fn jobs(mut self, jobs: usize) -> Self {
        self.config.jobs = jobs;
        self
    }

    pub fn command_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.command_timeout = timeout;
        self
    }

    pub fn capture_perf(mut self, capture_perf: bool) -> Self {
        self.config.capture_perf = capture_perf;
        self
    }

    pub fn vmaf_backend(mut self, backend: VmafBackend) -> Self {
        self.config.vmaf_backend = backend;
        self
    }

    pub fn vmaf_model(mut self, model: Option<String>) -> Self {
        self.config.vmaf_model = model;
        self
    }

    pub fn ffmpeg_bin(mut self, bin: impl Into<String>) -> Self {
        self.config.ffmpeg_bin = bin.into();
        self
    }

    pub fn ffprobe_bin(mut self, bin: impl Into<String>) -> Self {
        self.config.ffprobe_bin = bin.into();
        self
    }

    pub fn vmaf_bin(mut self, bin: impl Into<String>) -> Self {
        self.config.vmaf_bin = bin.into();
        self
    }

    pub fn perf_bin(mut self, bin: impl Into<String>) -> Self {
        self.config.perf_bin = bin.into();
        self
    }

    /// Builds a CoreConfig instance from the builder.
    pub fn build(self) -> CoreConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides_defaults() {
        let config = CoreConfigBuilder::new()
            .tmp_dir(PathBuf::from("/scratch"))
            .reference_resolution(Some(Resolution::new(1280, 720)))
            .gop_length(None)
            .vmaf_backend(VmafBackend::Standalone)
            .ffmpeg_bin("/opt/ffmpeg/bin/ffmpeg")
            .build();

        assert_eq!(config.tmp_dir, PathBuf::from("/scratch"));
        assert_eq!(config.reference_resolution, Some(Resolution::new(1280, 720)));
        assert_eq!(config.gop_length, None);
        assert_eq!(config.vmaf_backend, VmafBackend::Standalone);
        assert_eq!(config.ffmpeg_bin, "/opt/ffmpeg/bin/ffmpeg");
        assert_eq!(config.ffprobe_bin, "ffprobe");
    }
}
