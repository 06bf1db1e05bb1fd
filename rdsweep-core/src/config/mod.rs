//! Configuration structures and constants for the rdsweep-core library.
//!
//! This module provides the configuration of one experiment batch: where
//! artifacts go, how the reference is normalized, what happens to artifacts
//! and failures, and where the external tools live.

mod builder;

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub use builder::CoreConfigBuilder;

use crate::error::{CoreError, CoreResult};
use crate::external::RunOptions;
use crate::media::Resolution;

// Default constants

/// Default pixel format of the normalized reference.
pub const DEFAULT_REFERENCE_PIX_FMT: &str = "yuv420p";

/// Default GoP length in frames.
pub const DEFAULT_GOP_LENGTH: u32 = 600;

/// Default scratch directory for artifacts.
pub const DEFAULT_TMP_DIR: &str = "/tmp";

// ============================================================================
// POLICY ENUMS
// ============================================================================

/// Which artifacts are deleted after each configuration completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CleanupLevel {
    /// Keep everything
    Keep,
    /// Delete decoded and rescaled artifacts
    #[default]
    Intermediates,
    /// Delete the encoded artifact as well
    All,
}

/// What the orchestrator does when one configuration fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop the batch and return the error
    #[default]
    Abort,
    /// Log the failure, write no row and continue
    Skip,
}

/// How VMAF is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VmafBackend {
    /// libvmaf filter when ffmpeg advertises it, else the standalone scorer
    #[default]
    Auto,
    Filter,
    Standalone,
}

impl fmt::Display for VmafBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmafBackend::Auto => write!(f, "auto"),
            VmafBackend::Filter => write!(f, "filter"),
            VmafBackend::Standalone => write!(f, "standalone"),
        }
    }
}

// ============================================================================
// CORE CONFIG
// ============================================================================

/// Main configuration structure for one experiment batch.
///
/// All fields have defaults matching the command-line defaults, so a
/// library consumer only sets what it needs. The builder provides a fluent
/// way to do so.
///
/// # Examples
///
/// ```rust
/// use rdsweep_core::config::{CleanupLevel, CoreConfigBuilder};
/// use std::path::PathBuf;
///
/// let config = CoreConfigBuilder::new()
///     .tmp_dir(PathBuf::from("/tmp/rd"))
///     .label("nightly")
///     .cleanup(CleanupLevel::All)
///     .jobs(2)
///     .build();
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Directory receiving every artifact of the batch
    pub tmp_dir: PathBuf,

    /// Free-form label copied into every row
    pub label: String,

    /// Reference resolution; `None` keeps the input resolution
    pub reference_resolution: Option<Resolution>,

    /// Pixel format of the reference and of rescaled artifacts
    pub reference_pix_fmt: String,

    /// Keyframe interval in frames; `None` leaves the encoder default
    pub gop_length: Option<u32>,

    pub cleanup: CleanupLevel,

    pub failure_policy: FailurePolicy,

    /// Concurrent configurations per input
    pub jobs: usize,

    /// Deadline for every external command
    pub command_timeout: Option<Duration>,

    /// Wrap encoders in `perf stat`
    pub capture_perf: bool,

    pub vmaf_backend: VmafBackend,

    /// Explicit VMAF model path; `None` uses the tool's built-in model
    pub vmaf_model: Option<String>,

    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
    pub vmaf_bin: String,
    pub perf_bin: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            tmp_dir: PathBuf::from(DEFAULT_TMP_DIR),
            label: String::new(),
            reference_resolution: None,
            reference_pix_fmt: DEFAULT_REFERENCE_PIX_FMT.to_string(),
            gop_length: Some(DEFAULT_GOP_LENGTH),
            cleanup: CleanupLevel::default(),
            failure_policy: FailurePolicy::default(),
            jobs: 1,
            command_timeout: None,
            capture_perf: false,
            vmaf_backend: VmafBackend::default(),
            vmaf_model: None,
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
            vmaf_bin: "vmaf".to_string(),
            perf_bin: "perf".to_string(),
        }
    }
}

impl CoreConfig {
    /// Rejects settings no batch can run with.
    pub fn validate(&self) -> CoreResult<()> {
        if self.jobs == 0 {
            return Err(CoreError::Configuration("jobs must be at least 1".to_string()));
        }
        if self.reference_pix_fmt.trim().is_empty() {
            return Err(CoreError::Configuration("pixel format must not be empty".to_string()));
        }
        if self.gop_length == Some(0) {
            return Err(CoreError::Configuration("GoP length must be positive".to_string()));
        }
        if self.command_timeout == Some(Duration::ZERO) {
            return Err(CoreError::Configuration("command timeout must be positive".to_string()));
        }
        Ok(())
    }

    /// Options shared by every external invocation of the batch.
    #[must_use]
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            timeout: self.command_timeout,
            ..RunOptions::default()
        }
    }
}
