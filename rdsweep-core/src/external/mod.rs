// ============================================================================
// rdsweep-core/src/external/mod.rs
// ============================================================================
//
// EXTERNAL TOOLS: Interactions with External CLI Tools
//
// This module encapsulates every interaction with external command-line tools
// (ffmpeg, ffprobe, SvtAv1EncApp, vmaf, perf). Commands are described as an
// argument-token sequence (`CommandLine`) and executed through the
// `ProcessRunner` trait, which returns a structured `StageResult` instead of
// failing on a non-zero exit.
//
// KEY COMPONENTS:
// - CommandLine: program + argument tokens, never shell text
// - RunOptions: environment overrides, perf capture, dry-run, timeout
// - StageResult / PerfCounters: captured outcome of one process
// - ProcessRunner: the execution seam (SystemProcessRunner in production,
//   the doubles in `mocks` for tests)
//
// DESIGN PHILOSOPHY:
// Consumers receive the runner by reference (dependency injection), so the
// whole pipeline can be exercised without any real media tool installed.

// ---- Internal crate imports ----
use crate::error::{CoreError, CoreResult};

// ---- Standard library imports ----
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fmt;
use std::path::Path;
use std::time::Duration;

// ============================================================================
// SUBMODULES
// ============================================================================

/// Contains the ffmpeg argument builder shared by every ffmpeg-based stage
pub mod ffmpeg_builder;

/// Contains the media probe built on ffprobe
pub mod ffprobe_executor;

/// Contains the production process runner
pub mod runner;

/// Contains scriptable runner doubles used by tests
pub mod mocks;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use ffmpeg_builder::FfmpegCommandBuilder;
pub use ffprobe_executor::MediaProbe;
pub use runner::SystemProcessRunner;

// ============================================================================
// COMMAND LINE
// ============================================================================

/// A program and its argument tokens.
///
/// Arguments are passed to the process verbatim; codec-specific punctuation
/// (`:`, `=`, `/`) never goes through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(&mut self, arg: impl AsRef<OsStr>) -> &mut Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self.arg(arg);
        }
        self
    }

    /// Adds a path argument.
    pub fn path(&mut self, path: &Path) -> &mut Self {
        self.arg(path.as_os_str())
    }

    /// Whether any argument contains `needle`.
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.program.contains(needle) || self.args.iter().any(|a| a.contains(needle))
    }

    /// Returns the token following `flag`, if present.
    #[must_use]
    pub fn value_of(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", quote_token(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", quote_token(arg))?;
        }
        Ok(())
    }
}

/// Quotes a token for display so a logged command can be pasted into a shell.
fn quote_token(token: &str) -> String {
    let plain = !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+%@".contains(c));
    if plain {
        token.to_string()
    } else {
        format!("'{}'", token.replace('\'', r"'\''"))
    }
}

// ============================================================================
// RUN OPTIONS AND RESULTS
// ============================================================================

/// Options for a single external invocation.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Extra or overriding environment variables
    pub env: BTreeMap<String, String>,
    /// Wrap the command in `perf stat` and parse the counters
    pub capture_perf: bool,
    /// Skip execution and return a synthetic success
    pub dry_run: bool,
    /// Kill the process if it runs longer than this
    pub timeout: Option<Duration>,
}

impl RunOptions {
    #[must_use]
    pub fn with_perf(mut self, capture_perf: bool) -> Self {
        self.capture_perf = capture_perf;
        self
    }

    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// CPU counters reported by `perf stat` for one process.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PerfCounters {
    pub user_time_secs: f64,
    pub instructions: u64,
    pub cycles: u64,
}

/// Outcome of one external process.
#[derive(Debug, Clone)]
pub struct StageResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
    pub perf: Option<PerfCounters>,
}

impl StageResult {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Result reported for a dry run.
    #[must_use]
    pub fn synthetic_success() -> Self {
        Self {
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
            duration: Duration::ZERO,
            perf: None,
        }
    }
}

// ============================================================================
// PROCESS RUNNER TRAIT
// ============================================================================

/// Executes external commands.
///
/// Implementations spawn exactly one process per call, block until it
/// terminates and never retry. A non-zero exit is reported through
/// [`StageResult::exit_code`]; `Err` is reserved for processes that could
/// not be started or that exceeded [`RunOptions::timeout`].
pub trait ProcessRunner: Send + Sync {
    fn execute(&self, command: &CommandLine, options: &RunOptions) -> CoreResult<StageResult>;
}

impl<R: ProcessRunner + ?Sized> ProcessRunner for &R {
    fn execute(&self, command: &CommandLine, options: &RunOptions) -> CoreResult<StageResult> {
        (**self).execute(command, options)
    }
}

// ============================================================================
// DEPENDENCY CHECKING
// ============================================================================

/// Checks that a required external command is available and executable.
///
/// Runs `<program> -version` through the runner. Only a missing binary is
/// an error; the exit status of the version query is not inspected.
pub fn check_dependency<R: ProcessRunner + ?Sized>(runner: &R, program: &str) -> CoreResult<()> {
    let mut cmd = CommandLine::new(program);
    cmd.arg("-version");

    match runner.execute(&cmd, &RunOptions::default()) {
        Ok(_) => {
            log::debug!("Found dependency: {}", program);
            Ok(())
        }
        Err(CoreError::CommandStart(_, e)) if e.kind() == std::io::ErrorKind::NotFound => {
            log::warn!("Dependency '{}' not found.", program);
            Err(CoreError::DependencyNotFound(program.to_string()))
        }
        Err(e) => {
            log::error!("Failed to start dependency check command '{}': {}", program, e);
            Err(e)
        }
    }
}
