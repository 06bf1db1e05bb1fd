// ============================================================================
// rdsweep-core/src/error.rs
// ============================================================================
//
// ERROR HANDLING: Error Taxonomy for the Experiment Pipeline
//
// Every stage of the pipeline reports failures through `CoreError`. Variants
// map one-to-one to the stage that failed so the orchestrator can decide
// whether an error is fatal for the batch or only for one configuration.

use std::path::Path;
use std::time::Duration;

use thiserror::Error;

use crate::external::{CommandLine, StageResult};

/// Custom error types for rdsweep
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid sweep configuration: {0}")]
    Configuration(String),

    #[error("Required external tool not found: {0}")]
    DependencyNotFound(String),

    #[error("Failed to start '{0}': {1}")]
    CommandStart(String, #[source] std::io::Error),

    #[error("Command timed out after {timeout:?}: {command}")]
    CommandTimeout { command: String, timeout: Duration },

    #[error("Probe failed for {path}: {message}")]
    Probe { path: String, message: String },

    #[error("Normalization check failed for {path}: {message}")]
    Normalization { path: String, message: String },

    #[error("Encode failed (exit code {exit_code}): {command}\n{stderr}")]
    Encode {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("Decode failed (exit code {exit_code}): {command}\n{stderr}")]
    Decode {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("Metric computation failed ({metric}): {message}")]
    Metric { metric: String, message: String },

    #[error("Invalid path: {0}")]
    PathError(String),
}

/// Result type for rdsweep operations
pub type CoreResult<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Whether the error is raised before any external process runs.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, CoreError::Configuration(_))
    }
}

pub(crate) fn probe_error(path: &Path, message: impl Into<String>) -> CoreError {
    CoreError::Probe {
        path: path.display().to_string(),
        message: message.into(),
    }
}

pub(crate) fn normalization_error(path: &Path, message: impl Into<String>) -> CoreError {
    CoreError::Normalization {
        path: path.display().to_string(),
        message: message.into(),
    }
}

pub(crate) fn metric_error(metric: &str, message: impl Into<String>) -> CoreError {
    CoreError::Metric {
        metric: metric.to_string(),
        message: message.into(),
    }
}

pub(crate) fn encode_failed(command: &CommandLine, result: &StageResult) -> CoreError {
    CoreError::Encode {
        command: command.to_string(),
        exit_code: result.exit_code,
        stderr: result.stderr.clone(),
    }
}

pub(crate) fn decode_failed(command: &CommandLine, result: &StageResult) -> CoreError {
    CoreError::Decode {
        command: command.to_string(),
        exit_code: result.exit_code,
        stderr: result.stderr.clone(),
    }
}
