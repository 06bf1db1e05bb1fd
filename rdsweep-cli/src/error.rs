// ============================================================================
// rdsweep-cli/src/error.rs
// ============================================================================
//
// CLI ERROR HANDLING: Error types and utilities for the CLI
//
// The CLI reuses `CoreError`; `CliErrorContext` prefixes an error with what
// the command was doing when it failed.

// ---- Internal crate imports ----
use rdsweep_core::{CoreError, CoreResult};

// ---- Standard library imports ----
use std::fmt;

/// Type alias for CLI results using CoreError.
pub type CliResult<T> = CoreResult<T>;

/// Extension trait for adding context to errors in the CLI.
pub trait CliErrorContext<T> {
    /// Add context using a closure (for lazy evaluation).
    fn cli_with_context<C, F>(self, f: F) -> CliResult<T>
    where
        C: fmt::Display,
        F: FnOnce() -> C;
}

impl<T, E> CliErrorContext<T> for Result<T, E>
where
    E: Into<CoreError>,
{
    fn cli_with_context<C, F>(self, f: F) -> CliResult<T>
    where
        C: fmt::Display,
        F: FnOnce() -> C,
    {
        self.map_err(|e| {
            let core_error: CoreError = e.into();
            match core_error {
                CoreError::Io(io) => CoreError::PathError(format!("{}: {}", f(), io)),
                other => other,
            }
        })
    }
}

/// Process exit code for a failed command.
pub const EXIT_FAILURE: i32 = 1;
