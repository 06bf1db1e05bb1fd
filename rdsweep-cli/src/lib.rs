// rdsweep-cli/src/lib.rs
//
// Library portion of the rdsweep CLI application.
// Contains argument definitions and command logic.

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod progress;

// Re-export items needed by the binary or integration tests
pub use cli::{Cli, CodecsArgs, Commands, RunArgs};
pub use commands::codecs::run_codecs;
pub use commands::run::{RunStatus, run_sweep};
