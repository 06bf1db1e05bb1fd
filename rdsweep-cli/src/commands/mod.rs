//! Command implementations for the CLI.
//!
//! Each submodule contains the implementation of a specific command.

/// The `codecs` command: lists the codec registry.
pub mod codecs;

/// The `run` command: runs a sweep and writes the result table.
pub mod run;
