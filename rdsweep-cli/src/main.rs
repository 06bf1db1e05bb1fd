// ============================================================================
// rdsweep-cli/src/main.rs
// ============================================================================
//
// RDSWEEP CLI: Entry Point
//
// Parses the command line, installs logging and dispatches to the command
// implementations in `commands`.
//
// Exit codes:
// - 0: success
// - 1: any error, or a sweep that skipped configurations
// - 2: invalid arguments (reported by clap)

use clap::Parser;
use log::{error, info};
use owo_colors::OwoColorize;
use rdsweep_cli::error::EXIT_FAILURE;
use rdsweep_cli::logging;
use rdsweep_cli::{Cli, Commands, RunStatus, run_codecs, run_sweep};

use std::process;

fn main() {
    let cli = Cli::parse();

    let level = logging::console_level(cli.verbose, cli.quiet);
    match logging::init(level, cli.log_dir.as_deref()) {
        Ok(Some(path)) => info!("Run log: {}", path.display()),
        Ok(None) => {}
        Err(e) => {
            eprintln!("{} cannot set up logging: {}", "Error:".bright_red().bold(), e);
            process::exit(EXIT_FAILURE);
        }
    }

    let result = match cli.command {
        Commands::Run(args) => run_sweep(args, !cli.quiet).map(|status| status == RunStatus::Complete),
        Commands::Codecs(args) => run_codecs(&args).map(|()| true),
    };

    match result {
        Ok(true) => {}
        Ok(false) => {
            error!("Some configurations failed and were skipped");
            process::exit(EXIT_FAILURE);
        }
        Err(e) => {
            error!("{e}");
            process::exit(EXIT_FAILURE);
        }
    }
}
