// ============================================================================
// rdsweep-cli/src/logging.rs
// ============================================================================
//
// LOGGING SETUP: Console and Run Log File
//
// The core library only emits through the `log` facade. This module installs
// a `fern` dispatcher with two sinks:
// - the console (stderr), level chosen by -v / -q, level names colored
// - an optional run log file `rdsweep_run_<YYYYMMDD_HHMMSS>.log` that always
//   records at debug level, so every external command line is kept

use log::LevelFilter;
use owo_colors::OwoColorize;

use std::fs;
use std::path::{Path, PathBuf};

/// Returns the current local timestamp formatted as "YYYYMMDD_HHMMSS".
pub fn get_timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Console level for the -v count and the -q flag.
pub fn console_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Warn;
    }
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Installs the global logger; returns the run log path when one is written.
pub fn init(level: LevelFilter, log_dir: Option<&Path>) -> Result<Option<PathBuf>, fern::InitError> {
    let console = fern::Dispatch::new()
        .level(level)
        .format(|out, message, record| {
            let label = match record.level() {
                log::Level::Error => "ERROR".bright_red().to_string(),
                log::Level::Warn => "WARN ".yellow().to_string(),
                log::Level::Info => "INFO ".green().to_string(),
                log::Level::Debug => "DEBUG".blue().to_string(),
                log::Level::Trace => "TRACE".magenta().to_string(),
            };
            out.finish(format_args!("{label} {message}"))
        })
        .chain(std::io::stderr());

    let mut root = fern::Dispatch::new()
        // noisy dependency modules stay at info even with -vv
        .level_for("rayon_core", LevelFilter::Info)
        .chain(console);

    let log_path = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            let path = dir.join(format!("rdsweep_run_{}.log", get_timestamp()));
            let file = fern::Dispatch::new()
                .level(LevelFilter::Debug.max(level))
                .format(|out, message, record| {
                    out.finish(format_args!(
                        "{} {:<5} [{}] {}",
                        chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                        record.level(),
                        record.target(),
                        message
                    ))
                })
                .chain(fern::log_file(&path)?);
            root = root.chain(file);
            Some(path)
        }
        None => None,
    };

    root.apply()?;
    Ok(log_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_level() {
        assert_eq!(console_level(0, false), LevelFilter::Info);
        assert_eq!(console_level(1, false), LevelFilter::Debug);
        assert_eq!(console_level(3, false), LevelFilter::Trace);
        assert_eq!(console_level(2, true), LevelFilter::Warn);
    }

    #[test]
    fn test_timestamp_shape() {
        let ts = get_timestamp();
        assert_eq!(ts.len(), 15);
        assert_eq!(ts.as_bytes()[8], b'_');
    }
}
