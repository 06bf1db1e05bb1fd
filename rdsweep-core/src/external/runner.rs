// ============================================================================
// rdsweep-core/src/external/runner.rs
// ============================================================================
//
// PROCESS RUNNER: Blocking Execution of External Commands
//
// `SystemProcessRunner` spawns one process per call, drains stdout and stderr
// on helper threads so a chatty tool cannot dead-lock on a full pipe, and
// waits for exit with an optional deadline. On unix each command runs in its
// own process group so a timeout also stops the grandchildren (the encoder
// under `perf`, or anything a shell started). When perf counters are
// requested the command is wrapped in `perf stat -o <report> --` and the
// report is parsed after the process exits.

use super::{CommandLine, PerfCounters, ProcessRunner, RunOptions, StageResult};
use crate::error::{CoreError, CoreResult};

use log::{debug, error, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Interval between exit polls while a deadline is armed.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

static PERF_INSTRUCTIONS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\S+)\s+instructions").expect("valid regex"));
static PERF_CYCLES: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\S+)\s+cycles").expect("valid regex"));
static PERF_USER_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\S+)\s+seconds\s+user").expect("valid regex"));

/// Production [`ProcessRunner`] backed by `std::process`.
#[derive(Debug, Clone)]
pub struct SystemProcessRunner {
    perf_bin: String,
}

impl Default for SystemProcessRunner {
    fn default() -> Self {
        Self::new("perf")
    }
}

impl SystemProcessRunner {
    #[must_use]
    pub fn new(perf_bin: impl Into<String>) -> Self {
        Self {
            perf_bin: perf_bin.into(),
        }
    }

    fn build_command(&self, command: &CommandLine, perf_report: Option<&std::path::Path>) -> Command {
        let mut cmd = match perf_report {
            Some(report) => {
                let mut cmd = Command::new(&self.perf_bin);
                cmd.arg("stat").arg("-o").arg(report).arg("--");
                cmd.arg(&command.program);
                cmd
            }
            None => Command::new(&command.program),
        };
        cmd.args(&command.args);
        cmd
    }
}

impl ProcessRunner for SystemProcessRunner {
    fn execute(&self, command: &CommandLine, options: &RunOptions) -> CoreResult<StageResult> {
        debug!("Running: {}", command);
        if options.dry_run {
            debug!("Dry run, skipping execution");
            return Ok(StageResult::synthetic_success());
        }

        let perf_report = if options.capture_perf {
            Some(
                tempfile::Builder::new()
                    .prefix("perf.")
                    .suffix(".txt")
                    .tempfile()?,
            )
        } else {
            None
        };

        let mut cmd = self.build_command(command, perf_report.as_ref().map(|f| f.path()));
        cmd.envs(&options.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        std::os::unix::process::CommandExt::process_group(&mut cmd, 0);

        let start = Instant::now();
        let mut child = cmd.spawn().map_err(|e| {
            error!("Failed to spawn '{}': {}", command.program, e);
            CoreError::CommandStart(command.program.clone(), e)
        })?;

        let stdout_handle = child.stdout.take().map(drain);
        let stderr_handle = child.stderr.take().map(drain);

        let status = match options.timeout {
            Some(timeout) => match wait_with_deadline(&mut child, timeout)? {
                Some(status) => status,
                None => {
                    warn!("Killing '{}' after {:?}", command.program, timeout);
                    kill_tree(&mut child, &command.program);
                    if let Err(e) = child.wait() {
                        debug!("Reaping '{}' failed: {}", command.program, e);
                    }
                    // a surviving grandchild may still hold the pipes open,
                    // so the drain threads are detached rather than joined
                    drop(stdout_handle);
                    drop(stderr_handle);
                    return Err(CoreError::CommandTimeout {
                        command: command.to_string(),
                        timeout,
                    });
                }
            },
            None => child.wait()?,
        };
        let duration = start.elapsed();

        let stdout = collect(stdout_handle);
        let stderr = collect(stderr_handle);

        let perf = match perf_report {
            Some(report) => match std::fs::read_to_string(report.path()) {
                Ok(text) => Some(parse_perf_report(&text)),
                Err(e) => {
                    warn!("Could not read perf report for '{}': {}", command.program, e);
                    None
                }
            },
            None => None,
        };

        let exit_code = status.code().unwrap_or(-1);
        if exit_code != 0 {
            debug!("'{}' exited with code {}", command.program, exit_code);
        }

        Ok(StageResult {
            exit_code,
            stdout,
            stderr,
            duration,
            perf,
        })
    }
}

/// Reads a pipe to its end on a helper thread.
fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Err(e) = pipe.read_to_end(&mut buf) {
            debug!("Pipe read ended early: {}", e);
        }
        buf
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

/// Kills the child's process group, falling back to the child alone.
fn kill_tree(child: &mut Child, program: &str) {
    #[cfg(unix)]
    {
        let group = format!("-{}", child.id());
        match Command::new("kill")
            .args(["-KILL", "--", group.as_str()])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
        {
            Ok(status) if status.success() => return,
            Ok(status) => debug!("kill {} exited with {}", group, status),
            Err(e) => debug!("kill {} could not start: {}", group, e),
        }
    }
    if let Err(e) = child.kill() {
        warn!("Failed to kill '{}': {}", program, e);
    }
}

/// Polls the child until it exits or `timeout` elapses (`Ok(None)`).
fn wait_with_deadline(
    child: &mut Child,
    timeout: Duration,
) -> CoreResult<Option<std::process::ExitStatus>> {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        std::thread::sleep(POLL_INTERVAL);
    }
    Ok(child.try_wait()?)
}

/// Parses the text report written by `perf stat -o`.
///
/// Counters missing from the report (e.g. inside containers without PMU
/// access) are left at zero.
pub fn parse_perf_report(text: &str) -> PerfCounters {
    let mut counters = PerfCounters::default();
    for line in text.lines() {
        if let Some(v) = capture_number(&PERF_INSTRUCTIONS, line) {
            counters.instructions = v as u64;
        } else if let Some(v) = capture_number(&PERF_CYCLES, line) {
            counters.cycles = v as u64;
        } else if let Some(v) = capture_number(&PERF_USER_TIME, line) {
            counters.user_time_secs = v;
        }
    }
    counters
}

fn capture_number(re: &Regex, line: &str) -> Option<f64> {
    re.captures(line)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().replace(',', "").parse::<f64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERF_SAMPLE: &str = "
 Performance counter stats for 'ffmpeg -i in.y4m out.mp4':

          2,345.67 msec task-clock:u              #    1.912 CPUs utilized
     7,654,321,098      cycles:u                  #    3.263 GHz
    12,345,678,901      instructions:u            #    1.61  insn per cycle

       1.226789012 seconds time elapsed

       2.201234000 seconds user
       0.144321000 seconds sys
";

    #[test]
    fn test_parse_perf_report() {
        let counters = parse_perf_report(PERF_SAMPLE);
        assert_eq!(counters.instructions, 12_345_678_901);
        assert_eq!(counters.cycles, 7_654_321_098);
        assert!((counters.user_time_secs - 2.201234).abs() < 1e-9);
    }

    #[test]
    fn test_parse_perf_report_missing_counters() {
        let counters = parse_perf_report("<not supported>      instructions:u\n");
        assert_eq!(counters, PerfCounters::default());
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit_is_reported_not_raised() {
        let runner = SystemProcessRunner::default();
        let mut cmd = CommandLine::new("sh");
        cmd.args(["-c", "echo out; echo err 1>&2; exit 3"]);
        let result = runner.execute(&cmd, &RunOptions::default()).unwrap();
        assert_eq!(result.exit_code, 3);
        assert_eq!(result.stdout.trim(), "out");
        assert_eq!(result.stderr.trim(), "err");
    }

    #[cfg(unix)]
    #[test]
    fn test_env_overrides_are_applied() {
        let runner = SystemProcessRunner::default();
        let mut cmd = CommandLine::new("sh");
        cmd.args(["-c", "printf %s \"$RDSWEEP_TEST_VALUE\""]);
        let options = RunOptions::default().with_env("RDSWEEP_TEST_VALUE", "42");
        let result = runner.execute(&cmd, &options).unwrap();
        assert_eq!(result.stdout, "42");
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_process() {
        let runner = SystemProcessRunner::default();
        let mut cmd = CommandLine::new("sleep");
        cmd.arg("5");
        let options = RunOptions {
            timeout: Some(Duration::from_millis(100)),
            ..Default::default()
        };
        let err = runner.execute(&cmd, &options).unwrap_err();
        assert!(matches!(err, CoreError::CommandTimeout { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_does_not_wait_for_grandchildren() {
        let runner = SystemProcessRunner::default();
        let mut cmd = CommandLine::new("sh");
        cmd.args(["-c", "sleep 3; true"]);
        let options = RunOptions {
            timeout: Some(Duration::from_millis(100)),
            ..Default::default()
        };
        let start = Instant::now();
        let err = runner.execute(&cmd, &options).unwrap_err();
        assert!(matches!(err, CoreError::CommandTimeout { .. }));
        assert!(start.elapsed() < Duration::from_millis(1500), "took {:?}", start.elapsed());
    }

    #[test]
    fn test_dry_run_does_not_spawn() {
        let runner = SystemProcessRunner::default();
        let cmd = CommandLine::new("definitely-not-a-real-binary-rdsweep");
        let options = RunOptions {
            dry_run: true,
            ..Default::default()
        };
        let result = runner.execute(&cmd, &options).unwrap();
        assert!(result.success());
    }

    #[test]
    fn test_missing_binary_is_command_start_error() {
        let runner = SystemProcessRunner::default();
        let cmd = CommandLine::new("definitely-not-a-real-binary-rdsweep");
        let err = runner.execute(&cmd, &RunOptions::default()).unwrap_err();
        assert!(matches!(err, CoreError::CommandStart(..)));
    }
}
