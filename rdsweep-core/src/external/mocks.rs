// rdsweep-core/src/external/mocks.rs

// --- Runner doubles (for testing) ---
//
// `ScriptedRunner` answers commands from pattern rules. `FakeMediaTools`
// goes further and emulates the subset of ffmpeg/ffprobe/SvtAv1EncApp/vmaf
// behaviour the pipeline relies on, writing real (tiny) files so that
// naming, cleanup and size accounting can be observed on disk.

use super::{CommandLine, ProcessRunner, RunOptions, StageResult};
use crate::error::{CoreError, CoreResult};
use crate::media::{FrameRate, Resolution};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

type Responder = Box<dyn Fn(&CommandLine) -> CoreResult<StageResult> + Send + Sync>;

fn result(exit_code: i32, stdout: &str, stderr: &str) -> StageResult {
    StageResult {
        exit_code,
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
        duration: Duration::from_millis(5),
        perf: None,
    }
}

fn not_found(program: &str) -> CoreError {
    CoreError::CommandStart(
        program.to_string(),
        std::io::Error::new(std::io::ErrorKind::NotFound, "no rule for command"),
    )
}

// ============================================================================
// SCRIPTED RUNNER
// ============================================================================

/// Runner double that answers commands from pattern rules.
///
/// Rules are checked in insertion order; the first rule whose pattern occurs
/// in the program name or any argument answers. Commands matching no rule
/// behave like a missing binary.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<(String, Responder)>>,
    calls: Mutex<Vec<CommandLine>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn respond(&self, pattern: &str, exit_code: i32, stdout: &str, stderr: &str) {
        let canned = result(exit_code, stdout, stderr);
        self.respond_with(pattern, move |_| Ok(canned.clone()));
    }

    pub fn respond_with<F>(&self, pattern: &str, responder: F)
    where
        F: Fn(&CommandLine) -> CoreResult<StageResult> + Send + Sync + 'static,
    {
        if let Ok(mut rules) = self.rules.lock() {
            rules.push((pattern.to_string(), Box::new(responder)));
        }
    }

    pub fn calls(&self) -> Vec<CommandLine> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl ProcessRunner for ScriptedRunner {
    fn execute(&self, command: &CommandLine, options: &RunOptions) -> CoreResult<StageResult> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(command.clone());
        }
        if options.dry_run {
            return Ok(StageResult::synthetic_success());
        }
        let rules = self
            .rules
            .lock()
            .map_err(|_| CoreError::PathError("scripted runner poisoned".to_string()))?;
        match rules.iter().find(|(pattern, _)| command.contains(pattern)) {
            Some((pattern, responder)) => {
                log::debug!("ScriptedRunner: '{}' answered {}", pattern, command);
                responder(command)
            }
            None => {
                log::error!("ScriptedRunner: no rule for {}", command);
                Err(not_found(&command.program))
            }
        }
    }
}

// ============================================================================
// FAKE MEDIA TOOLS
// ============================================================================

/// Properties the fake tools track per file.
#[derive(Debug, Clone)]
pub struct MediaFacts {
    pub resolution: Resolution,
    pub pix_fmt: String,
    pub framerate: FrameRate,
    pub duration_secs: f64,
}

/// Emulates the external media tools on top of the real file system.
pub struct FakeMediaTools {
    facts: Mutex<HashMap<PathBuf, MediaFacts>>,
    failures: Mutex<Vec<(String, i32, String)>>,
    drifts: Mutex<Vec<(String, Resolution)>>,
    calls: Mutex<Vec<CommandLine>>,
    libvmaf_filter: bool,
    luma_reported: bool,
    frames: usize,
}

impl Default for FakeMediaTools {
    fn default() -> Self {
        Self {
            facts: Mutex::new(HashMap::new()),
            failures: Mutex::new(Vec::new()),
            drifts: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            libvmaf_filter: true,
            luma_reported: true,
            frames: 4,
        }
    }
}

impl FakeMediaTools {
    pub fn new() -> Self {
        Default::default()
    }

    /// Disables the libvmaf filter so the standalone scorer is used.
    #[must_use]
    pub fn without_libvmaf(mut self) -> Self {
        self.libvmaf_filter = false;
        self
    }

    /// Emits PSNR/SSIM logs that only carry the combined average.
    #[must_use]
    pub fn without_luma(mut self) -> Self {
        self.luma_reported = false;
        self
    }

    /// Creates `path` on disk and registers it as a video.
    pub fn add_media(
        &self,
        path: &Path,
        resolution: Resolution,
        pix_fmt: &str,
        duration_secs: f64,
    ) -> std::io::Result<()> {
        std::fs::write(path, b"fake media")?;
        self.remember(
            path,
            MediaFacts {
                resolution,
                pix_fmt: pix_fmt.to_string(),
                framerate: FrameRate { num: 30, den: 1 },
                duration_secs,
            },
        );
        Ok(())
    }

    /// Makes every command containing `pattern` exit with `exit_code`.
    pub fn fail_when(&self, pattern: &str, exit_code: i32, stderr: &str) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.push((pattern.to_string(), exit_code, stderr.to_string()));
        }
    }

    /// Outputs whose path contains `pattern` come out at `resolution`
    /// regardless of what was requested.
    pub fn drift_resolution(&self, pattern: &str, resolution: Resolution) {
        if let Ok(mut drifts) = self.drifts.lock() {
            drifts.push((pattern.to_string(), resolution));
        }
    }

    pub fn calls(&self) -> Vec<CommandLine> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of recorded commands containing `pattern`.
    pub fn count(&self, pattern: &str) -> usize {
        self.calls().iter().filter(|c| c.contains(pattern)).count()
    }

    fn remember(&self, path: &Path, facts: MediaFacts) {
        if let Ok(mut map) = self.facts.lock() {
            map.insert(path.to_path_buf(), facts);
        }
    }

    fn lookup(&self, path: &Path) -> Option<MediaFacts> {
        self.facts.lock().ok().and_then(|m| m.get(path).cloned())
    }

    fn ffprobe(&self, cmd: &CommandLine) -> CoreResult<StageResult> {
        let Some(path) = cmd.args.last().map(PathBuf::from) else {
            return Ok(result(1, "", "no input"));
        };
        let Some(facts) = self.lookup(&path) else {
            return Ok(result(1, "", &format!("{}: Invalid data found when processing input", path.display())));
        };
        let out = match cmd.value_of("-show_entries") {
            Some("stream=width,height") => facts.resolution.to_string(),
            Some("stream=pix_fmt") => facts.pix_fmt,
            Some("stream=r_frame_rate") => facts.framerate.to_string(),
            Some("format=duration") => format!("{:.6}", facts.duration_secs),
            _ => return Ok(result(1, "", "unsupported entries")),
        };
        Ok(result(0, &format!("{out}\n"), ""))
    }

    fn ffmpeg(&self, cmd: &CommandLine) -> CoreResult<StageResult> {
        if cmd.args.iter().any(|a| a == "-filters") {
            let mut listing = String::from(" ... psnr              VV->V      Calculate the PSNR between two video streams.\n");
            if self.libvmaf_filter {
                listing.push_str(" ... libvmaf           VV->V      Calculate the VMAF between two video streams.\n");
            }
            return Ok(result(0, &listing, ""));
        }
        if cmd.args.iter().any(|a| a == "-version") {
            return Ok(result(0, "ffmpeg version fake", ""));
        }
        if let Some(filter) = cmd.args.iter().find(|a| a.contains("stats_file=")) {
            let log = after(filter, "stats_file=");
            let text = if filter.starts_with("psnr") {
                self.psnr_log()
            } else {
                self.ssim_log()
            };
            std::fs::write(log, text)?;
            return Ok(result(0, "", ""));
        }
        if let Some(filter) = cmd.args.iter().find(|a| a.starts_with("libvmaf")) {
            let log = after(filter, "log_path=");
            std::fs::write(log, self.vmaf_json())?;
            return Ok(result(0, "", ""));
        }
        self.transcode(cmd, cmd.value_of("-i"), cmd.args.last().map(String::as_str))
    }

    fn transcode(
        &self,
        cmd: &CommandLine,
        input: Option<&str>,
        output: Option<&str>,
    ) -> CoreResult<StageResult> {
        let (Some(input), Some(output)) = (input, output) else {
            return Ok(result(1, "", "missing input or output"));
        };
        let Some(mut facts) = self.lookup(Path::new(input)) else {
            return Ok(result(1, "", &format!("{input}: No such file or directory")));
        };
        if let Some(res) = cmd.value_of("-s").and_then(|s| s.parse::<Resolution>().ok()) {
            facts.resolution = res;
        }
        if let Some(fmt) = cmd.value_of("-pix_fmt") {
            facts.pix_fmt = fmt.to_string();
        }
        if let Ok(drifts) = self.drifts.lock() {
            if let Some((_, res)) = drifts.iter().find(|(p, _)| output.contains(p.as_str())) {
                facts.resolution = *res;
            }
        }

        let bytes = match cmd.value_of("-b:v").or_else(|| cmd.value_of("--tbr")) {
            Some(rate) => {
                let kbps: f64 = rate.trim_end_matches('k').parse().unwrap_or(100.0);
                (kbps * 125.0 * facts.duration_secs) as usize
            }
            None => 2_000,
        };
        std::fs::write(output, vec![0u8; bytes])?;
        self.remember(Path::new(output), facts);
        Ok(result(0, "", "frame=    4 fps=0.0 q=-1.0 Lsize=N/A"))
    }

    fn psnr_log(&self) -> String {
        (0..self.frames)
            .map(|i| {
                let f = i as f64;
                if self.luma_reported {
                    format!(
                        "n:{} mse_avg:2.59 mse_y:3.23 mse_u:1.61 mse_v:1.03 psnr_avg:{:.2} psnr_y:{:.2} psnr_u:{:.2} psnr_v:{:.2}\n",
                        i + 1,
                        44.0 + f,
                        40.0 + f,
                        45.0 + f,
                        46.0 + f
                    )
                } else {
                    format!("n:{} mse_avg:2.59 psnr_avg:{:.2}\n", i + 1, 44.0 + f)
                }
            })
            .collect()
    }

    fn ssim_log(&self) -> String {
        (0..self.frames)
            .map(|i| {
                let f = i as f64 / 100.0;
                if self.luma_reported {
                    format!(
                        "n:{} Y:{:.6} U:{:.6} V:{:.6} All:{:.6} (18.238620)\n",
                        i + 1,
                        0.95 + f,
                        0.96 + f,
                        0.97 + f,
                        0.955 + f
                    )
                } else {
                    format!("n:{} All:{:.6} (18.238620)\n", i + 1, 0.955 + f)
                }
            })
            .collect()
    }

    fn vmaf_json(&self) -> String {
        let scores: Vec<f64> = (0..self.frames).map(|i| 90.0 + i as f64).collect();
        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        let harmonic = scores.len() as f64 / scores.iter().map(|s| 1.0 / s).sum::<f64>();
        let frames: Vec<serde_json::Value> = scores
            .iter()
            .enumerate()
            .map(|(i, s)| serde_json::json!({"frameNum": i, "metrics": {"vmaf": s}}))
            .collect();
        serde_json::json!({
            "version": "fake",
            "frames": frames,
            "pooled_metrics": {"vmaf": {"min": 90.0, "max": 93.0, "mean": mean, "harmonic_mean": harmonic}}
        })
        .to_string()
    }
}

/// Value of the filter option `key`, undoing the graph-level and then the
/// option-level escaping.
fn after(text: &str, key: &str) -> String {
    let graph = unescape_until(text, None);
    graph
        .split_once(key)
        .map(|(_, rest)| unescape_until(rest, Some(':')))
        .unwrap_or_default()
}

fn unescape_until(text: &str, separator: Option<char>) -> String {
    let mut out = String::new();
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.extend(chars.next()),
            c if Some(c) == separator => break,
            c => out.push(c),
        }
    }
    out
}

impl ProcessRunner for FakeMediaTools {
    fn execute(&self, command: &CommandLine, options: &RunOptions) -> CoreResult<StageResult> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(command.clone());
        }
        if options.dry_run {
            return Ok(StageResult::synthetic_success());
        }
        if let Ok(failures) = self.failures.lock() {
            if let Some((_, code, stderr)) = failures.iter().find(|(p, _, _)| command.contains(p)) {
                return Ok(result(*code, "", stderr));
            }
        }

        let program = Path::new(&command.program)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match program.as_str() {
            "ffprobe" => self.ffprobe(command),
            "ffmpeg" => self.ffmpeg(command),
            "SvtAv1EncApp" => self.transcode(command, command.value_of("-i"), command.value_of("--output")),
            "vmaf" => {
                let Some(out) = command.value_of("--output") else {
                    return Ok(result(1, "", "missing --output"));
                };
                std::fs::write(out, self.vmaf_json())?;
                Ok(result(0, "", ""))
            }
            _ => Err(not_found(&command.program)),
        }
    }
}
