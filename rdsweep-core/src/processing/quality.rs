// ============================================================================
// rdsweep-core/src/processing/quality.rs
// ============================================================================
//
// QUALITY MEASUREMENT: PSNR, SSIM and VMAF of a Decoded Artifact
//
// A decoded artifact is first rescaled to the reference resolution and pixel
// format and re-probed; scores are only computed once both sides are
// directly comparable. PSNR and SSIM come from the ffmpeg filters' stats
// files, VMAF from either the libvmaf filter or the standalone scorer. Both
// VMAF backends write the same JSON report and go through the same parser.
//
// KEY COMPONENTS:
// - QualityMeasurementStage: measure()
// - QualityReport: the three score sets plus the rescaled artifact path
// - libvmaf detection, cached for the lifetime of the stage

use crate::config::{CoreConfig, VmafBackend};
use crate::error::{CoreResult, metric_error, normalization_error};
use crate::external::ffmpeg_builder::comparison_command;
use crate::external::{CommandLine, FfmpegCommandBuilder, MediaProbe, ProcessRunner};
use crate::naming;
use crate::processing::metrics::{KeyValueLogParser, ScoreLogParser, VmafJsonParser};
use crate::processing::reference::{ReferenceArtifact, verify_format};
use crate::processing::stats::QualityScores;
use crate::temp_files;

use log::{debug, info, warn};
use once_cell::sync::OnceCell;

use std::path::{Path, PathBuf};

/// Scores of one decoded artifact against its reference.
#[derive(Debug, Clone)]
pub struct QualityReport {
    pub psnr: QualityScores,
    pub ssim: QualityScores,
    pub vmaf: QualityScores,
    /// Backend that produced `vmaf` (`Filter` or `Standalone`)
    pub vmaf_backend: VmafBackend,
    pub rescaled: PathBuf,
}

/// Rescales decoded artifacts and computes their quality scores.
pub struct QualityMeasurementStage<'a, R: ProcessRunner + ?Sized> {
    runner: &'a R,
    config: &'a CoreConfig,
    libvmaf: OnceCell<bool>,
}

impl<'a, R: ProcessRunner + ?Sized> QualityMeasurementStage<'a, R> {
    pub fn new(runner: &'a R, config: &'a CoreConfig) -> Self {
        Self {
            runner,
            config,
            libvmaf: OnceCell::new(),
        }
    }

    /// Path the rescaled copy of `decoded` is written to.
    #[must_use]
    pub fn rescaled_path(decoded: &Path, reference: &ReferenceArtifact) -> PathBuf {
        let mut name = decoded.as_os_str().to_owned();
        name.push(naming::rescaled_suffix(reference.resolution));
        PathBuf::from(name)
    }

    /// Rescales `decoded` and measures it against `reference`.
    ///
    /// The rescaled artifact is returned in the report even though it is
    /// only an intermediate, so the caller can apply its cleanup policy. If
    /// measuring fails after the rescale, the file is left for the caller's
    /// cleanup as well.
    pub fn measure(&self, decoded: &Path, reference: &ReferenceArtifact) -> CoreResult<QualityReport> {
        let rescaled = self.rescale(decoded, reference)?;

        let psnr = self.filter_metric(&rescaled, reference, &KeyValueLogParser::psnr())?;
        let ssim = self.filter_metric(&rescaled, reference, &KeyValueLogParser::ssim())?;
        let (vmaf, vmaf_backend) = self.vmaf(&rescaled, reference)?;

        if let Some(y) = psnr.channel("y") {
            debug!("PSNR-Y mean {:.3} over {} frames", y.mean, y.frames);
        }
        Ok(QualityReport {
            psnr,
            ssim,
            vmaf,
            vmaf_backend,
            rescaled,
        })
    }

    fn probe(&self) -> MediaProbe<'a, R> {
        MediaProbe::new(self.runner, &self.config.ffprobe_bin, self.config.run_options())
    }

    fn rescale(&self, decoded: &Path, reference: &ReferenceArtifact) -> CoreResult<PathBuf> {
        let output = Self::rescaled_path(decoded, reference);
        let mut cmd = FfmpegCommandBuilder::new(&self.config.ffmpeg_bin)
            .with_quiet(true)
            .build();
        cmd.arg("-i").path(decoded);
        cmd.args(["-pix_fmt", reference.pix_fmt.as_str()]);
        cmd.args(["-s", &reference.resolution.to_string()]);
        cmd.path(&output);

        let result = self.runner.execute(&cmd, &self.config.run_options())?;
        if !result.success() {
            return Err(normalization_error(
                decoded,
                format!("rescale exited with code {}: {}", result.exit_code, result.stderr.trim()),
            ));
        }
        verify_format(&self.probe(), &output, reference.resolution, &reference.pix_fmt)?;
        Ok(output)
    }

    /// PSNR or SSIM through the ffmpeg filter of the same name.
    fn filter_metric(
        &self,
        distorted: &Path,
        reference: &ReferenceArtifact,
        parser: &KeyValueLogParser,
    ) -> CoreResult<QualityScores> {
        let metric = parser.metric();
        let log = temp_files::create_temp_file(&self.config.tmp_dir, metric, "log")?;
        let filter = format!("{metric}=stats_file={}", escape_filter_value(log.path()));
        let cmd = comparison_command(
            &self.config.ffmpeg_bin,
            distorted,
            &reference.path,
            "-filter_complex",
            &filter,
        );
        self.run_metric(metric, &cmd)?;
        let text = std::fs::read_to_string(log.path())?;
        parser.parse(&text)
    }

    fn vmaf(
        &self,
        distorted: &Path,
        reference: &ReferenceArtifact,
    ) -> CoreResult<(QualityScores, VmafBackend)> {
        let backend = self.vmaf_backend();
        let report = temp_files::create_temp_file(&self.config.tmp_dir, "vmaf", "json")?;
        let cmd = match backend {
            VmafBackend::Standalone => {
                let mut cmd = CommandLine::new(&self.config.vmaf_bin);
                cmd.arg("--reference").path(&reference.path);
                cmd.arg("--distorted").path(distorted);
                if let Some(model) = &self.config.vmaf_model {
                    cmd.args(["--model", &format!("path={model}")]);
                }
                cmd.arg("--json");
                cmd.arg("--output").path(report.path());
                cmd
            }
            _ => {
                let mut filter = String::from("libvmaf=");
                if let Some(model) = &self.config.vmaf_model {
                    filter.push_str(&format!("model=path={}:", escape_filter_value(Path::new(model))));
                }
                filter.push_str(&format!(
                    "log_fmt=json:log_path={}",
                    escape_filter_value(report.path())
                ));
                comparison_command(&self.config.ffmpeg_bin, distorted, &reference.path, "-lavfi", &filter)
            }
        };
        debug!("VMAF backend: {}", backend);
        self.run_metric("vmaf", &cmd)?;
        let text = std::fs::read_to_string(report.path())?;
        Ok((VmafJsonParser.parse(&text)?, backend))
    }

    fn run_metric(&self, metric: &str, cmd: &CommandLine) -> CoreResult<()> {
        let result = self.runner.execute(cmd, &self.config.run_options())?;
        if !result.success() {
            return Err(metric_error(
                metric,
                format!("'{}' exited with code {}: {}", cmd, result.exit_code, result.stderr.trim()),
            ));
        }
        Ok(())
    }

    /// Backend VMAF is computed with; `Auto` resolves through
    /// [`Self::libvmaf_available`].
    pub fn vmaf_backend(&self) -> VmafBackend {
        match self.config.vmaf_backend {
            VmafBackend::Auto if self.libvmaf_available() => VmafBackend::Filter,
            VmafBackend::Auto => VmafBackend::Standalone,
            explicit => explicit,
        }
    }

    /// Whether ffmpeg advertises the libvmaf filter. Queried once.
    pub fn libvmaf_available(&self) -> bool {
        *self.libvmaf.get_or_init(|| {
            let mut cmd = FfmpegCommandBuilder::new(&self.config.ffmpeg_bin)
                .with_overwrite(false)
                .build();
            cmd.arg("-filters");
            let available = match self.runner.execute(&cmd, &self.config.run_options()) {
                Ok(result) if result.success() => result
                    .stdout
                    .lines()
                    .any(|line| line.split_whitespace().nth(1) == Some("libvmaf")),
                Ok(result) => {
                    warn!("'{}' exited with code {}", cmd, result.exit_code);
                    false
                }
                Err(e) => {
                    warn!("Could not list ffmpeg filters: {}", e);
                    false
                }
            };
            info!(
                "libvmaf filter {}; VMAF via {}",
                if available { "available" } else { "not available" },
                if available { "ffmpeg" } else { self.config.vmaf_bin.as_str() }
            );
            available
        })
    }
}

/// Escapes a path embedded as a filter option value inside a filtergraph.
///
/// ffmpeg unescapes twice: once when splitting the graph description
/// (`\\ ' [ ] , ;`) and once when splitting the filter's options
/// (`\\ ' :`). The option level is applied first, then the graph level.
fn escape_filter_value(path: &Path) -> String {
    let option_level = escape_chars(&path.to_string_lossy(), &['\\', ':', '\'']);
    escape_chars(&option_level, &['\\', '\'', '[', ']', ',', ';'])
}

fn escape_chars(value: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreConfigBuilder;
    use crate::error::CoreError;
    use crate::external::mocks::FakeMediaTools;
    use crate::media::{FrameRate, Resolution};

    struct Fixture {
        _dir: tempfile::TempDir,
        config: CoreConfig,
        reference: ReferenceArtifact,
        decoded: PathBuf,
    }

    fn fixture(tools: &FakeMediaTools, backend: VmafBackend) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let config = CoreConfigBuilder::new()
            .tmp_dir(dir.path().to_path_buf())
            .vmaf_backend(backend)
            .build();
        let reference = ReferenceArtifact {
            base: "clip.mp4".to_string(),
            path: dir.path().join("clip.mp4.ref_1280x720.y4m"),
            resolution: Resolution::new(1280, 720),
            pix_fmt: "yuv420p".to_string(),
            framerate: FrameRate { num: 30, den: 1 },
            duration_secs: 10.0,
        };
        tools
            .add_media(&reference.path, reference.resolution, "yuv420p", 10.0)
            .unwrap();
        let decoded = dir.path().join("clip.mp4.codec_x264.rcmode_cbr.mp4.y4m");
        tools
            .add_media(&decoded, Resolution::new(640, 360), "yuv420p", 10.0)
            .unwrap();
        Fixture {
            _dir: dir,
            config,
            reference,
            decoded,
        }
    }

    #[test]
    fn test_measure_with_libvmaf_filter() {
        let tools = FakeMediaTools::new();
        let f = fixture(&tools, VmafBackend::Auto);
        let stage = QualityMeasurementStage::new(&tools, &f.config);
        let report = stage.measure(&f.decoded, &f.reference).unwrap();

        assert!(report.rescaled.to_string_lossy().ends_with(".mp4.y4m.scaled.resolution_1280x720.y4m"));
        assert!(report.rescaled.exists());
        assert_eq!(report.vmaf_backend, VmafBackend::Filter);

        let psnr_y = report.psnr.channel("y").unwrap();
        assert!((psnr_y.mean - 41.5).abs() < 1e-9);
        assert_eq!(psnr_y.percentile(0), Some(40.0));
        assert_eq!(psnr_y.percentile(100), Some(43.0));
        assert!(report.ssim.channel("y").is_some());
        let vmaf = report.vmaf.channel("").unwrap();
        assert!((vmaf.mean - 91.5).abs() < 1e-9);
        assert!(vmaf.harmonic_mean.is_some());

        assert_eq!(tools.count("-filters"), 1);
        assert_eq!(tools.count("libvmaf=log_fmt=json"), 1);
    }

    #[test]
    fn test_standalone_backend_gives_same_scores() {
        let tools = FakeMediaTools::new().without_libvmaf();
        let f = fixture(&tools, VmafBackend::Auto);
        let stage = QualityMeasurementStage::new(&tools, &f.config);
        let report = stage.measure(&f.decoded, &f.reference).unwrap();
        assert_eq!(report.vmaf_backend, VmafBackend::Standalone);
        assert!((report.vmaf.channel("").unwrap().mean - 91.5).abs() < 1e-9);

        let vmaf_calls: Vec<_> = tools.calls().into_iter().filter(|c| c.program == "vmaf").collect();
        assert_eq!(vmaf_calls.len(), 1);
        assert_eq!(
            vmaf_calls[0].value_of("--reference"),
            Some(f.reference.path.to_string_lossy().as_ref())
        );
    }

    #[test]
    fn test_libvmaf_detection_is_cached() {
        let tools = FakeMediaTools::new();
        let f = fixture(&tools, VmafBackend::Auto);
        let stage = QualityMeasurementStage::new(&tools, &f.config);
        assert!(stage.libvmaf_available());
        assert!(stage.libvmaf_available());
        assert_eq!(tools.count("-filters"), 1);
    }

    #[test]
    fn test_luma_fallback_reports_average_channel() {
        let tools = FakeMediaTools::new().without_luma();
        let f = fixture(&tools, VmafBackend::Filter);
        let stage = QualityMeasurementStage::new(&tools, &f.config);
        let report = stage.measure(&f.decoded, &f.reference).unwrap();
        assert!(report.psnr.channel("y").is_none());
        assert!((report.psnr.channel("avg").unwrap().mean - 45.5).abs() < 1e-9);
        assert!(report.ssim.channel("avg").is_some());
        // explicit backend skips detection
        assert_eq!(tools.count("-filters"), 0);
    }

    #[test]
    fn test_rescale_drift_is_normalization_error() {
        let tools = FakeMediaTools::new();
        tools.drift_resolution(".scaled.", Resolution::new(1280, 718));
        let f = fixture(&tools, VmafBackend::Filter);
        let stage = QualityMeasurementStage::new(&tools, &f.config);
        assert!(matches!(
            stage.measure(&f.decoded, &f.reference),
            Err(CoreError::Normalization { .. })
        ));
        assert_eq!(tools.count("stats_file="), 0);
    }

    #[test]
    fn test_failing_metric_tool_is_metric_error() {
        let tools = FakeMediaTools::new();
        tools.fail_when("ssim=stats_file", 1, "ssim filter crashed");
        let f = fixture(&tools, VmafBackend::Filter);
        let stage = QualityMeasurementStage::new(&tools, &f.config);
        match stage.measure(&f.decoded, &f.reference).unwrap_err() {
            CoreError::Metric { metric, message } => {
                assert_eq!(metric, "ssim");
                assert!(message.contains("crashed"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_escape_filter_value() {
        assert_eq!(escape_filter_value(Path::new("/tmp/plain.log")), "/tmp/plain.log");
        // option level `\:`, then the backslash itself is escaped for the graph
        assert_eq!(escape_filter_value(Path::new("/tmp/a:b.log")), "/tmp/a\\\\:b.log");
        assert_eq!(
            escape_filter_value(Path::new("/tmp/x,y[1];z/a.log")),
            "/tmp/x\\,y\\[1\\]\\;z/a.log"
        );
        assert_eq!(escape_filter_value(Path::new("/tmp/it's")), "/tmp/it\\\\\\'s");
    }

    #[test]
    fn test_metric_logs_in_awkward_scratch_dir() {
        let tools = FakeMediaTools::new();
        let mut f = fixture(&tools, VmafBackend::Filter);
        let awkward = f.config.tmp_dir.join("rd,sweep[a];b:c");
        std::fs::create_dir_all(&awkward).unwrap();
        f.config.tmp_dir = awkward;
        let stage = QualityMeasurementStage::new(&tools, &f.config);
        stage.measure(&f.decoded, &f.reference).unwrap();

        let filters: Vec<String> = tools
            .calls()
            .iter()
            .filter_map(|c| c.value_of("-filter_complex").or_else(|| c.value_of("-lavfi")).map(str::to_string))
            .collect();
        assert_eq!(filters.len(), 3);
        for filter in filters {
            assert!(filter.contains("rd\\,sweep\\[a\\]\\;b\\\\:c"), "{filter}");
        }
    }
}
