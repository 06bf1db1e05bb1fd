// ============================================================================
// rdsweep-core/src/processing/encode.rs
// ============================================================================
//
// ENCODE/DECODE STAGE: Encoder Invocation and Raw Reconstruction
//
// This module turns one configuration into an encoder command line, runs it
// against the normalized reference and decodes the result back to a raw y4m
// artifact. Two argument dialects are supported: ffmpeg encoders and the
// standalone SVT-AV1 application.
//
// KEY COMPONENTS:
// - EncodeDecodeStage: encode() / decode()
// - encode_command(): the pure command-line construction, also used to
//   print sweep plans

use crate::codecs::{CodecDescriptor, CodecRegistry, EncoderKind};
use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult, decode_failed, encode_failed};
use crate::external::{CommandLine, FfmpegCommandBuilder, ProcessRunner, StageResult};
use crate::naming::{self, Stage};
use crate::processing::reference::ReferenceArtifact;
use crate::sweep::{Configuration, RateControl};

use log::{debug, info};

use std::path::{Path, PathBuf};

/// Builds the encoder command for `configuration`.
///
/// `output` is the encoded artifact path; the reference is the encoder
/// input. A configuration without a resolution encodes at the reference
/// resolution.
pub fn encode_command(
    config: &CoreConfig,
    descriptor: &CodecDescriptor,
    reference: &ReferenceArtifact,
    configuration: &Configuration,
    output: &Path,
) -> CommandLine {
    match descriptor.encoder {
        EncoderKind::SvtAv1App => {
            let mut cmd = CommandLine::new(descriptor.binary.unwrap_or("SvtAv1EncApp"));
            cmd.arg("-i").path(&reference.path);
            match configuration.rate {
                // random-access prediction only supports VBR
                RateControl::Bitrate(kbps) => {
                    cmd.args(["--rc", "1", "--tbr", &kbps.to_string()]);
                }
                RateControl::Quality(q) => {
                    cmd.args(["--rc", "0", "--crf", &q.to_string()]);
                }
            }
            if let (Some(axis), Some(preset)) = (&descriptor.preset, &configuration.preset) {
                cmd.args([format!("--{}", axis.flag), preset.clone()]);
            }
            cmd.args(["--lp", "0", "--pred-struct", "2"]);
            if let Some(gop) = config.gop_length {
                cmd.args(["--keyint", &gop.to_string()]);
            }
            cmd.arg("--output").path(output);
            cmd
        }
        EncoderKind::Ffmpeg { codec } => {
            let program: &str = match descriptor.binary {
                Some(binary) => binary,
                None => &config.ffmpeg_bin,
            };
            let mut cmd = FfmpegCommandBuilder::new(program).build();
            cmd.arg("-i").path(&reference.path);
            cmd.args(["-c:v", codec]);
            match configuration.rate {
                RateControl::Bitrate(kbps) => {
                    cmd.args(["-b:v".to_string(), format!("{kbps}k")]);
                }
                RateControl::Quality(q) => {
                    cmd.args([descriptor.quality_flag.to_string(), q.to_string()]);
                }
            }
            if descriptor.disable_bframes {
                cmd.args(["-bf", "0"]);
            }
            if let (Some(axis), Some(preset)) = (&descriptor.preset, &configuration.preset) {
                cmd.args([format!("-{}", axis.flag), preset.clone()]);
            }
            let resolution = configuration.resolution.unwrap_or(reference.resolution);
            cmd.args(["-s", &resolution.to_string()]);
            if let Some(gop) = config.gop_length {
                cmd.args(["-g", &gop.to_string()]);
            }
            for (key, value) in descriptor.parameters {
                cmd.args([format!("-{key}"), value.to_string()]);
            }
            if descriptor.experimental {
                cmd.args(["-strict", "experimental"]);
            }
            cmd.args(["-c:a", "copy"]);
            cmd.path(output);
            cmd
        }
    }
}

/// Runs encoders and decoders for single configurations.
pub struct EncodeDecodeStage<'a, R: ProcessRunner + ?Sized> {
    runner: &'a R,
    config: &'a CoreConfig,
    registry: &'a CodecRegistry,
}

impl<'a, R: ProcessRunner + ?Sized> EncodeDecodeStage<'a, R> {
    pub fn new(runner: &'a R, config: &'a CoreConfig, registry: &'a CodecRegistry) -> Self {
        Self {
            runner,
            config,
            registry,
        }
    }

    fn descriptor(&self, configuration: &Configuration) -> CoreResult<&'a CodecDescriptor> {
        self.registry.get(&configuration.codec).ok_or_else(|| {
            CoreError::Configuration(format!("unknown codec '{}'", configuration.codec))
        })
    }

    /// Path of the artifact of `configuration` at `stage`.
    pub fn artifact_path(
        &self,
        reference: &ReferenceArtifact,
        configuration: &Configuration,
        stage: Stage,
    ) -> CoreResult<PathBuf> {
        let descriptor = self.descriptor(configuration)?;
        Ok(self
            .config
            .tmp_dir
            .join(naming::name_for(&reference.base, configuration, descriptor, stage)))
    }

    /// Encodes the reference; returns the encoded path and the encoder's
    /// result (duration, perf counters).
    pub fn encode(
        &self,
        reference: &ReferenceArtifact,
        configuration: &Configuration,
    ) -> CoreResult<(PathBuf, StageResult)> {
        let descriptor = self.descriptor(configuration)?;
        let output = self.artifact_path(reference, configuration, Stage::Encoded)?;
        let cmd = encode_command(self.config, descriptor, reference, configuration, &output);

        info!("Encoding {} [{}]", reference.base, configuration);
        let options = self.config.run_options().with_perf(self.config.capture_perf);
        let result = self.runner.execute(&cmd, &options)?;
        if !result.success() {
            return Err(encode_failed(&cmd, &result));
        }
        debug!(
            "Encoded {} in {:.2}s",
            output.display(),
            result.duration.as_secs_f64()
        );
        Ok((output, result))
    }

    /// Decodes `encoded` to a raw y4m artifact.
    pub fn decode(
        &self,
        reference: &ReferenceArtifact,
        configuration: &Configuration,
        encoded: &Path,
    ) -> CoreResult<PathBuf> {
        let output = self.artifact_path(reference, configuration, Stage::Decoded)?;
        let mut cmd = FfmpegCommandBuilder::new(&self.config.ffmpeg_bin).build();
        cmd.arg("-i").path(encoded);
        cmd.path(&output);

        let result = self.runner.execute(&cmd, &self.config.run_options())?;
        if !result.success() {
            return Err(decode_failed(&cmd, &result));
        }
        debug!("Decoded {}", output.display());
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreConfigBuilder;
    use crate::external::mocks::FakeMediaTools;
    use crate::media::{FrameRate, Resolution};

    fn reference(dir: &Path) -> ReferenceArtifact {
        ReferenceArtifact {
            base: "clip.mp4".to_string(),
            path: dir.join("clip.mp4.ref_1280x720.y4m"),
            resolution: Resolution::new(1280, 720),
            pix_fmt: "yuv420p".to_string(),
            framerate: FrameRate { num: 30, den: 1 },
            duration_secs: 10.0,
        }
    }

    fn configuration(codec: &str, rate: RateControl, preset: Option<&str>) -> Configuration {
        Configuration {
            codec: codec.to_string(),
            resolution: Some(Resolution::new(640, 360)),
            rate,
            preset: preset.map(str::to_string),
            run: 0,
        }
    }

    #[test]
    fn test_x264_cbr_command() {
        let config = CoreConfig::default();
        let registry = CodecRegistry::default();
        let reference = reference(Path::new("/tmp"));
        let cmd = encode_command(
            &config,
            registry.get("x264").unwrap(),
            &reference,
            &configuration("x264", RateControl::Bitrate(560), Some("medium")),
            Path::new("/tmp/out.mp4"),
        );
        assert_eq!(
            cmd.to_string(),
            "ffmpeg -hide_banner -y -i /tmp/clip.mp4.ref_1280x720.y4m -c:v libx264 -b:v 560k \
             -bf 0 -preset medium -s 640x360 -g 600 -c:a copy /tmp/out.mp4"
        );
    }

    #[test]
    fn test_codec_specific_flags() {
        let config = CoreConfigBuilder::new().gop_length(None).build();
        let registry = CodecRegistry::default();
        let reference = reference(Path::new("/tmp"));
        let out = Path::new("/tmp/out");

        let vp9 = encode_command(
            &config,
            registry.get("vp9").unwrap(),
            &reference,
            &configuration("vp9", RateControl::Quality(40), Some("4")),
            out,
        );
        assert_eq!(vp9.value_of("-crf"), Some("40"));
        assert_eq!(vp9.value_of("-cpu-used"), Some("4"));
        assert_eq!(vp9.value_of("-qmax"), Some("56"));
        assert_eq!(vp9.value_of("-g"), None);
        assert!(!vp9.args.contains(&"-bf".to_string()));

        let mjpeg = encode_command(
            &config,
            registry.get("mjpeg").unwrap(),
            &reference,
            &configuration("mjpeg", RateControl::Quality(5), None),
            out,
        );
        assert_eq!(mjpeg.value_of("-q:v"), Some("5"));

        let aom = encode_command(
            &config,
            registry.get("libaom-av1").unwrap(),
            &reference,
            &configuration("libaom-av1", RateControl::Bitrate(300), Some("6")),
            out,
        );
        assert_eq!(aom.value_of("-strict"), Some("experimental"));
    }

    #[test]
    fn test_svt_app_dialect() {
        let config = CoreConfig::default();
        let registry = CodecRegistry::default();
        let reference = reference(Path::new("/tmp"));
        let mut raw = configuration("libsvtav1-raw", RateControl::Bitrate(1000), Some("10"));
        raw.resolution = None;
        let cmd = encode_command(
            &config,
            registry.get("libsvtav1-raw").unwrap(),
            &reference,
            &raw,
            Path::new("/tmp/out.ivf"),
        );
        assert_eq!(
            cmd.to_string(),
            "SvtAv1EncApp -i /tmp/clip.mp4.ref_1280x720.y4m --rc 1 --tbr 1000 --preset 10 \
             --lp 0 --pred-struct 2 --keyint 600 --output /tmp/out.ivf"
        );
    }

    #[test]
    fn test_source_resolution_uses_reference() {
        let config = CoreConfig::default();
        let registry = CodecRegistry::default();
        let reference = reference(Path::new("/tmp"));
        let mut cfg = configuration("x265", RateControl::Quality(28), Some("fast"));
        cfg.resolution = None;
        let cmd = encode_command(&config, registry.get("x265").unwrap(), &reference, &cfg, Path::new("o"));
        assert_eq!(cmd.value_of("-s"), Some("1280x720"));
    }

    #[test]
    fn test_encode_and_decode_produce_named_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let config = CoreConfigBuilder::new().tmp_dir(dir.path().to_path_buf()).build();
        let registry = CodecRegistry::default();
        let tools = FakeMediaTools::new();
        let reference = reference(dir.path());
        tools
            .add_media(&reference.path, reference.resolution, "yuv420p", 10.0)
            .unwrap();

        let stage = EncodeDecodeStage::new(&tools, &config, &registry);
        let cfg = configuration("x264", RateControl::Bitrate(560), Some("medium"));
        let (encoded, result) = stage.encode(&reference, &cfg).unwrap();
        assert!(result.success());
        assert_eq!(
            encoded.file_name().unwrap().to_string_lossy(),
            "clip.mp4.codec_x264.resolution_640x360.bitrate_560.preset_medium.rcmode_cbr.mp4"
        );
        assert_eq!(std::fs::metadata(&encoded).unwrap().len(), 700_000);

        let decoded = stage.decode(&reference, &cfg, &encoded).unwrap();
        assert!(decoded.to_string_lossy().ends_with(".mp4.y4m"));
        assert!(decoded.exists());
    }

    #[test]
    fn test_encoder_failure_carries_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let config = CoreConfigBuilder::new().tmp_dir(dir.path().to_path_buf()).build();
        let registry = CodecRegistry::default();
        let tools = FakeMediaTools::new();
        tools.fail_when("libx264", 1, "Unknown encoder 'libx264'");
        let reference = reference(dir.path());
        tools
            .add_media(&reference.path, reference.resolution, "yuv420p", 10.0)
            .unwrap();

        let stage = EncodeDecodeStage::new(&tools, &config, &registry);
        let cfg = configuration("x264", RateControl::Bitrate(560), Some("medium"));
        match stage.encode(&reference, &cfg).unwrap_err() {
            CoreError::Encode { exit_code, stderr, command } => {
                assert_eq!(exit_code, 1);
                assert!(stderr.contains("Unknown encoder"));
                assert!(command.contains("-c:v libx264"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
