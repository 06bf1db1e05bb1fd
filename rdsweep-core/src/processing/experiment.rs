// ============================================================================
// rdsweep-core/src/processing/experiment.rs
// ============================================================================
//
// EXPERIMENT ORCHESTRATION: Batch Driver over Inputs × Configurations
//
// For every input the orchestrator probes and normalizes a reference once,
// then runs each configuration through encode → decode → measure, turns the
// outcome into a result row and applies the cleanup policy. Failures are
// handled per `FailurePolicy`: abort the batch, or skip the configuration
// and keep going.
//
// Per-input phases: Probing → Normalizing → Sweeping → Done. Configuration
// and software checks run before any media tool is invoked on an input.
//
// With `jobs > 1` the configurations of one input run on a rayon pool. The
// reference is created before they are dispatched and only read afterwards;
// artifact names are distinct per configuration, and rows are appended in
// configuration order once all tasks of the input are done.

use crate::codecs::{CodecRegistry, EncoderKind};
use crate::config::{CleanupLevel, CoreConfig, FailurePolicy, VmafBackend};
use crate::error::{CoreError, CoreResult};
use crate::events::{Event, EventDispatcher};
use crate::external::{MediaProbe, ProcessRunner, StageResult, check_dependency};
use crate::naming::Stage;
use crate::processing::encode::EncodeDecodeStage;
use crate::processing::quality::{QualityMeasurementStage, QualityReport};
use crate::processing::reference::{ReferenceArtifact, ReferenceNormalizer};
use crate::reporting::{Cell, ResultRow, ResultTable};
use crate::sweep::Configuration;
use crate::utils;

use log::{debug, error, info, warn};
use rayon::prelude::*;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// A configuration that failed under `FailurePolicy::Skip`.
#[derive(Debug, Clone)]
pub struct SkippedConfiguration {
    pub input: PathBuf,
    pub configuration: Configuration,
    pub error: String,
}

/// Counters of a finished batch.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub inputs: usize,
    pub configurations: usize,
    pub rows_written: usize,
    pub skipped: Vec<SkippedConfiguration>,
    pub wall_time: Duration,
}

/// Result of a batch: the table plus its summary.
#[derive(Debug, Clone)]
pub struct ExperimentOutcome {
    pub table: ResultTable,
    pub summary: BatchSummary,
}

/// Drives a batch of inputs through every configuration.
pub struct ExperimentOrchestrator<'a, R: ProcessRunner + ?Sized> {
    runner: &'a R,
    config: &'a CoreConfig,
    registry: &'a CodecRegistry,
    events: EventDispatcher,
}

impl<'a, R: ProcessRunner + ?Sized> ExperimentOrchestrator<'a, R> {
    pub fn new(runner: &'a R, config: &'a CoreConfig, registry: &'a CodecRegistry) -> Self {
        Self {
            runner,
            config,
            registry,
            events: EventDispatcher::new(),
        }
    }

    /// Replaces the event dispatcher.
    #[must_use]
    pub fn with_events(mut self, events: EventDispatcher) -> Self {
        self.events = events;
        self
    }

    /// Rejects batches that cannot run, before any external process starts.
    pub fn validate(&self, inputs: &[PathBuf], configurations: &[Configuration]) -> CoreResult<()> {
        self.config.validate()?;
        if inputs.is_empty() {
            return Err(CoreError::Configuration("no input files given".to_string()));
        }
        if configurations.is_empty() {
            return Err(CoreError::Configuration("the sweep is empty".to_string()));
        }
        let mut seen = HashSet::new();
        for input in inputs {
            let base = utils::base_name(input)?;
            if !seen.insert(base.clone()) {
                return Err(CoreError::Configuration(format!(
                    "two inputs share the base name '{base}'; their artifacts would collide"
                )));
            }
        }
        let mut distinct = HashSet::new();
        for configuration in configurations {
            if self.registry.get(&configuration.codec).is_none() {
                return Err(CoreError::Configuration(format!(
                    "unknown codec '{}'",
                    configuration.codec
                )));
            }
            // equal configurations would write the same artifacts
            if !distinct.insert(configuration) {
                return Err(CoreError::Configuration(format!(
                    "configuration [{configuration}] is listed twice"
                )));
            }
        }
        Ok(())
    }

    /// Verifies that every tool the batch needs can be started.
    ///
    /// An `Auto` VMAF backend is resolved here through `quality`, so a batch
    /// that needs the standalone scorer fails before the first encode.
    pub fn check_software(
        &self,
        configurations: &[Configuration],
        quality: &QualityMeasurementStage<'_, R>,
    ) -> CoreResult<()> {
        check_dependency(self.runner, &self.config.ffmpeg_bin)?;
        check_dependency(self.runner, &self.config.ffprobe_bin)?;

        let mut binaries: Vec<&str> = Vec::new();
        for configuration in configurations {
            if let Some(descriptor) = self.registry.get(&configuration.codec) {
                if let (EncoderKind::SvtAv1App, Some(binary)) = (&descriptor.encoder, descriptor.binary) {
                    if !binaries.contains(&binary) {
                        binaries.push(binary);
                    }
                }
            }
        }
        for binary in binaries {
            check_dependency(self.runner, binary)?;
        }
        if quality.vmaf_backend() == VmafBackend::Standalone {
            check_dependency(self.runner, &self.config.vmaf_bin)?;
        }
        Ok(())
    }

    /// Runs the batch and returns its table.
    ///
    /// Under `FailurePolicy::Abort` the first failing configuration stops
    /// the batch and its error is returned; no table is produced.
    pub fn run(&self, inputs: &[PathBuf], configurations: &[Configuration]) -> CoreResult<ExperimentOutcome> {
        let start = Instant::now();
        self.validate(inputs, configurations)?;
        let quality = QualityMeasurementStage::new(self.runner, self.config);
        self.check_software(configurations, &quality)?;
        std::fs::create_dir_all(&self.config.tmp_dir)?;

        info!(
            "Running {} configurations on {} inputs",
            configurations.len(),
            inputs.len()
        );
        self.events.emit(Event::BatchStarted {
            inputs: inputs.len(),
            configurations: configurations.len() * inputs.len(),
        });

        let encoder = EncodeDecodeStage::new(self.runner, self.config, self.registry);
        let pool = if self.config.jobs > 1 {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(self.config.jobs)
                    .build()
                    .map_err(|e| CoreError::Configuration(format!("cannot start {} workers: {e}", self.config.jobs)))?,
            )
        } else {
            None
        };

        let mut table = ResultTable::new();
        let mut summary = BatchSummary {
            inputs: inputs.len(),
            configurations: configurations.len() * inputs.len(),
            ..Default::default()
        };

        for input in inputs {
            let reference = self.prepare_reference(input)?;
            debug!("{}: sweeping {} configurations", input.display(), configurations.len());

            let abort = AtomicBool::new(false);
            let task = |configuration: &Configuration| -> Option<CoreResult<ResultRow>> {
                if abort.load(Ordering::SeqCst) {
                    return None;
                }
                let result = self.run_configuration(&encoder, &quality, &reference, configuration);
                self.events.emit(Event::ConfigurationFinished {
                    input: input.clone(),
                    configuration: configuration.to_string(),
                    succeeded: result.is_ok(),
                });
                if result.is_err() && self.config.failure_policy == FailurePolicy::Abort {
                    abort.store(true, Ordering::SeqCst);
                }
                Some(result)
            };
            let results: Vec<Option<CoreResult<ResultRow>>> = match &pool {
                Some(pool) => pool.install(|| configurations.par_iter().map(task).collect()),
                None => configurations.iter().map(task).collect(),
            };

            for (configuration, result) in configurations.iter().zip(results) {
                match result {
                    Some(Ok(row)) => table.push(row),
                    Some(Err(e)) => {
                        error!("{} [{}] failed: {}", input.display(), configuration, e);
                        if self.config.failure_policy == FailurePolicy::Abort {
                            return Err(e);
                        }
                        summary.skipped.push(SkippedConfiguration {
                            input: input.clone(),
                            configuration: configuration.clone(),
                            error: e.to_string(),
                        });
                    }
                    None => {}
                }
            }
            self.events.emit(Event::InputDone { input: input.clone() });
        }

        summary.rows_written = table.len();
        summary.wall_time = start.elapsed();
        self.events.emit(Event::BatchFinished {
            rows: summary.rows_written,
            skipped: summary.skipped.len(),
            elapsed: summary.wall_time,
        });
        info!(
            "Batch finished: {} rows, {} skipped, {}",
            summary.rows_written,
            summary.skipped.len(),
            utils::format_duration(summary.wall_time.as_secs_f64())
        );
        Ok(ExperimentOutcome { table, summary })
    }

    fn prepare_reference(&self, input: &Path) -> CoreResult<ReferenceArtifact> {
        self.events.emit(Event::InputProbing {
            input: input.to_path_buf(),
        });
        if !input.is_file() {
            return Err(CoreError::PathError(format!("input {} is not a file", input.display())));
        }
        self.events.emit(Event::InputNormalizing {
            input: input.to_path_buf(),
            resolution: self.config.reference_resolution,
        });
        let normalizer = ReferenceNormalizer::new(self.runner, self.config);
        let reference = normalizer.normalize(
            input,
            self.config.reference_resolution,
            &self.config.reference_pix_fmt,
        )?;
        self.events.emit(Event::ReferenceReady {
            input: input.to_path_buf(),
            reference: reference.path.clone(),
            resolution: reference.resolution,
        });
        Ok(reference)
    }

    /// Runs one configuration and cleans up after it, also on failure.
    fn run_configuration(
        &self,
        encoder: &EncodeDecodeStage<'_, R>,
        quality: &QualityMeasurementStage<'_, R>,
        reference: &ReferenceArtifact,
        configuration: &Configuration,
    ) -> CoreResult<ResultRow> {
        let result = self.measure_configuration(encoder, quality, reference, configuration);
        self.cleanup(encoder, reference, configuration);
        result
    }

    fn measure_configuration(
        &self,
        encoder: &EncodeDecodeStage<'_, R>,
        quality: &QualityMeasurementStage<'_, R>,
        reference: &ReferenceArtifact,
        configuration: &Configuration,
    ) -> CoreResult<ResultRow> {
        let (encoded, stats) = encoder.encode(reference, configuration)?;
        let decoded = encoder.decode(reference, configuration, &encoded)?;
        let report = quality.measure(&decoded, reference)?;

        let probe = MediaProbe::new(self.runner, &self.config.ffprobe_bin, self.config.run_options());
        let duration = probe.duration(&encoded)?;
        let encoded_size = std::fs::metadata(&encoded)?.len();
        let actual_bitrate = utils::bitrate_kbps(encoded_size, duration);
        debug!(
            "{}: {} over {:.3}s = {:.1} kbps",
            encoded.display(),
            utils::format_bytes(encoded_size),
            duration,
            actual_bitrate
        );

        Ok(self.build_row(reference, configuration, &stats, &report, actual_bitrate, encoded_size))
    }

    fn build_row(
        &self,
        reference: &ReferenceArtifact,
        configuration: &Configuration,
        stats: &StageResult,
        report: &QualityReport,
        actual_bitrate: f64,
        encoded_size: u64,
    ) -> ResultRow {
        let mut columns = vec![(
            "encode_time".to_string(),
            Cell::Number(stats.duration.as_secs_f64()),
        )];
        if let Some(perf) = stats.perf {
            columns.push(("encode_user_time".to_string(), Cell::Number(perf.user_time_secs)));
            columns.push(("encode_instructions".to_string(), Cell::Integer(perf.instructions)));
            columns.push(("encode_cycles".to_string(), Cell::Integer(perf.cycles)));
        }
        for (metric, scores) in [("psnr", &report.psnr), ("ssim", &report.ssim), ("vmaf", &report.vmaf)] {
            columns.extend(scores.columns(metric).into_iter().map(|(k, v)| (k, Cell::Number(v))));
        }
        columns.push((
            "vmaf_backend".to_string(),
            Cell::Text(report.vmaf_backend.to_string()),
        ));

        let parameters = self
            .registry
            .get(&configuration.codec)
            .map(|d| d.parameters_string())
            .unwrap_or_default();

        ResultRow {
            infile: reference.base.clone(),
            label: self.config.label.clone(),
            codec: configuration.codec.clone(),
            resolution: configuration.resolution.unwrap_or(reference.resolution),
            framerate: reference.framerate,
            rcmode: configuration.rate.mode().to_string(),
            quality: configuration.rate.quality(),
            bitrate: configuration.rate.bitrate(),
            preset: configuration.preset.clone(),
            run: configuration.run,
            gop_length: self.config.gop_length,
            actual_bitrate,
            encoded_size,
            columns,
            parameters,
        }
    }

    /// Deletes the artifacts of `configuration` the cleanup level covers.
    fn cleanup(
        &self,
        encoder: &EncodeDecodeStage<'_, R>,
        reference: &ReferenceArtifact,
        configuration: &Configuration,
    ) {
        let stages: &[Stage] = match self.config.cleanup {
            CleanupLevel::Keep => return,
            CleanupLevel::Intermediates => &[Stage::Decoded, Stage::Rescaled { target: reference.resolution }],
            CleanupLevel::All => &[
                Stage::Decoded,
                Stage::Rescaled { target: reference.resolution },
                Stage::Encoded,
            ],
        };
        for stage in stages {
            let Ok(path) = encoder.artifact_path(reference, configuration, *stage) else {
                continue;
            };
            if path == reference.path || !path.exists() {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => debug!("Removed {}", path.display()),
                Err(e) => warn!("Could not remove {}: {}", path.display(), e),
            }
        }
    }
}
