//! Implementation of the 'run' subcommand.
//!
//! Translates the flags into a sweep definition and a `CoreConfig`, runs the
//! batch through `rdsweep-core` and writes the result table.

use crate::cli::RunArgs;
use crate::error::{CliErrorContext, CliResult};
use crate::progress::SweepProgress;

use rdsweep_core::external::SystemProcessRunner;
use rdsweep_core::{
    AxisValues, BatchSummary, CleanupLevel, CodecRegistry, Configuration, ConfigurationSpaceBuilder,
    CoreConfig, CoreConfigBuilder, CoreError, EventDispatcher, ExperimentOrchestrator, FailurePolicy, Resolution,
    VmafBackend, format_duration,
};

use log::{info, warn};
use owo_colors::OwoColorize;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// How a finished run went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Complete,
    /// Rows were written but some configurations were skipped
    Partial,
}

/// Builds the core configuration from the flags.
pub fn core_config(args: &RunArgs) -> CliResult<CoreConfig> {
    let reference_resolution = args
        .ref_resolution
        .as_deref()
        .map(str::parse::<Resolution>)
        .transpose()?;
    let cleanup = if args.no_cleanup {
        CleanupLevel::Keep
    } else if args.full_cleanup {
        CleanupLevel::All
    } else {
        CleanupLevel::Intermediates
    };
    let failure_policy = if args.skip_failures {
        FailurePolicy::Skip
    } else {
        FailurePolicy::Abort
    };

    let config = CoreConfigBuilder::new()
        .tmp_dir(args.tmp_dir.clone())
        .label(args.label.clone())
        .reference_resolution(reference_resolution)
        .reference_pix_fmt(args.pix_fmt.clone())
        .gop_length((args.gop_length > 0).then_some(args.gop_length))
        .cleanup(cleanup)
        .failure_policy(failure_policy)
        .jobs(args.jobs as usize)
        .command_timeout(args.timeout.map(Duration::from_secs))
        .capture_perf(args.perf)
        .vmaf_backend(VmafBackend::from(args.vmaf_backend))
        .vmaf_model(args.vmaf_model.clone())
        .ffmpeg_bin(args.ffmpeg.clone())
        .ffprobe_bin(args.ffprobe.clone())
        .vmaf_bin(args.vmaf.clone())
        .build();
    config.validate()?;
    Ok(config)
}

/// Expands the sweep axes into configurations.
pub fn configurations(args: &RunArgs, registry: &CodecRegistry) -> CliResult<Vec<Configuration>> {
    let axes = AxisValues {
        resolutions: args.resolutions.clone(),
        rcmodes: args.rcmodes.clone(),
        bitrates: args.bitrates.clone(),
        qualities: args.qualities.clone(),
        presets: args.presets.clone(),
        repetitions: args.repetitions,
    };
    ConfigurationSpaceBuilder::new(registry).build(&args.codecs, &axes)
}

pub fn run_sweep(args: RunArgs, show_progress: bool) -> CliResult<RunStatus> {
    let registry = CodecRegistry::default();
    let config = core_config(&args)?;
    let configurations = configurations(&args, &registry)?;

    if args.plan {
        print_plan(&args, &configurations);
        return Ok(RunStatus::Complete);
    }
    let Some(output) = args.output.as_deref() else {
        return Err(CoreError::Configuration("an output file is required".to_string()));
    };

    info!(
        "Sweep: {} configurations x {} inputs, artifacts in {}",
        configurations.len(),
        args.inputs.len(),
        config.tmp_dir.display()
    );

    let runner = SystemProcessRunner::new(config.perf_bin.clone());
    let mut events = EventDispatcher::new();
    events.add_handler(Arc::new(SweepProgress::new(show_progress)));

    let outcome = ExperimentOrchestrator::new(&runner, &config, &registry)
        .with_events(events)
        .run(&args.inputs, &configurations)?;

    outcome
        .table
        .write_to_path(output)
        .cli_with_context(|| format!("cannot write results to {}", output.display()))?;

    print_summary(&outcome.summary, output);
    if outcome.summary.skipped.is_empty() {
        Ok(RunStatus::Complete)
    } else {
        Ok(RunStatus::Partial)
    }
}

fn print_plan(args: &RunArgs, configurations: &[Configuration]) {
    println!(
        "{} configurations per input, {} inputs",
        configurations.len().bold(),
        args.inputs.len().bold()
    );
    for configuration in configurations {
        println!("  {configuration}");
    }
}

fn print_summary(summary: &BatchSummary, output: &Path) {
    println!();
    println!("{}", "Sweep Summary".bold());
    println!("  Inputs:         {}", summary.inputs);
    println!("  Configurations: {}", summary.configurations);
    println!("  Rows written:   {}", summary.rows_written.green());
    if !summary.skipped.is_empty() {
        println!("  Skipped:        {}", summary.skipped.len().yellow());
        for skipped in &summary.skipped {
            warn!(
                "skipped {} [{}]: {}",
                skipped.input.display(),
                skipped.configuration,
                skipped.error
            );
        }
    }
    println!("  Wall time:      {}", format_duration(summary.wall_time.as_secs_f64()));
    println!("  Results:        {}", output.display());
}
