// rdsweep-core/tests/experiment_tests.rs
//
// End-to-end batches against the fake media tools.

use rdsweep_core::config::{CleanupLevel, CoreConfigBuilder, FailurePolicy, VmafBackend};
use rdsweep_core::events::{Event, EventDispatcher, EventHandler};
use rdsweep_core::external::mocks::FakeMediaTools;
use rdsweep_core::reporting::Cell;
use rdsweep_core::{
    AxisValues, CodecRegistry, Configuration, ConfigurationSpaceBuilder, CoreConfig, CoreError,
    ExperimentOrchestrator, RateControl, Resolution,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::{TempDir, tempdir};

const ENCODED: &str = "clip.mp4.codec_x264.resolution_640x360.bitrate_560.preset_medium.rcmode_cbr.mp4";

// Registers a 1280x720, 10 second clip with the fake tools.
fn setup(tools: &FakeMediaTools) -> (TempDir, PathBuf) {
    let dir = tempdir().expect("tempdir");
    let input = dir.path().join("clip.mp4");
    tools
        .add_media(&input, Resolution::new(1280, 720), "yuv420p", 10.0)
        .expect("fake input");
    (dir, input)
}

fn config_in(dir: &Path) -> CoreConfigBuilder {
    CoreConfigBuilder::new()
        .tmp_dir(dir.join("work"))
        .label("unit")
}

fn x264(bitrate: u32) -> Configuration {
    Configuration {
        codec: "x264".to_string(),
        resolution: Some(Resolution::new(640, 360)),
        rate: RateControl::Bitrate(bitrate),
        preset: Some("medium".to_string()),
        run: 0,
    }
}

fn number(cell: Option<&Cell>) -> f64 {
    match cell {
        Some(Cell::Number(v)) => *v,
        other => panic!("expected a number, got {other:?}"),
    }
}

#[derive(Default)]
struct Recorder(Mutex<Vec<Event>>);

impl EventHandler for Recorder {
    fn handle(&self, event: &Event) {
        self.0.lock().unwrap().push(event.clone());
    }
}

#[test]
fn test_single_configuration_produces_one_row() -> Result<(), Box<dyn std::error::Error>> {
    let tools = FakeMediaTools::new();
    let (dir, input) = setup(&tools);
    let config = config_in(dir.path()).build();
    let registry = CodecRegistry::default();

    let outcome = ExperimentOrchestrator::new(&tools, &config, &registry).run(&[input], &[x264(560)])?;

    assert_eq!(outcome.table.len(), 1);
    assert_eq!(outcome.summary.rows_written, 1);
    assert!(outcome.summary.skipped.is_empty());

    let row = &outcome.table.rows()[0];
    assert_eq!(row.infile, "clip.mp4");
    assert_eq!(row.label, "unit");
    assert_eq!(row.codec, "x264");
    assert_eq!(row.resolution, Resolution::new(640, 360));
    assert_eq!(row.rcmode, "cbr");
    assert_eq!(row.bitrate, Some(560));
    assert_eq!(row.quality, None);
    assert_eq!(row.preset.as_deref(), Some("medium"));
    assert_eq!(row.gop_length, Some(600));
    assert_eq!(row.encoded_size, 700_000);
    assert!((row.actual_bitrate - 560.0).abs() < 1e-6);

    assert!((number(row.get("psnr_y_mean")) - 41.5).abs() < 1e-9);
    assert!((number(row.get("ssim_y_mean")) - 0.965).abs() < 1e-9);
    assert!((number(row.get("vmaf_mean")) - 91.5).abs() < 1e-9);
    assert!(row.get("psnr_y_p95").is_some());
    assert!(row.get("encode_time").is_some());
    assert_eq!(row.get("vmaf_backend"), Some(&Cell::Text("filter".to_string())));

    let work = dir.path().join("work");
    assert!(work.join("clip.mp4.ref_1280x720.y4m").exists());
    assert!(work.join(ENCODED).exists());
    // intermediates removed by the default cleanup level
    assert!(!work.join(format!("{ENCODED}.y4m")).exists());
    assert!(!work.join(format!("{ENCODED}.y4m.scaled.resolution_1280x720.y4m")).exists());
    Ok(())
}

#[test]
fn test_csv_is_written_with_union_header() -> Result<(), Box<dyn std::error::Error>> {
    let tools = FakeMediaTools::new();
    let (dir, input) = setup(&tools);
    let config = config_in(dir.path()).build();
    let registry = CodecRegistry::default();

    let outcome = ExperimentOrchestrator::new(&tools, &config, &registry)
        .run(&[input], &[x264(100), x264(560)])?;
    let csv = dir.path().join("results.csv");
    outcome.table.write_to_path(&csv)?;

    let text = std::fs::read_to_string(&csv)?;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("infile,label,codec,resolution,width,height"));
    assert!(lines[0].contains(",psnr_y_mean,"));
    assert!(lines[0].ends_with(",vmaf_backend,parameters"));
    assert!(lines[1].contains(",100,medium,0,600,"));
    assert!(lines[2].contains(",560,medium,0,600,"));
    Ok(())
}

#[test]
fn test_encode_failure_aborts_batch() {
    let tools = FakeMediaTools::new();
    let (dir, input) = setup(&tools);
    tools.fail_when("libx264", 1, "x264 [error]: invalid preset");
    let config = config_in(dir.path()).build();
    let registry = CodecRegistry::default();

    let err = ExperimentOrchestrator::new(&tools, &config, &registry)
        .run(&[input], &[x264(560)])
        .unwrap_err();
    match err {
        CoreError::Encode { stderr, exit_code, .. } => {
            assert_eq!(exit_code, 1);
            assert!(stderr.contains("invalid preset"));
        }
        other => panic!("expected an encode error, got {other:?}"),
    }
    assert_eq!(tools.count("stats_file="), 0);
}

#[test]
fn test_skip_policy_records_failures_and_continues() -> Result<(), Box<dyn std::error::Error>> {
    let tools = FakeMediaTools::new();
    let (dir, input) = setup(&tools);
    tools.fail_when("bitrate_100.", 1, "encoder crashed");
    let config = config_in(dir.path()).failure_policy(FailurePolicy::Skip).build();
    let registry = CodecRegistry::default();

    let outcome = ExperimentOrchestrator::new(&tools, &config, &registry)
        .run(&[input.clone()], &[x264(100), x264(560)])?;

    assert_eq!(outcome.table.len(), 1);
    assert_eq!(outcome.table.rows()[0].bitrate, Some(560));
    assert_eq!(outcome.summary.skipped.len(), 1);
    let skipped = &outcome.summary.skipped[0];
    assert_eq!(skipped.input, input);
    assert_eq!(skipped.configuration.rate, RateControl::Bitrate(100));
    assert!(skipped.error.contains("encoder crashed"));
    Ok(())
}

#[test]
fn test_cleanup_levels() -> Result<(), Box<dyn std::error::Error>> {
    let registry = CodecRegistry::default();
    for (level, encoded_kept, decoded_kept) in [
        (CleanupLevel::Keep, true, true),
        (CleanupLevel::Intermediates, true, false),
        (CleanupLevel::All, false, false),
    ] {
        let tools = FakeMediaTools::new();
        let (dir, input) = setup(&tools);
        let config = config_in(dir.path()).cleanup(level).build();
        ExperimentOrchestrator::new(&tools, &config, &registry).run(&[input], &[x264(560)])?;

        let work = dir.path().join("work");
        assert_eq!(work.join(ENCODED).exists(), encoded_kept, "{level:?}");
        assert_eq!(work.join(format!("{ENCODED}.y4m")).exists(), decoded_kept, "{level:?}");
        // the reference outlives every configuration
        assert!(work.join("clip.mp4.ref_1280x720.y4m").exists());
    }
    Ok(())
}

#[test]
fn test_repetitions_use_distinct_artifacts() -> Result<(), Box<dyn std::error::Error>> {
    let tools = FakeMediaTools::new();
    let (dir, input) = setup(&tools);
    let config = config_in(dir.path()).cleanup(CleanupLevel::Keep).build();
    let registry = CodecRegistry::default();
    let axes = AxisValues {
        resolutions: vec!["640x360".into()],
        bitrates: vec!["560".into()],
        presets: Some(vec!["medium".into()]),
        repetitions: 2,
        ..Default::default()
    };
    let configurations = ConfigurationSpaceBuilder::new(&registry).build(&["x264".to_string()], &axes)?;
    assert_eq!(configurations.len(), 2);

    let outcome = ExperimentOrchestrator::new(&tools, &config, &registry).run(&[input], &configurations)?;
    let runs: Vec<u32> = outcome.table.rows().iter().map(|r| r.run).collect();
    assert_eq!(runs, vec![0, 1]);

    let work = dir.path().join("work");
    assert!(work.join(ENCODED).exists());
    assert!(
        work.join("clip.mp4.codec_x264.resolution_640x360.bitrate_560.preset_medium.rcmode_cbr.run_1.mp4")
            .exists()
    );
    // one reference for both repetitions
    assert_eq!(
        tools
            .calls()
            .iter()
            .filter(|c| c.program == "ffmpeg" && c.args.last().is_some_and(|a| a.ends_with("ref_1280x720.y4m")))
            .count(),
        1
    );
    Ok(())
}

#[test]
fn test_standalone_vmaf_when_filter_missing() -> Result<(), Box<dyn std::error::Error>> {
    let tools = FakeMediaTools::new().without_libvmaf();
    let (dir, input) = setup(&tools);
    let config = config_in(dir.path()).build();
    let registry = CodecRegistry::default();

    let outcome = ExperimentOrchestrator::new(&tools, &config, &registry)
        .run(&[input], &[x264(100), x264(560)])?;
    for row in outcome.table.rows() {
        assert_eq!(row.get("vmaf_backend"), Some(&Cell::Text("standalone".to_string())));
        assert!((number(row.get("vmaf_mean")) - 91.5).abs() < 1e-9);
    }
    // capability detected once for the batch
    assert_eq!(tools.count("-filters"), 1);
    assert_eq!(tools.count("--distorted"), 2);
    Ok(())
}

#[test]
fn test_forced_standalone_requires_vmaf_binary() {
    let tools = FakeMediaTools::new();
    let (dir, input) = setup(&tools);
    let config = config_in(dir.path())
        .vmaf_backend(VmafBackend::Standalone)
        .vmaf_bin("/opt/missing/vmaf-tool")
        .build();
    let registry = CodecRegistry::default();

    let err = ExperimentOrchestrator::new(&tools, &config, &registry)
        .run(&[input], &[x264(560)])
        .unwrap_err();
    assert!(matches!(err, CoreError::DependencyNotFound(ref p) if p == "/opt/missing/vmaf-tool"));
}

#[test]
fn test_luma_fallback_reports_average_channel() -> Result<(), Box<dyn std::error::Error>> {
    let tools = FakeMediaTools::new().without_luma();
    let (dir, input) = setup(&tools);
    let config = config_in(dir.path()).build();
    let registry = CodecRegistry::default();

    let outcome = ExperimentOrchestrator::new(&tools, &config, &registry).run(&[input], &[x264(560)])?;
    let row = &outcome.table.rows()[0];
    assert!(row.get("psnr_y_mean").is_none());
    assert!((number(row.get("psnr_avg_mean")) - 45.5).abs() < 1e-9);
    assert!(row.get("ssim_avg_mean").is_some());
    Ok(())
}

#[test]
fn test_duplicate_base_names_rejected_before_any_tool_runs() {
    let tools = FakeMediaTools::new();
    let config = CoreConfig::default();
    let registry = CodecRegistry::default();
    let inputs = vec![PathBuf::from("/data/a/clip.mp4"), PathBuf::from("/data/b/clip.mp4")];

    let err = ExperimentOrchestrator::new(&tools, &config, &registry)
        .run(&inputs, &[x264(560)])
        .unwrap_err();
    assert!(err.is_configuration());
    assert!(tools.calls().is_empty());
}

#[test]
fn test_parallel_jobs_keep_configuration_order() -> Result<(), Box<dyn std::error::Error>> {
    let tools = FakeMediaTools::new();
    let (dir, input) = setup(&tools);
    let config = config_in(dir.path()).jobs(4).build();
    let registry = CodecRegistry::default();
    let configurations: Vec<Configuration> = [100, 200, 300, 400, 500, 600].into_iter().map(x264).collect();

    let outcome = ExperimentOrchestrator::new(&tools, &config, &registry).run(&[input], &configurations)?;
    let bitrates: Vec<Option<u32>> = outcome.table.rows().iter().map(|r| r.bitrate).collect();
    assert_eq!(
        bitrates,
        vec![Some(100), Some(200), Some(300), Some(400), Some(500), Some(600)]
    );
    Ok(())
}

#[test]
fn test_events_follow_input_phases() -> Result<(), Box<dyn std::error::Error>> {
    let tools = FakeMediaTools::new();
    let (dir, input) = setup(&tools);
    let config = config_in(dir.path()).build();
    let registry = CodecRegistry::default();
    let recorder = Arc::new(Recorder::default());
    let mut events = EventDispatcher::new();
    events.add_handler(recorder.clone());

    ExperimentOrchestrator::new(&tools, &config, &registry)
        .with_events(events)
        .run(&[input], &[x264(560)])?;

    let kinds: Vec<&'static str> = recorder
        .0
        .lock()
        .unwrap()
        .iter()
        .map(|e| match e {
            Event::BatchStarted { .. } => "started",
            Event::InputProbing { .. } => "probing",
            Event::InputNormalizing { .. } => "normalizing",
            Event::ReferenceReady { .. } => "reference",
            Event::ConfigurationFinished { succeeded: true, .. } => "ok",
            Event::ConfigurationFinished { .. } => "failed",
            Event::InputDone { .. } => "done",
            Event::BatchFinished { .. } => "finished",
        })
        .collect();
    assert_eq!(
        kinds,
        vec!["started", "probing", "normalizing", "reference", "ok", "done", "finished"]
    );
    Ok(())
}
