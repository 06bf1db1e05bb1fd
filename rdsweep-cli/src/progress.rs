// ============================================================================
// rdsweep-cli/src/progress.rs
// ============================================================================
//
// PROGRESS REPORTING: Sweep Progress Bar
//
// `SweepProgress` is an `EventHandler` registered on the orchestrator's
// dispatcher. It drives one indicatif bar over all (input, configuration)
// pairs of the batch and shows the current input phase as its message.
// When stderr is not a terminal the bar is hidden.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use rdsweep_core::events::{Event, EventHandler};

use std::path::Path;

pub struct SweepProgress {
    bar: ProgressBar,
}

impl SweepProgress {
    pub fn new(enabled: bool) -> Self {
        let bar = ProgressBar::hidden();
        if enabled && console::Term::stderr().is_term() {
            bar.set_draw_target(ProgressDrawTarget::stderr());
        }
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} [{elapsed_precise}] {bar:30.cyan/blue} {pos}/{len} {wide_msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
        bar.set_style(style);
        Self { bar }
    }

    fn name(input: &Path) -> String {
        input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| input.display().to_string())
    }
}

impl EventHandler for SweepProgress {
    fn handle(&self, event: &Event) {
        match event {
            Event::BatchStarted { configurations, .. } => {
                self.bar.set_length(*configurations as u64);
                self.bar.set_position(0);
            }
            Event::InputProbing { input } => {
                self.bar.set_message(format!("{}: probing", Self::name(input)));
            }
            Event::InputNormalizing { input, .. } => {
                self.bar.set_message(format!("{}: normalizing", Self::name(input)));
            }
            Event::ReferenceReady { input, resolution, .. } => {
                self.bar
                    .set_message(format!("{}: sweeping at reference {}", Self::name(input), resolution));
            }
            Event::ConfigurationFinished {
                configuration,
                succeeded,
                ..
            } => {
                if !succeeded {
                    self.bar.println(format!("failed: {configuration}"));
                }
                self.bar.inc(1);
            }
            Event::InputDone { .. } => {}
            Event::BatchFinished { .. } => self.bar.finish_and_clear(),
        }
    }
}
