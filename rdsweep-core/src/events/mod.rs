//! Batch progress events.
//!
//! The orchestrator emits an `Event` at every phase change of a batch;
//! front ends register `EventHandler`s (the CLI's progress bar, test
//! recorders) on an `EventDispatcher` without the core knowing about them.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::media::Resolution;

#[derive(Debug, Clone)]
pub enum Event {
    BatchStarted {
        inputs: usize,
        configurations: usize,
    },

    // Per-input phases
    InputProbing {
        input: PathBuf,
    },
    InputNormalizing {
        input: PathBuf,
        resolution: Option<Resolution>,
    },
    ReferenceReady {
        input: PathBuf,
        reference: PathBuf,
        resolution: Resolution,
    },
    InputDone {
        input: PathBuf,
    },

    // Per-configuration outcome
    ConfigurationFinished {
        input: PathBuf,
        configuration: String,
        succeeded: bool,
    },

    BatchFinished {
        rows: usize,
        skipped: usize,
        elapsed: Duration,
    },
}

pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &Event);
}

#[derive(Clone)]
pub struct EventDispatcher {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn add_handler(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    pub fn emit(&self, event: Event) {
        for handler in &self.handlers {
            handler.handle(&event);
        }
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
