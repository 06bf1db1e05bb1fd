//! Core library of the rdsweep rate-distortion experiment harness.
//!
//! The crate expands sweep axes into concrete codec configurations, drives
//! ffmpeg, ffprobe and the standalone encoders/scorers through a
//! [`ProcessRunner`](external::ProcessRunner), and collects one
//! [`ResultRow`](reporting::ResultRow) of quality and rate measurements per
//! input and configuration.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use rdsweep_core::{AxisValues, CodecRegistry, ConfigurationSpaceBuilder, CoreConfig};
//! use rdsweep_core::external::SystemProcessRunner;
//! use rdsweep_core::processing::ExperimentOrchestrator;
//! use std::path::PathBuf;
//!
//! let registry = CodecRegistry::default();
//! let axes = AxisValues {
//!     resolutions: vec!["640x360".into()],
//!     bitrates: vec!["560".into()],
//!     ..Default::default()
//! };
//! let configurations = ConfigurationSpaceBuilder::new(&registry)
//!     .build(&["x264".to_string()], &axes)
//!     .unwrap();
//!
//! let config = CoreConfig::default();
//! let runner = SystemProcessRunner::new("perf");
//! let outcome = ExperimentOrchestrator::new(&runner, &config, &registry)
//!     .run(&[PathBuf::from("clip.mp4")], &configurations)
//!     .unwrap();
//! outcome.table.write_to_path(&PathBuf::from("results.csv")).unwrap();
//! ```

pub mod codecs;
pub mod config;
pub mod error;
pub mod events;
pub mod external;
pub mod media;
pub mod naming;
pub mod processing;
pub mod reporting;
pub mod sweep;
pub mod temp_files;
pub mod utils;

// Re-exports for public API
pub use codecs::{CodecDescriptor, CodecRegistry};
pub use config::{CleanupLevel, CoreConfig, CoreConfigBuilder, FailurePolicy, VmafBackend};
pub use error::{CoreError, CoreResult};
pub use events::{Event, EventDispatcher, EventHandler};
pub use media::{FrameRate, Resolution};
pub use processing::{BatchSummary, ExperimentOrchestrator, ExperimentOutcome};
pub use reporting::{ResultRow, ResultTable};
pub use sweep::{AxisValues, Configuration, ConfigurationSpaceBuilder, RateControl, RateControlMode};
pub use utils::{format_bytes, format_duration};
