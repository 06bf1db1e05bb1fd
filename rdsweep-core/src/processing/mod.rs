//! The per-configuration pipeline and the batch orchestrator driving it.
//!
//! A reference is normalized once per input (`reference`), each
//! configuration is encoded and decoded (`encode`), the decoded artifact is
//! scored against the reference (`quality`, `metrics`, `stats`), and
//! `experiment` ties the stages together over a whole batch.

/// Batch orchestration over inputs and configurations
pub mod experiment;

/// Encoder and decoder invocation
pub mod encode;

/// Parsers for the per-frame logs of the quality tools
pub mod metrics;

/// Rescaling and PSNR/SSIM/VMAF measurement
pub mod quality;

/// Reference normalization
pub mod reference;

/// Summary statistics over per-frame scores
pub mod stats;

pub use experiment::{BatchSummary, ExperimentOrchestrator, ExperimentOutcome, SkippedConfiguration};
pub use quality::QualityReport;
pub use reference::ReferenceArtifact;
pub use stats::{ChannelScores, QualityScores};
