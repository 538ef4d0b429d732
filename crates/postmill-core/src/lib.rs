//! Postmill Core Library
//!
//! Post lifecycle state machine, parallel validator pool and batch
//! regeneration coordinator. Collaborators (content source, validators,
//! synthesizer, reviser, sinks) are injected as trait objects.

pub mod collaborators;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod error;
pub mod fakes;
pub mod lifecycle;
pub mod obs;
pub mod patterns;
pub mod pool;
pub mod sinks;
pub mod stats;
pub mod telemetry;

pub use collaborators::{BatchSink, ContentSource, FeedbackSynthesizer, Reviser, Validator};
pub use config::{ConfigError, PipelineConfig};
pub use coordinator::{regeneration_count, BatchCoordinator, RunReport};
pub use domain::{
    Batch, BatchMetrics, BatchStatus, DomainError, Instruction, MediaAttachment, MediaKind, Post,
    PostDraft, PostStatus, Revision, RevisionOutcome, RevisionRecord, ScoreRound, Synthesis,
    Usage, ValidationScore, APPROVAL_THRESHOLD, DEFAULT_MAX_REVISIONS, ERROR_MARKER,
    MAX_CONTENT_CHARS, MAX_HASHTAGS, MIN_CONTENT_CHARS,
};
pub use error::{ContentError, PipelineError, PipelineResult};
pub use lifecycle::PostLifecycleController;
pub use patterns::FailurePatterns;
pub use pool::ValidatorPool;
pub use sinks::{CostLedger, CostTotals};
pub use stats::LifetimeStats;
pub use telemetry::{init_tracing, LogFormat};

/// Crate version, as recorded in reports.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
