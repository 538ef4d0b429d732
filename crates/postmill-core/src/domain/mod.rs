//! Domain models for Postmill.
//!
//! Canonical definitions for the core entities:
//! - `Post`: a unit of content and its validation/revision state machine
//! - `ValidationScore` / `ScoreRound`: validator verdicts and round snapshots
//! - `Batch` / `BatchMetrics`: a bounded run and its aggregate numbers
//! - `PostDraft`, `Instruction`, `Synthesis`, `Revision`: collaborator payloads

pub mod batch;
pub mod digest;
pub mod draft;
pub mod error;
pub mod instruction;
pub mod metrics;
pub mod post;
pub mod score;

pub use batch::{Batch, BatchStatus};
pub use draft::{PostDraft, Usage};
pub use error::{DomainError, Result};
pub use instruction::{Instruction, Revision, Synthesis};
pub use metrics::BatchMetrics;
pub use post::{
    MediaAttachment, MediaKind, Post, PostStatus, RevisionOutcome, RevisionRecord,
    DEFAULT_MAX_REVISIONS, MAX_CONTENT_CHARS, MAX_HASHTAGS, MIN_CONTENT_CHARS,
};
pub use score::{ScoreRound, ValidationScore, APPROVAL_THRESHOLD, ERROR_MARKER};
