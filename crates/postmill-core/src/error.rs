//! Pipeline-level errors.
//!
//! Only content generation is fatal for a batch. Validator, synthesizer and
//! reviser problems are encoded in their return values and never show up
//! here.

use std::path::PathBuf;

use uuid::Uuid;

use crate::config::ConfigError;
use crate::domain::{Batch, DomainError};

/// Failure of a [`ContentSource`](crate::collaborators::ContentSource).
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("content generation failed: {0}")]
    Generation(String),

    #[error("content source returned an invalid draft: {0}")]
    InvalidDraft(#[source] DomainError),

    #[error("failed to load drafts from {path}: {reason}")]
    Load { path: PathBuf, reason: String },
}

/// Top-level error returned by the batch coordinator.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Content(#[from] ContentError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The batch was marked failed. It is returned so callers can inspect
    /// the posts appended before the failure.
    #[error("batch {batch_id} failed: {source}")]
    BatchFailed {
        batch_id: Uuid,
        batch: Box<Batch>,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// The failed batch, when this error aborted one.
    pub fn batch(&self) -> Option<&Batch> {
        match self {
            PipelineError::BatchFailed { batch, .. } => Some(batch.as_ref()),
            _ => None,
        }
    }

    /// `true` when the root cause is a content-generation failure.
    pub fn is_content_failure(&self) -> bool {
        match self {
            PipelineError::Content(_) => true,
            PipelineError::BatchFailed { source, .. } => source.is_content_failure(),
            _ => false,
        }
    }
}

/// Result type for pipeline operations.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
