//! Domain-level error taxonomy for Postmill.

use uuid::Uuid;

use super::batch::BatchStatus;
use super::post::PostStatus;

/// Errors raised when a post or batch invariant would be violated.
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("post content must be {min}-{max} characters, got {actual}")]
    ContentLength {
        min: usize,
        max: usize,
        actual: usize,
    },

    #[error("post carries {actual} hashtags, at most {max} allowed")]
    TooManyHashtags { max: usize, actual: usize },

    #[error("post {post} cannot move from {from} to {to}")]
    InvalidTransition {
        post: Uuid,
        from: PostStatus,
        to: PostStatus,
    },

    #[error("batch {batch} cannot move from {from} to {to}")]
    InvalidBatchTransition {
        batch: Uuid,
        from: BatchStatus,
        to: BatchStatus,
    },

    #[error("revision budget exhausted for post {post} ({max} revisions)")]
    RevisionBudgetExhausted { post: Uuid, max: u32 },

    #[error("post {post} has no scored round")]
    NotScored { post: Uuid },

    #[error("stored record {id} is inconsistent: {reason}")]
    InconsistentRecord { id: Uuid, reason: String },
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;
