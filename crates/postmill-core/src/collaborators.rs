//! Collaborator contracts consumed by the core.
//!
//! Implementations are injected as `Arc<dyn Trait>`; nothing here is looked
//! up from process-wide state. Only [`ContentSource`] has an error channel.
//! Scoring, synthesis and revision report trouble through their return
//! values (a failure-encoded [`ValidationScore`], [`Synthesis::Fallback`],
//! [`Revision::Unchanged`]), so the core never branches on a raised error
//! from them.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Batch, Instruction, Post, PostDraft, Revision, Synthesis, ValidationScore};
use crate::error::ContentError;
use crate::patterns::FailurePatterns;

/// Produces draft posts for a batch.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Generate `count` drafts. `avoid` is set on regeneration passes and
    /// summarises why earlier posts in the batch were rejected.
    async fn generate(
        &self,
        batch_id: Uuid,
        count: usize,
        avoid: Option<&FailurePatterns>,
    ) -> Result<Vec<PostDraft>, ContentError>;
}

/// One independent scoring perspective.
#[async_trait]
pub trait Validator: Send + Sync {
    /// Stable persona name, used as `agent_name` on scores.
    fn name(&self) -> &str;

    /// Score the post's current content. Internal failures must come back as
    /// [`ValidationScore::failure`].
    async fn score(&self, post: &Post) -> ValidationScore;
}

/// Turns a post's non-approving scores into an improvement instruction.
#[async_trait]
pub trait FeedbackSynthesizer: Send + Sync {
    async fn synthesize(&self, post: &Post) -> Synthesis;
}

/// Rewrites a post according to an instruction.
#[async_trait]
pub trait Reviser: Send + Sync {
    async fn revise(&self, post: &Post, instruction: &Instruction) -> Revision;
}

/// Fire-and-forget consumer of completed batches (cost accounting,
/// publishing). Errors are logged by the coordinator and dropped.
#[async_trait]
pub trait BatchSink: Send + Sync {
    fn name(&self) -> &str;

    async fn on_batch_completed(&self, batch: &Batch) -> anyhow::Result<()>;
}
