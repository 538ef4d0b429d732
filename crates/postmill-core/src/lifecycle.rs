//! Post lifecycle controller.
//!
//! Drives one post from `Generated`/`Revised` to `Approved` or `Rejected`:
//!
//! ```text
//! VALIDATING ──approved──────────────────────────────▶ APPROVED
//!     │
//!     ├─budget left──▶ REVISION_NEEDED ──revise──▶ REVISED ──▶ VALIDATING
//!     │
//!     └─budget spent─────────────────────────────────▶ REJECTED
//! ```
//!
//! The approval predicate is `approvals >= min_approvals_required`, evaluated
//! over the full score set of the latest round. There is no partial credit:
//! a post that runs out of budget is rejected whatever its score trend.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, instrument};

use crate::collaborators::{FeedbackSynthesizer, Reviser};
use crate::domain::{Post, PostStatus, Result, Synthesis};
use crate::obs;
use crate::pool::ValidatorPool;

/// Runs the validate → revise loop for one post at a time.
#[derive(Clone)]
pub struct PostLifecycleController {
    pool: ValidatorPool,
    synthesizer: Arc<dyn FeedbackSynthesizer>,
    reviser: Arc<dyn Reviser>,
    min_approvals_required: usize,
}

impl std::fmt::Debug for PostLifecycleController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostLifecycleController")
            .field("pool", &self.pool)
            .field("min_approvals_required", &self.min_approvals_required)
            .finish_non_exhaustive()
    }
}

impl PostLifecycleController {
    pub fn new(
        pool: ValidatorPool,
        synthesizer: Arc<dyn FeedbackSynthesizer>,
        reviser: Arc<dyn Reviser>,
        min_approvals_required: usize,
    ) -> Self {
        Self {
            pool,
            synthesizer,
            reviser,
            min_approvals_required,
        }
    }

    pub fn pool(&self) -> &ValidatorPool {
        &self.pool
    }

    pub fn min_approvals_required(&self) -> usize {
        self.min_approvals_required
    }

    /// Resolve `post` to a terminal status and return it.
    ///
    /// Errors only when the post is not in a resolvable state (already
    /// terminal, or mid-round); collaborator trouble never surfaces here.
    #[instrument(skip_all, fields(post_id = %post.id(), post_number = post.post_number()))]
    pub async fn resolve(&self, post: &mut Post) -> Result<PostStatus> {
        let started = Instant::now();
        let post_id = post.id();

        loop {
            post.begin_validation()?;
            let scores = self.pool.score_all(post).await;
            let round = post.record_round(scores, self.min_approvals_required)?;
            obs::emit_round_scored(post_id, round);

            if round.approved() {
                post.approve(started.elapsed())?;
                break;
            }

            if !post.can_revise() {
                post.reject(started.elapsed())?;
                break;
            }

            post.request_revision()?;
            let synthesis = self.synthesizer.synthesize(post).await;
            if let Synthesis::Fallback { reason, .. } = &synthesis {
                obs::emit_synthesis_fallback(post_id, reason);
            }
            debug!(priority_fix = %synthesis.instruction().priority_fix, "requesting revision");

            let revision = self.reviser.revise(post, synthesis.instruction()).await;
            let record = post.apply_revision(revision)?;
            obs::emit_post_revised(post_id, record.revision_number, &record.outcome);
        }

        obs::emit_post_resolved(
            post_id,
            post.post_number(),
            post.status(),
            post.revision_count(),
        );
        Ok(post.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::Validator;
    use crate::domain::PostDraft;
    use crate::fakes::{EchoSynthesizer, ScriptedValidator, SuffixReviser};
    use uuid::Uuid;

    fn controller(scripts: Vec<Vec<f64>>, min_approvals: usize) -> PostLifecycleController {
        let validators = scripts
            .into_iter()
            .enumerate()
            .map(|(i, s)| Arc::new(ScriptedValidator::new(format!("v{i}"), s)) as Arc<dyn Validator>)
            .collect();
        PostLifecycleController::new(
            ValidatorPool::new(validators),
            Arc::new(EchoSynthesizer::new()),
            Arc::new(SuffixReviser::new()),
            min_approvals,
        )
    }

    fn post(max_revisions: u32) -> Post {
        let draft = PostDraft::new(
            "Controller unit test draft with comfortably more than fifty characters.",
            "testers",
        );
        Post::from_draft(Uuid::new_v4(), 1, draft, max_revisions).unwrap()
    }

    #[tokio::test]
    async fn test_first_round_approval() {
        let c = controller(vec![vec![8.0], vec![6.0], vec![7.5]], 2);
        let mut p = post(2);
        assert_eq!(c.resolve(&mut p).await.unwrap(), PostStatus::Approved);
        assert_eq!(p.revision_count(), 0);
        assert!(p.processing_time_ms().is_some());
    }

    #[tokio::test]
    async fn test_terminal_post_is_not_resolved_again() {
        let c = controller(vec![vec![9.0]], 1);
        let mut p = post(2);
        c.resolve(&mut p).await.unwrap();
        assert!(c.resolve(&mut p).await.is_err());
        assert_eq!(p.score_rounds().len(), 1);
    }

    #[tokio::test]
    async fn test_zero_budget_rejects_after_one_round() {
        let c = controller(vec![vec![3.0]], 1);
        let mut p = post(0);
        assert_eq!(c.resolve(&mut p).await.unwrap(), PostStatus::Rejected);
        assert_eq!(p.score_rounds().len(), 1);
        assert!(p.revision_history().is_empty());
    }
}
