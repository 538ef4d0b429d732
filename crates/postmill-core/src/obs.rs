//! Structured observability hooks for batch and post lifecycle events.
//!
//! Every helper emits a single event with a fixed `event = "..."` field, so
//! log pipelines can filter on it. Verbosity follows `RUST_LOG`; JSON output
//! is selected in [`crate::telemetry::init_tracing`].

use tracing::{info, warn, Span};
use uuid::Uuid;

use crate::domain::{digest, BatchMetrics, PostStatus, RevisionOutcome, ScoreRound};

/// Span grouping everything that happens while one batch runs.
///
/// Attach with `tracing::Instrument` rather than entering it, since the
/// batch future crosses await points.
pub fn batch_span(batch_id: Uuid) -> Span {
    tracing::info_span!("postmill.batch", batch_id = %batch_id)
}

pub fn emit_batch_started(batch_id: Uuid, posts_requested: usize) {
    info!(event = "batch.started", batch_id = %batch_id, posts_requested = posts_requested);
}

pub fn emit_round_scored(post_id: Uuid, round: &ScoreRound) {
    info!(
        event = "post.round_scored",
        post_id = %post_id,
        round = round.round(),
        digest = digest::short(round.content_digest()),
        approvals = round.approval_count(),
        required = round.required(),
        approved = round.approved(),
        average_score = round.average_score(),
    );
}

pub fn emit_post_revised(post_id: Uuid, revision_number: u32, outcome: &RevisionOutcome) {
    match outcome {
        RevisionOutcome::Applied => {
            info!(event = "post.revised", post_id = %post_id, revision = revision_number);
        }
        RevisionOutcome::Failed { reason } => {
            warn!(
                event = "post.revision_failed",
                post_id = %post_id,
                revision = revision_number,
                reason = %reason,
            );
        }
    }
}

pub fn emit_synthesis_fallback(post_id: Uuid, reason: &str) {
    warn!(event = "post.synthesis_fallback", post_id = %post_id, reason = %reason);
}

pub fn emit_post_resolved(post_id: Uuid, post_number: usize, status: PostStatus, revisions: u32) {
    info!(
        event = "post.resolved",
        post_id = %post_id,
        post_number = post_number,
        status = %status,
        revisions = revisions,
    );
}

pub fn emit_regeneration_requested(
    batch_id: Uuid,
    approval_rate: f64,
    target: f64,
    count: usize,
    avoid: &str,
) {
    info!(
        event = "batch.regeneration_requested",
        batch_id = %batch_id,
        approval_rate = approval_rate,
        target = target,
        count = count,
        avoid = %avoid,
    );
}

pub fn emit_batch_finished(batch_id: Uuid, metrics: &BatchMetrics) {
    info!(
        event = "batch.finished",
        batch_id = %batch_id,
        total = metrics.total_posts,
        approved = metrics.approved_posts,
        rejected = metrics.rejected_posts,
        approval_rate = metrics.approval_rate,
    );
}

pub fn emit_batch_failed(batch_id: Uuid, error: &dyn std::fmt::Display) {
    warn!(event = "batch.failed", batch_id = %batch_id, error = %error);
}

/// Sink failures are logged here and go no further.
pub fn emit_sink_error(sink: &str, batch_id: Uuid, error: &dyn std::fmt::Display) {
    warn!(event = "sink.error", sink = %sink, batch_id = %batch_id, error = %error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_span_create() {
        let span = batch_span(Uuid::new_v4());
        let _entered = span.enter();
    }
}
