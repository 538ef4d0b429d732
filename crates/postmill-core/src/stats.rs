//! Lifetime counters kept by a [`BatchCoordinator`](crate::coordinator::BatchCoordinator).
//!
//! Plain running sums updated after each batch run. They are owned by one
//! coordinator and mutated through `&mut self`; concurrent batch runs sharing
//! a coordinator are not supported. Call [`LifetimeStats::flush`] to emit the
//! current values as a single `tracing::info!` event.

use serde::Serialize;

use crate::domain::Batch;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LifetimeStats {
    batches_completed: u64,
    batches_failed: u64,
    posts_generated: u64,
    posts_approved: u64,
    posts_rejected: u64,
    regeneration_passes: u64,
}

impl LifetimeStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a completed batch into the totals.
    pub fn record_completed(&mut self, batch: &Batch) {
        self.batches_completed += 1;
        self.record_posts(batch);
    }

    /// Fold a failed batch into the totals; its posts still count as
    /// generated.
    pub fn record_failed(&mut self, batch: &Batch) {
        self.batches_failed += 1;
        self.record_posts(batch);
    }

    fn record_posts(&mut self, batch: &Batch) {
        self.posts_generated += batch.len() as u64;
        self.posts_approved += batch.approved_count() as u64;
        self.posts_rejected += batch.rejected_count() as u64;
        if batch.regenerated() {
            self.regeneration_passes += 1;
        }
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            batches_completed = self.batches_completed,
            batches_failed = self.batches_failed,
            posts_generated = self.posts_generated,
            posts_approved = self.posts_approved,
            posts_rejected = self.posts_rejected,
            regeneration_passes = self.regeneration_passes,
        );
    }

    pub fn batches_completed(&self) -> u64 {
        self.batches_completed
    }

    pub fn batches_failed(&self) -> u64 {
        self.batches_failed
    }

    pub fn posts_generated(&self) -> u64 {
        self.posts_generated
    }

    pub fn posts_approved(&self) -> u64 {
        self.posts_approved
    }

    pub fn posts_rejected(&self) -> u64 {
        self.posts_rejected
    }

    pub fn regeneration_passes(&self) -> u64 {
        self.regeneration_passes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PostDraft;

    fn batch_with(n: usize) -> Batch {
        let mut batch = Batch::new();
        batch.start().unwrap();
        let drafts = (0..n)
            .map(|i| PostDraft::new(format!("Lifetime stats draft {i}, comfortably long enough to be valid."), "ops"))
            .collect();
        batch.append_drafts(drafts, 2).unwrap();
        batch
    }

    #[test]
    fn counters_accumulate() {
        let mut stats = LifetimeStats::new();
        stats.record_completed(&batch_with(3));
        stats.record_failed(&batch_with(2));

        assert_eq!(stats.batches_completed(), 1);
        assert_eq!(stats.batches_failed(), 1);
        assert_eq!(stats.posts_generated(), 5);
        assert_eq!(stats.posts_approved(), 0);
        assert_eq!(stats.regeneration_passes(), 0);
    }
}
