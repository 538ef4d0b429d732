//! Batch sinks shipped with the core.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::collaborators::BatchSink;
use crate::domain::{Batch, Usage};

/// Running cost totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CostTotals {
    pub batches: u64,
    pub tokens: u64,
    pub cost_usd: f64,
}

#[derive(Debug, Default)]
struct LedgerState {
    totals: CostTotals,
    per_batch: BTreeMap<Uuid, Usage>,
}

/// Thread-safe cost accounting, fed by completed batches.
///
/// Injected wherever totals are needed instead of living in a process-wide
/// static. Recording the same batch twice is refused.
#[derive(Debug, Default)]
pub struct CostLedger {
    state: Mutex<LedgerState>,
}

impl CostLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a batch's usage into the totals.
    pub fn record(&self, batch: &Batch) -> anyhow::Result<Usage> {
        let usage: Usage = batch.posts().iter().map(|p| p.usage()).sum();
        let mut state = self.lock();
        if state.per_batch.contains_key(&batch.id()) {
            anyhow::bail!("batch {} already recorded", batch.id());
        }
        state.per_batch.insert(batch.id(), usage);
        state.totals.batches += 1;
        state.totals.tokens += usage.tokens;
        state.totals.cost_usd += usage.cost_usd;
        Ok(usage)
    }

    pub fn snapshot(&self) -> CostTotals {
        self.lock().totals
    }

    pub fn batch_usage(&self, batch_id: Uuid) -> Option<Usage> {
        self.lock().per_batch.get(&batch_id).copied()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LedgerState> {
        // Updates are plain additions; a poisoned guard still holds valid totals.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl BatchSink for CostLedger {
    fn name(&self) -> &str {
        "cost_ledger"
    }

    async fn on_batch_completed(&self, batch: &Batch) -> anyhow::Result<()> {
        let usage = self.record(batch)?;
        tracing::debug!(
            batch_id = %batch.id(),
            tokens = usage.tokens,
            cost_usd = usage.cost_usd,
            "batch cost recorded"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PostDraft;

    fn batch(tokens: &[u64]) -> Batch {
        let mut batch = Batch::new();
        batch.start().unwrap();
        let drafts = tokens
            .iter()
            .map(|t| {
                PostDraft::new("Cost ledger draft body that is safely over fifty characters.", "ops")
                    .with_usage(Usage::new(*t, *t as f64 / 1000.0))
            })
            .collect();
        batch.append_drafts(drafts, 2).unwrap();
        batch
    }

    #[tokio::test]
    async fn test_ledger_accumulates_per_batch() {
        let ledger = CostLedger::new();
        let a = batch(&[100, 200]);
        let b = batch(&[50]);

        ledger.on_batch_completed(&a).await.unwrap();
        ledger.on_batch_completed(&b).await.unwrap();

        let totals = ledger.snapshot();
        assert_eq!(totals.batches, 2);
        assert_eq!(totals.tokens, 350);
        assert!((totals.cost_usd - 0.35).abs() < 1e-9);
        assert_eq!(ledger.batch_usage(a.id()).map(|u| u.tokens), Some(300));
    }

    #[tokio::test]
    async fn test_ledger_refuses_duplicate_batch() {
        let ledger = CostLedger::new();
        let a = batch(&[10]);
        ledger.on_batch_completed(&a).await.unwrap();
        assert!(ledger.on_batch_completed(&a).await.is_err());
        assert_eq!(ledger.snapshot().tokens, 10);
    }
}
