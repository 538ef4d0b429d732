//! Batch coordinator.
//!
//! One batch run:
//!
//! 1. generate `posts_per_batch` drafts and append them
//! 2. resolve every post sequentially through the lifecycle controller
//! 3. stop if the approval rate reaches the target
//! 4. otherwise summarise the rejected posts into [`FailurePatterns`]
//! 5. generate `max(1, posts_per_batch - approved)` more drafts with that
//!    summary as an avoid hint, and resolve only the new posts
//! 6. complete the batch and compute its metrics over every post
//!
//! Any content-generation failure marks the batch failed and is returned to
//! the caller together with the partial batch.

use std::ops::Range;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn, Instrument};

use crate::collaborators::{BatchSink, ContentSource};
use crate::config::{ConfigError, PipelineConfig};
use crate::domain::Batch;
use crate::error::{ContentError, PipelineError, PipelineResult};
use crate::lifecycle::PostLifecycleController;
use crate::obs;
use crate::patterns::FailurePatterns;
use crate::stats::LifetimeStats;

/// Drafts requested by a regeneration pass: never fewer than one.
pub fn regeneration_count(posts_per_batch: usize, approved: usize) -> usize {
    posts_per_batch.saturating_sub(approved).max(1)
}

/// Outcome of [`BatchCoordinator::run_until_target`].
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Every completed batch, in run order.
    pub batches: Vec<Batch>,

    /// Whether the last batch reached the target approval rate.
    pub target_met: bool,
}

impl RunReport {
    pub fn attempts(&self) -> usize {
        self.batches.len()
    }

    pub fn last(&self) -> Option<&Batch> {
        self.batches.last()
    }
}

/// Generates, resolves and (when needed) regenerates batches of posts.
pub struct BatchCoordinator {
    config: PipelineConfig,
    source: Arc<dyn ContentSource>,
    controller: PostLifecycleController,
    sinks: Vec<Arc<dyn BatchSink>>,
    stats: LifetimeStats,
}

impl std::fmt::Debug for BatchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchCoordinator")
            .field("config", &self.config)
            .field("controller", &self.controller)
            .field("sinks", &self.sinks.iter().map(|s| s.name()).collect::<Vec<_>>())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl BatchCoordinator {
    /// Build a coordinator, validating `config` against the controller's
    /// validator count.
    ///
    /// The controller's `min_approvals_required` is what the approval
    /// predicate uses; it must agree with `config`.
    pub fn new(
        config: PipelineConfig,
        source: Arc<dyn ContentSource>,
        controller: PostLifecycleController,
    ) -> PipelineResult<Self> {
        config.validate(controller.pool().len())?;
        if controller.min_approvals_required() != config.min_approvals_required {
            return Err(ConfigError::Invalid(format!(
                "controller requires {} approvals but config says {}",
                controller.min_approvals_required(),
                config.min_approvals_required
            ))
            .into());
        }
        Ok(Self {
            config,
            source,
            controller,
            sinks: Vec::new(),
            stats: LifetimeStats::new(),
        })
    }

    /// Register a sink notified after every completed batch.
    pub fn with_sink(mut self, sink: Arc<dyn BatchSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn stats(&self) -> &LifetimeStats {
        &self.stats
    }

    /// Run one batch to completion.
    ///
    /// On a content-generation failure the batch is marked failed and handed
    /// back inside [`PipelineError::BatchFailed`].
    pub async fn run_batch(&mut self) -> PipelineResult<Batch> {
        let mut batch = Batch::new();
        let span = obs::batch_span(batch.id());
        self.run_batch_inner(&mut batch).instrument(span).await?;
        Ok(batch)
    }

    async fn run_batch_inner(&mut self, batch: &mut Batch) -> PipelineResult<()> {
        batch.start()?;
        obs::emit_batch_started(batch.id(), self.config.posts_per_batch);

        if let Err(cause) = self.process(batch).await {
            batch.fail(cause.to_string())?;
            obs::emit_batch_failed(batch.id(), &cause);
            self.stats.record_failed(batch);
            return Err(PipelineError::BatchFailed {
                batch_id: batch.id(),
                batch: Box::new(batch.clone()),
                source: Box::new(cause),
            });
        }

        let batch_id = batch.id();
        let metrics = batch.complete()?;
        obs::emit_batch_finished(batch_id, metrics);
        self.stats.record_completed(batch);
        self.notify_sinks(batch).await;
        Ok(())
    }

    async fn process(&self, batch: &mut Batch) -> PipelineResult<()> {
        let requested = self.config.posts_per_batch;
        let initial = self.generate(batch, requested, None).await?;
        self.resolve_range(batch, initial).await?;

        let approved = batch.approved_count();
        let approval_rate = batch.approval_rate();
        if approval_rate >= self.config.target_approval_rate {
            info!(approval_rate, target = self.config.target_approval_rate, "target met");
            return Ok(());
        }

        let patterns = FailurePatterns::from_posts(batch.rejected_posts());
        let count = regeneration_count(requested, approved);
        obs::emit_regeneration_requested(
            batch.id(),
            approval_rate,
            self.config.target_approval_rate,
            count,
            &patterns.avoid_summary(),
        );

        let added = self.generate(batch, count, Some(&patterns)).await?;
        batch.mark_regenerated();
        self.resolve_range(batch, added).await
    }

    async fn generate(
        &self,
        batch: &mut Batch,
        count: usize,
        avoid: Option<&FailurePatterns>,
    ) -> PipelineResult<Range<usize>> {
        let drafts = self.source.generate(batch.id(), count, avoid).await?;
        if drafts.len() != count {
            warn!(
                requested = count,
                received = drafts.len(),
                "content source returned a different number of drafts"
            );
        }
        batch
            .append_drafts(drafts, self.config.max_revisions)
            .map_err(|e| ContentError::InvalidDraft(e).into())
    }

    async fn resolve_range(&self, batch: &mut Batch, range: Range<usize>) -> PipelineResult<()> {
        for index in range {
            if let Some(post) = batch.post_mut(index) {
                self.controller.resolve(post).await?;
            }
        }
        Ok(())
    }

    async fn notify_sinks(&self, batch: &Batch) {
        for sink in &self.sinks {
            if let Err(e) = sink.on_batch_completed(batch).await {
                obs::emit_sink_error(sink.name(), batch.id(), &e);
            }
        }
    }

    /// Run batches until one reaches the target approval rate or
    /// `max_total_attempts` batches have run.
    ///
    /// A failed batch stops the loop and is returned as the error. Lifetime
    /// stats are flushed either way.
    pub async fn run_until_target(&mut self) -> PipelineResult<RunReport> {
        let mut batches = Vec::new();
        let mut target_met = false;

        for attempt in 1..=self.config.max_total_attempts {
            let batch = match self.run_batch().await {
                Ok(batch) => batch,
                Err(e) => {
                    self.stats.flush();
                    return Err(e);
                }
            };
            target_met = batch.metrics().approval_rate >= self.config.target_approval_rate;
            info!(
                attempt,
                max_attempts = self.config.max_total_attempts,
                approval_rate = batch.metrics().approval_rate,
                target_met,
                "batch attempt finished"
            );
            batches.push(batch);
            if target_met {
                break;
            }
        }

        self.stats.flush();
        Ok(RunReport {
            batches,
            target_met,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::Validator;
    use crate::fakes::{EchoSynthesizer, ScriptedContentSource, ScriptedValidator, SuffixReviser};
    use crate::pool::ValidatorPool;
    use std::io;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    #[test]
    fn test_regeneration_count_bounds() {
        assert_eq!(regeneration_count(5, 1), 4);
        assert_eq!(regeneration_count(5, 0), 5);
        assert_eq!(regeneration_count(5, 5), 1);
        assert_eq!(regeneration_count(3, 7), 1);
    }

    #[tokio::test]
    async fn test_failed_run_still_flushes_stats() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let validator: Arc<dyn Validator> = Arc::new(ScriptedValidator::new("judge", vec![9.0]));
        let controller = PostLifecycleController::new(
            ValidatorPool::new(vec![validator]),
            Arc::new(EchoSynthesizer::new()),
            Arc::new(SuffixReviser::new()),
            1,
        );
        let config = PipelineConfig {
            posts_per_batch: 2,
            min_approvals_required: 1,
            ..PipelineConfig::default()
        };
        let mut coordinator = BatchCoordinator::new(
            config,
            Arc::new(ScriptedContentSource::new().fail_on_call(1)),
            controller,
        )
        .unwrap();

        let err = coordinator.run_until_target().await.unwrap_err();

        assert!(err.is_content_failure());
        assert_eq!(coordinator.stats().batches_failed(), 1);
        assert!(logs.contents().contains("batches_failed=1"));
    }
}
