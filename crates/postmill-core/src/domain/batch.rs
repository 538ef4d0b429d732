//! A bounded batch run and its status machine.

use std::ops::Range;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::draft::PostDraft;
use super::error::{DomainError, Result};
use super::metrics::BatchMetrics;
use super::post::{Post, PostStatus};

/// Status of a batch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BatchStatus::Pending => "pending",
            BatchStatus::Processing => "processing",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// A bounded run: an append-only list of posts plus derived metrics.
///
/// Deserialization checks post ownership and numbering and recomputes the
/// metrics of a completed batch from its posts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BatchRecord")]
pub struct Batch {
    id: Uuid,
    posts: Vec<Post>,
    status: BatchStatus,
    metrics: BatchMetrics,
    error: Option<String>,
    regenerated: bool,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl Default for Batch {
    fn default() -> Self {
        Self::new()
    }
}

impl Batch {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            posts: Vec::new(),
            status: BatchStatus::Pending,
            metrics: BatchMetrics::default(),
            error: None,
            regenerated: false,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn status(&self) -> BatchStatus {
        self.status
    }

    /// Default until [`Batch::complete`] runs.
    pub fn metrics(&self) -> &BatchMetrics {
        &self.metrics
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether a regeneration pass added posts to this batch.
    pub fn regenerated(&self) -> bool {
        self.regenerated
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn approved_count(&self) -> usize {
        self.count_status(PostStatus::Approved)
    }

    pub fn rejected_count(&self) -> usize {
        self.count_status(PostStatus::Rejected)
    }

    /// Live approval rate over the posts appended so far.
    pub fn approval_rate(&self) -> f64 {
        if self.posts.is_empty() {
            0.0
        } else {
            self.approved_count() as f64 / self.posts.len() as f64
        }
    }

    pub fn rejected_posts(&self) -> impl Iterator<Item = &Post> {
        self.posts
            .iter()
            .filter(|p| p.status() == PostStatus::Rejected)
    }

    pub(crate) fn post_mut(&mut self, index: usize) -> Option<&mut Post> {
        self.posts.get_mut(index)
    }

    /// `Pending` -> `Processing`.
    pub fn start(&mut self) -> Result<()> {
        self.transition(BatchStatus::Pending, BatchStatus::Processing)
    }

    /// Turn drafts into posts and append them, numbering from the current
    /// size. Every draft is checked before any is appended, so a bad draft
    /// leaves the batch untouched. Returns the index range of the new posts.
    pub fn append_drafts(&mut self, drafts: Vec<PostDraft>, max_revisions: u32) -> Result<Range<usize>> {
        if self.status != BatchStatus::Processing {
            return Err(DomainError::InvalidBatchTransition {
                batch: self.id,
                from: self.status,
                to: BatchStatus::Processing,
            });
        }

        let start = self.posts.len();
        let posts = drafts
            .into_iter()
            .enumerate()
            .map(|(offset, draft)| Post::from_draft(self.id, start + offset + 1, draft, max_revisions))
            .collect::<Result<Vec<_>>>()?;
        self.posts.extend(posts);
        Ok(start..self.posts.len())
    }

    pub(crate) fn mark_regenerated(&mut self) {
        self.regenerated = true;
    }

    /// `Processing` -> `Completed`, computing metrics exactly once.
    pub fn complete(&mut self) -> Result<&BatchMetrics> {
        self.transition(BatchStatus::Processing, BatchStatus::Completed)?;
        self.metrics = BatchMetrics::from_posts(&self.posts);
        self.completed_at = Some(Utc::now());
        Ok(&self.metrics)
    }

    /// `Processing` -> `Failed`. Posts already appended are kept; metrics stay
    /// at their default.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<()> {
        self.transition(BatchStatus::Processing, BatchStatus::Failed)?;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    fn transition(&mut self, expected: BatchStatus, to: BatchStatus) -> Result<()> {
        if self.status != expected {
            return Err(DomainError::InvalidBatchTransition {
                batch: self.id,
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    fn count_status(&self, status: PostStatus) -> usize {
        self.posts.iter().filter(|p| p.status() == status).count()
    }
}

#[derive(Deserialize)]
struct BatchRecord {
    id: Uuid,
    #[serde(default)]
    posts: Vec<Post>,
    status: BatchStatus,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    regenerated: bool,
    created_at: DateTime<Utc>,
    #[serde(default)]
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<BatchRecord> for Batch {
    type Error = DomainError;

    fn try_from(record: BatchRecord) -> Result<Self> {
        let id = record.id;
        let inconsistent = move |reason: String| DomainError::InconsistentRecord { id, reason };

        for (index, post) in record.posts.iter().enumerate() {
            if post.batch_id() != record.id {
                return Err(inconsistent(format!(
                    "post {} belongs to batch {}",
                    post.id(),
                    post.batch_id()
                )));
            }
            if post.post_number() != index + 1 {
                return Err(inconsistent(format!(
                    "post at position {} is numbered {}",
                    index + 1,
                    post.post_number()
                )));
            }
        }

        let finished = matches!(record.status, BatchStatus::Completed | BatchStatus::Failed);
        if finished != record.completed_at.is_some() {
            return Err(inconsistent(format!(
                "{} batch has completed_at {:?}",
                record.status, record.completed_at
            )));
        }
        if (record.status == BatchStatus::Failed) != record.error.is_some() {
            return Err(inconsistent(format!(
                "{} batch has error {:?}",
                record.status, record.error
            )));
        }
        if record.status == BatchStatus::Pending && !record.posts.is_empty() {
            return Err(inconsistent("pending batch already holds posts".to_string()));
        }

        let metrics = if record.status == BatchStatus::Completed {
            BatchMetrics::from_posts(&record.posts)
        } else {
            BatchMetrics::default()
        };

        Ok(Batch {
            id: record.id,
            posts: record.posts,
            status: record.status,
            metrics,
            error: record.error,
            regenerated: record.regenerated,
            created_at: record.created_at,
            completed_at: record.completed_at,
        })
    }
}
