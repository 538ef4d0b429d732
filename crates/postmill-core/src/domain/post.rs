//! The post under evaluation and its validation/revision state machine.
//!
//! All state changes go through methods that check the current
//! [`PostStatus`], and deserialization re-checks a stored record before
//! handing out a [`Post`], so the invariants below hold for any post
//! reachable from safe code:
//!
//! - `revision_count <= max_revisions`
//! - `Rejected` only when `revision_count == max_revisions` and the latest
//!   round did not approve
//! - `Approved` only when the latest round satisfied the approval predicate

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::digest::content_digest;
use super::draft::{PostDraft, Usage};
use super::error::{DomainError, Result};
use super::instruction::Revision;
use super::score::{average_score, ScoreRound, ValidationScore};

/// Minimum post length in characters.
pub const MIN_CONTENT_CHARS: usize = 50;

/// Maximum post length in characters.
pub const MAX_CONTENT_CHARS: usize = 3000;

/// Maximum number of hashtags on a post.
pub const MAX_HASHTAGS: usize = 10;

/// Revision budget used when none is configured.
pub const DEFAULT_MAX_REVISIONS: u32 = 2;

/// Lifecycle status of a post.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostStatus {
    Generated,
    Validating,
    Approved,
    RevisionNeeded,
    Revised,
    Rejected,
}

impl PostStatus {
    /// `Approved` and `Rejected` are final.
    pub fn is_terminal(self) -> bool {
        matches!(self, PostStatus::Approved | PostStatus::Rejected)
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PostStatus::Generated => "GENERATED",
            PostStatus::Validating => "VALIDATING",
            PostStatus::Approved => "APPROVED",
            PostStatus::RevisionNeeded => "REVISION_NEEDED",
            PostStatus::Revised => "REVISED",
            PostStatus::Rejected => "REJECTED",
        };
        write!(f, "{s}")
    }
}

/// Whether a revision attempt actually changed the post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RevisionOutcome {
    Applied,
    /// The reviser gave up or returned unusable content. The attempt still
    /// consumed one unit of the revision budget.
    Failed { reason: String },
}

/// One entry of the append-only revision log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionRecord {
    /// 1-based, strictly increasing.
    pub revision_number: u32,

    /// Content before this revision was applied.
    pub previous_content: String,

    pub timestamp: DateTime<Utc>,

    /// Mean validator score of the round that triggered the revision.
    pub average_score_before: f64,

    pub outcome: RevisionOutcome,
}

/// Kind of side output attached to a post.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    Link,
}

/// A side output (generated image, clip, link preview) attached to a post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAttachment {
    pub kind: MediaKind,

    /// URL, storage key or path understood by the producer.
    pub reference: String,

    pub metadata: serde_json::Value,

    pub attached_at: DateTime<Utc>,
}

/// A unit of content under evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PostRecord")]
pub struct Post {
    id: Uuid,
    batch_id: Uuid,
    post_number: usize,
    content: String,
    hashtags: Vec<String>,
    target_audience: String,
    cultural_reference: Option<String>,
    status: PostStatus,
    validation_scores: Vec<ValidationScore>,
    score_rounds: Vec<ScoreRound>,
    revision_count: u32,
    max_revisions: u32,
    original_content: Option<String>,
    revision_history: Vec<RevisionRecord>,
    processing_time_ms: Option<u64>,
    usage: Usage,
    media: Vec<MediaAttachment>,
    created_at: DateTime<Utc>,
}

impl Post {
    /// Build a `Generated` post from a draft.
    ///
    /// Fails when the content is outside `50..=3000` characters or the draft
    /// carries more than ten distinct hashtags.
    pub fn from_draft(
        batch_id: Uuid,
        post_number: usize,
        draft: PostDraft,
        max_revisions: u32,
    ) -> Result<Self> {
        check_content(&draft.content)?;
        let hashtags = normalize_hashtags(draft.hashtags)?;

        Ok(Self {
            id: Uuid::new_v4(),
            batch_id,
            post_number,
            content: draft.content,
            hashtags,
            target_audience: draft.target_audience,
            cultural_reference: draft.cultural_reference,
            status: PostStatus::Generated,
            validation_scores: Vec::new(),
            score_rounds: Vec::new(),
            revision_count: 0,
            max_revisions,
            original_content: None,
            revision_history: Vec::new(),
            processing_time_ms: None,
            usage: draft.usage,
            media: Vec::new(),
            created_at: Utc::now(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn batch_id(&self) -> Uuid {
        self.batch_id
    }

    pub fn post_number(&self) -> usize {
        self.post_number
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn hashtags(&self) -> &[String] {
        &self.hashtags
    }

    pub fn target_audience(&self) -> &str {
        &self.target_audience
    }

    pub fn cultural_reference(&self) -> Option<&str> {
        self.cultural_reference.as_deref()
    }

    pub fn status(&self) -> PostStatus {
        self.status
    }

    /// Scores of the most recent round; empty while a round is in flight or
    /// right after a revision.
    pub fn validation_scores(&self) -> &[ValidationScore] {
        &self.validation_scores
    }

    /// Every round ever scored, oldest first.
    pub fn score_rounds(&self) -> &[ScoreRound] {
        &self.score_rounds
    }

    pub fn latest_round(&self) -> Option<&ScoreRound> {
        self.score_rounds.last()
    }

    pub fn revision_count(&self) -> u32 {
        self.revision_count
    }

    pub fn max_revisions(&self) -> u32 {
        self.max_revisions
    }

    pub fn original_content(&self) -> Option<&str> {
        self.original_content.as_deref()
    }

    pub fn revision_history(&self) -> &[RevisionRecord] {
        &self.revision_history
    }

    pub fn processing_time_ms(&self) -> Option<u64> {
        self.processing_time_ms
    }

    pub fn usage(&self) -> Usage {
        self.usage
    }

    pub fn media(&self) -> &[MediaAttachment] {
        &self.media
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Approvals in the latest round (0 before any round).
    pub fn approval_count(&self) -> usize {
        self.latest_round().map_or(0, ScoreRound::approval_count)
    }

    /// Mean score of the latest round (0 before any round).
    pub fn average_score(&self) -> f64 {
        self.latest_round().map_or(0.0, ScoreRound::average_score)
    }

    /// `true` while revision budget remains.
    pub fn can_revise(&self) -> bool {
        self.revision_count < self.max_revisions
    }

    /// Enter a validation round. Allowed from `Generated` or `Revised`.
    pub fn begin_validation(&mut self) -> Result<()> {
        match self.status {
            PostStatus::Generated | PostStatus::Revised => {
                self.validation_scores.clear();
                self.status = PostStatus::Validating;
                Ok(())
            }
            from => Err(self.transition_error(from, PostStatus::Validating)),
        }
    }

    /// Record the full score set of the round in flight.
    ///
    /// Replaces `validation_scores` and appends an immutable [`ScoreRound`].
    pub fn record_round(
        &mut self,
        scores: Vec<ValidationScore>,
        min_approvals_required: usize,
    ) -> Result<&ScoreRound> {
        if self.status != PostStatus::Validating {
            return Err(self.transition_error(self.status, PostStatus::Validating));
        }

        let round = ScoreRound::new(
            self.score_rounds.len() as u32 + 1,
            content_digest(&self.content),
            scores.clone(),
            min_approvals_required,
        );
        self.validation_scores = scores;
        self.score_rounds.push(round);
        Ok(&self.score_rounds[self.score_rounds.len() - 1])
    }

    /// Terminal success. The latest round must have approved.
    pub fn approve(&mut self, elapsed: Duration) -> Result<()> {
        let latest_approved = self.latest_round().is_some_and(ScoreRound::approved);
        if self.status != PostStatus::Validating || !latest_approved {
            return Err(self.transition_error(self.status, PostStatus::Approved));
        }
        self.status = PostStatus::Approved;
        self.processing_time_ms = Some(duration_ms(elapsed));
        Ok(())
    }

    /// Move a non-approved post into `RevisionNeeded`.
    pub fn request_revision(&mut self) -> Result<()> {
        let latest_approved = self.latest_round().is_some_and(ScoreRound::approved);
        if self.status != PostStatus::Validating || latest_approved {
            return Err(self.transition_error(self.status, PostStatus::RevisionNeeded));
        }
        if !self.can_revise() {
            return Err(DomainError::RevisionBudgetExhausted {
                post: self.id,
                max: self.max_revisions,
            });
        }
        self.status = PostStatus::RevisionNeeded;
        Ok(())
    }

    /// Apply a reviser's result and move to `Revised`.
    ///
    /// Both successful and failed attempts consume budget and are logged in
    /// `revision_history`; only a successful one replaces the content.
    /// Revised content that breaks the content bounds counts as a failure.
    pub fn apply_revision(&mut self, revision: Revision) -> Result<&RevisionRecord> {
        if self.status != PostStatus::RevisionNeeded {
            return Err(self.transition_error(self.status, PostStatus::Revised));
        }
        if !self.can_revise() {
            return Err(DomainError::RevisionBudgetExhausted {
                post: self.id,
                max: self.max_revisions,
            });
        }

        let average_score_before = average_score(&self.validation_scores);
        let previous_content = self.content.clone();

        let outcome = match revision {
            Revision::Revised {
                content,
                hashtags,
                usage,
            } => {
                self.usage += usage;
                let checked = check_content(&content)
                    .and_then(|()| hashtags.map(normalize_hashtags).transpose());
                match checked {
                    Ok(new_hashtags) => {
                        self.content = content;
                        if let Some(tags) = new_hashtags {
                            self.hashtags = tags;
                        }
                        RevisionOutcome::Applied
                    }
                    Err(e) => RevisionOutcome::Failed {
                        reason: e.to_string(),
                    },
                }
            }
            Revision::Unchanged { reason } => RevisionOutcome::Failed { reason },
        };

        if self.original_content.is_none() {
            self.original_content = Some(previous_content.clone());
        }
        self.revision_count += 1;
        self.revision_history.push(RevisionRecord {
            revision_number: self.revision_count,
            previous_content,
            timestamp: Utc::now(),
            average_score_before,
            outcome,
        });
        self.validation_scores.clear();
        self.status = PostStatus::Revised;

        Ok(&self.revision_history[self.revision_history.len() - 1])
    }

    /// Terminal failure. Only valid once the budget is spent and the latest
    /// round did not approve.
    pub fn reject(&mut self, elapsed: Duration) -> Result<()> {
        let latest_approved = self.latest_round().is_some_and(ScoreRound::approved);
        if self.status != PostStatus::Validating || latest_approved {
            return Err(self.transition_error(self.status, PostStatus::Rejected));
        }
        if self.can_revise() {
            return Err(self.transition_error(self.status, PostStatus::Rejected));
        }
        self.status = PostStatus::Rejected;
        self.processing_time_ms = Some(duration_ms(elapsed));
        Ok(())
    }

    /// Attach a side output.
    pub fn attach_media(
        &mut self,
        kind: MediaKind,
        reference: impl Into<String>,
        metadata: serde_json::Value,
    ) -> &MediaAttachment {
        self.media.push(MediaAttachment {
            kind,
            reference: reference.into(),
            metadata,
            attached_at: Utc::now(),
        });
        &self.media[self.media.len() - 1]
    }

    fn transition_error(&self, from: PostStatus, to: PostStatus) -> DomainError {
        DomainError::InvalidTransition {
            post: self.id,
            from,
            to,
        }
    }
}

/// Wire form of [`Post`]; only becomes a post through [`Post::try_from`].
#[derive(Deserialize)]
struct PostRecord {
    id: Uuid,
    batch_id: Uuid,
    post_number: usize,
    content: String,
    #[serde(default)]
    hashtags: Vec<String>,
    target_audience: String,
    #[serde(default)]
    cultural_reference: Option<String>,
    status: PostStatus,
    #[serde(default)]
    validation_scores: Vec<ValidationScore>,
    #[serde(default)]
    score_rounds: Vec<ScoreRound>,
    revision_count: u32,
    max_revisions: u32,
    #[serde(default)]
    original_content: Option<String>,
    #[serde(default)]
    revision_history: Vec<RevisionRecord>,
    #[serde(default)]
    processing_time_ms: Option<u64>,
    #[serde(default)]
    usage: Usage,
    #[serde(default)]
    media: Vec<MediaAttachment>,
    created_at: DateTime<Utc>,
}

impl TryFrom<PostRecord> for Post {
    type Error = DomainError;

    fn try_from(record: PostRecord) -> Result<Self> {
        check_content(&record.content)?;
        let post = Post {
            id: record.id,
            batch_id: record.batch_id,
            post_number: record.post_number,
            content: record.content,
            hashtags: normalize_hashtags(record.hashtags)?,
            target_audience: record.target_audience,
            cultural_reference: record.cultural_reference,
            status: record.status,
            validation_scores: record.validation_scores,
            score_rounds: record.score_rounds,
            revision_count: record.revision_count,
            max_revisions: record.max_revisions,
            original_content: record.original_content,
            revision_history: record.revision_history,
            processing_time_ms: record.processing_time_ms,
            usage: record.usage,
            media: record.media,
            created_at: record.created_at,
        };
        post.check_record()?;
        Ok(post)
    }
}

impl Post {
    /// Checks a deserialized post against the invariants the transition
    /// methods maintain.
    fn check_record(&self) -> Result<()> {
        let revisions = self.revision_count as usize;
        let rounds = self.score_rounds.len();

        if self.revision_count > self.max_revisions {
            return Err(self.inconsistent(format!(
                "revision_count {} exceeds max_revisions {}",
                self.revision_count, self.max_revisions
            )));
        }
        let numbered = self
            .revision_history
            .iter()
            .enumerate()
            .all(|(i, r)| r.revision_number as usize == i + 1);
        if self.revision_history.len() != revisions || !numbered {
            return Err(self.inconsistent(format!(
                "revision history does not hold revisions 1..={revisions}"
            )));
        }
        if self.original_content.is_some() != (revisions > 0) {
            return Err(self.inconsistent("original_content must be set exactly when revised"));
        }
        let sequential = self
            .score_rounds
            .iter()
            .enumerate()
            .all(|(i, r)| r.round() as usize == i + 1);
        if !sequential || !(revisions..=revisions + 1).contains(&rounds) {
            return Err(self.inconsistent(format!(
                "{rounds} score rounds do not fit {revisions} revisions"
            )));
        }
        if !self.validation_scores.is_empty()
            && self.latest_round().map(ScoreRound::scores) != Some(&self.validation_scores[..])
        {
            return Err(self.inconsistent("current scores differ from the latest round"));
        }

        let scored = rounds == revisions + 1;
        let latest_approved = self.latest_round().is_some_and(ScoreRound::approved);
        match self.status {
            PostStatus::Generated if rounds > 0 || revisions > 0 => {
                Err(self.inconsistent("GENERATED post carries rounds or revisions"))
            }
            PostStatus::Revised if revisions == 0 || scored => {
                Err(self.inconsistent("REVISED post has no unscored revision"))
            }
            PostStatus::Approved | PostStatus::Rejected | PostStatus::RevisionNeeded
                if !scored =>
            {
                Err(DomainError::NotScored { post: self.id })
            }
            PostStatus::Approved if !latest_approved => {
                Err(self.inconsistent("APPROVED but the latest round did not approve"))
            }
            PostStatus::Rejected if latest_approved || self.can_revise() => {
                Err(self.inconsistent("REJECTED needs a failing latest round and no budget left"))
            }
            PostStatus::RevisionNeeded if latest_approved || !self.can_revise() => {
                Err(self.inconsistent("REVISION_NEEDED needs a failing latest round and budget left"))
            }
            _ => Ok(()),
        }
    }

    fn inconsistent(&self, reason: impl Into<String>) -> DomainError {
        DomainError::InconsistentRecord {
            id: self.id,
            reason: reason.into(),
        }
    }
}

fn check_content(content: &str) -> Result<()> {
    let actual = content.chars().count();
    if !(MIN_CONTENT_CHARS..=MAX_CONTENT_CHARS).contains(&actual) {
        return Err(DomainError::ContentLength {
            min: MIN_CONTENT_CHARS,
            max: MAX_CONTENT_CHARS,
            actual,
        });
    }
    Ok(())
}

/// Trim, drop empties and case-insensitive duplicates, keep first-seen order.
fn normalize_hashtags(hashtags: Vec<String>) -> Result<Vec<String>> {
    let mut out: Vec<String> = Vec::with_capacity(hashtags.len());
    for tag in hashtags {
        let tag = tag.trim();
        if tag.is_empty() || out.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            continue;
        }
        out.push(tag.to_string());
    }
    if out.len() > MAX_HASHTAGS {
        return Err(DomainError::TooManyHashtags {
            max: MAX_HASHTAGS,
            actual: out.len(),
        });
    }
    Ok(out)
}

fn duration_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
