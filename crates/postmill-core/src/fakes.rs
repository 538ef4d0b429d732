//! In-memory fakes for the collaborator traits (testing only)
//!
//! Deterministic stand-ins for content sources, validators, synthesizers,
//! revisers and sinks, so the lifecycle controller and batch coordinator can
//! be exercised without any model backend.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::collaborators::{BatchSink, ContentSource, FeedbackSynthesizer, Reviser, Validator};
use crate::domain::{Batch, Instruction, Post, PostDraft, Revision, Synthesis, ValidationScore};
use crate::error::ContentError;
use crate::patterns::FailurePatterns;

// ---------------------------------------------------------------------------
// Validators
// ---------------------------------------------------------------------------

/// Returns scripted scores, one per call; repeats the last one when the
/// script runs out.
#[derive(Debug)]
pub struct ScriptedValidator {
    name: String,
    script: Mutex<VecDeque<f64>>,
    last: Mutex<f64>,
    feedback: String,
    criteria: Vec<(String, f64)>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedValidator {
    pub fn new(name: impl Into<String>, script: Vec<f64>) -> Self {
        let name = name.into();
        Self {
            feedback: format!("{name} is not convinced"),
            name,
            script: Mutex::new(script.into()),
            last: Mutex::new(0.0),
            criteria: Vec::new(),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_feedback(mut self, feedback: impl Into<String>) -> Self {
        self.feedback = feedback.into();
        self
    }

    /// Attach a fixed numeric criterion to every score.
    pub fn with_criterion(mut self, key: impl Into<String>, value: f64) -> Self {
        self.criteria.push((key.into(), value));
        self
    }

    /// Sleep before answering (tokio time, so paused clocks apply).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Validator for ScriptedValidator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn score(&self, _post: &Post) -> ValidationScore {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let value = {
            let mut last = self.last.lock().unwrap();
            if let Some(next) = self.script.lock().unwrap().pop_front() {
                *last = next;
            }
            *last
        };

        let feedback = if value >= crate::domain::APPROVAL_THRESHOLD {
            String::new()
        } else {
            self.feedback.clone()
        };
        self.criteria.iter().fold(
            ValidationScore::new(&self.name, value, feedback),
            |score, (k, v)| score.with_criterion(k.clone(), *v),
        )
    }
}

/// Always reports an internal failure.
#[derive(Debug)]
pub struct FailingValidator {
    name: String,
    reason: String,
}

impl FailingValidator {
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Validator for FailingValidator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn score(&self, _post: &Post) -> ValidationScore {
        ValidationScore::failure(&self.name, &self.reason)
    }
}

/// Breaks the "never raise" contract by panicking.
#[derive(Debug)]
pub struct PanickingValidator {
    name: String,
}

impl PanickingValidator {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Validator for PanickingValidator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn score(&self, _post: &Post) -> ValidationScore {
        panic!("validator {} exploded", self.name)
    }
}

// ---------------------------------------------------------------------------
// Content sources
// ---------------------------------------------------------------------------

/// One recorded `generate` call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateCall {
    pub batch_id: Uuid,
    pub count: usize,
    pub avoid: Option<FailurePatterns>,
}

/// Audience used when [`ScriptedContentSource::with_audiences`] is given an
/// empty list.
pub const FALLBACK_AUDIENCE: &str = "general";

/// Produces numbered drafts, rotating through audiences and references, and
/// records every call.
#[derive(Debug)]
pub struct ScriptedContentSource {
    audiences: Vec<String>,
    references: Vec<Option<String>>,
    fail_on_call: Option<usize>,
    draft_limits: Vec<usize>,
    produced: AtomicUsize,
    calls: Mutex<Vec<GenerateCall>>,
}

impl Default for ScriptedContentSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedContentSource {
    pub fn new() -> Self {
        Self {
            audiences: vec!["founders".to_string(), "engineers".to_string()],
            references: vec![Some("moon landing".to_string()), None],
            fail_on_call: None,
            draft_limits: Vec::new(),
            produced: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_audiences<I, S>(mut self, audiences: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.audiences = audiences.into_iter().map(Into::into).collect();
        self
    }

    /// Fail the `n`th call (1-based) with a generation error.
    pub fn fail_on_call(mut self, n: usize) -> Self {
        self.fail_on_call = Some(n);
        self
    }

    /// Cap the draft count per call: call `i` (1-based) returns at most
    /// `limits[i - 1]` drafts. Calls past the end of the list are uncapped.
    pub fn with_draft_limits(mut self, limits: impl IntoIterator<Item = usize>) -> Self {
        self.draft_limits = limits.into_iter().collect();
        self
    }

    pub fn calls(&self) -> Vec<GenerateCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentSource for ScriptedContentSource {
    async fn generate(
        &self,
        batch_id: Uuid,
        count: usize,
        avoid: Option<&FailurePatterns>,
    ) -> Result<Vec<PostDraft>, ContentError> {
        let call_number = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(GenerateCall {
                batch_id,
                count,
                avoid: avoid.cloned(),
            });
            calls.len()
        };
        if self.fail_on_call == Some(call_number) {
            return Err(ContentError::Generation(format!(
                "scripted failure on call {call_number}"
            )));
        }

        let count = self
            .draft_limits
            .get(call_number - 1)
            .map_or(count, |&limit| count.min(limit));
        let drafts = (0..count)
            .map(|_| {
                let n = self.produced.fetch_add(1, Ordering::SeqCst);
                let audience = self
                    .audiences
                    .get(n % self.audiences.len().max(1))
                    .map_or(FALLBACK_AUDIENCE, String::as_str);
                let mut draft = PostDraft::new(
                    format!("Draft {n} for {audience}: a scripted post body that clears the length floor."),
                    audience,
                )
                .with_hashtags([format!("#draft{n}")]);
                if let Some(Some(reference)) = self.references.get(n % self.references.len().max(1)) {
                    draft = draft.with_cultural_reference(reference.clone());
                }
                draft
            })
            .collect();
        Ok(drafts)
    }
}

/// Always fails.
#[derive(Debug)]
pub struct FailingContentSource {
    reason: String,
}

impl FailingContentSource {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl ContentSource for FailingContentSource {
    async fn generate(
        &self,
        _batch_id: Uuid,
        _count: usize,
        _avoid: Option<&FailurePatterns>,
    ) -> Result<Vec<PostDraft>, ContentError> {
        Err(ContentError::Generation(self.reason.clone()))
    }
}

// ---------------------------------------------------------------------------
// Synthesizer and revisers
// ---------------------------------------------------------------------------

/// Wraps [`Instruction::fallback_for`]; tagged as a fallback when built with
/// [`EchoSynthesizer::falling_back`].
#[derive(Debug, Default)]
pub struct EchoSynthesizer {
    fallback: bool,
    calls: AtomicUsize,
}

impl EchoSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn falling_back() -> Self {
        Self {
            fallback: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedbackSynthesizer for EchoSynthesizer {
    async fn synthesize(&self, post: &Post) -> Synthesis {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let instruction = Instruction::fallback_for(post);
        if self.fallback {
            Synthesis::Fallback {
                instruction,
                reason: "scripted synthesizer outage".to_string(),
            }
        } else {
            Synthesis::Synthesized(instruction)
        }
    }
}

/// Appends a revision marker to the content.
#[derive(Debug, Default)]
pub struct SuffixReviser {
    calls: AtomicUsize,
}

impl SuffixReviser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Reviser for SuffixReviser {
    async fn revise(&self, post: &Post, _instruction: &Instruction) -> Revision {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Revision::revised(format!("{} [rev {}]", post.content(), post.revision_count() + 1))
    }
}

/// Never manages to revise.
#[derive(Debug, Default)]
pub struct FailingReviser {
    calls: AtomicUsize,
}

impl FailingReviser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Reviser for FailingReviser {
    async fn revise(&self, _post: &Post, _instruction: &Instruction) -> Revision {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Revision::unchanged("scripted reviser outage")
    }
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Records the ids of batches it was handed; optionally fails every call.
#[derive(Debug, Default)]
pub struct RecordingSink {
    fail: bool,
    seen: Mutex<Vec<Uuid>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen(&self) -> Vec<Uuid> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl BatchSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn on_batch_completed(&self, batch: &Batch) -> anyhow::Result<()> {
        self.seen.lock().unwrap().push(batch.id());
        if self.fail {
            anyhow::bail!("recording sink configured to fail");
        }
        Ok(())
    }
}
