//! Validator verdicts and round snapshots.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scores at or above this value count as an approval.
pub const APPROVAL_THRESHOLD: f64 = 7.0;

/// Lowest possible score.
pub const MIN_SCORE: f64 = 0.0;

/// Highest possible score.
pub const MAX_SCORE: f64 = 10.0;

/// `criteria_breakdown` key carrying the reason a validator failed internally.
pub const ERROR_MARKER: &str = "error";

/// One validator's verdict on a post's current content.
///
/// Immutable once built: `approved` is always derived from `score`, and the
/// builder methods consume `self`. Deserialization recomputes `approved`, so a
/// stored record can never carry an inconsistent flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ScoreRecord")]
pub struct ValidationScore {
    agent_name: String,
    score: f64,
    approved: bool,
    feedback: String,
    criteria_breakdown: BTreeMap<String, serde_json::Value>,
    scored_at: DateTime<Utc>,
}

impl ValidationScore {
    /// Build a score, clamping into `0..=10`. NaN is treated as zero.
    pub fn new(agent_name: impl Into<String>, score: f64, feedback: impl Into<String>) -> Self {
        let score = if score.is_nan() {
            MIN_SCORE
        } else {
            score.clamp(MIN_SCORE, MAX_SCORE)
        };
        Self {
            agent_name: agent_name.into(),
            score,
            approved: score >= APPROVAL_THRESHOLD,
            feedback: feedback.into(),
            criteria_breakdown: BTreeMap::new(),
            scored_at: Utc::now(),
        }
    }

    /// Encoded failure: zero score, not approved, reason under [`ERROR_MARKER`].
    pub fn failure(agent_name: impl Into<String>, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::new(agent_name, MIN_SCORE, String::new())
            .with_criterion(ERROR_MARKER, serde_json::Value::String(reason))
    }

    /// Attach one diagnostic criterion.
    pub fn with_criterion(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.criteria_breakdown.insert(key.into(), value.into());
        self
    }

    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn approved(&self) -> bool {
        self.approved
    }

    pub fn feedback(&self) -> &str {
        &self.feedback
    }

    pub fn criteria_breakdown(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.criteria_breakdown
    }

    pub fn scored_at(&self) -> DateTime<Utc> {
        self.scored_at
    }

    /// `true` when this score encodes an internal validator failure.
    pub fn is_failure(&self) -> bool {
        self.criteria_breakdown.contains_key(ERROR_MARKER)
    }

    /// Numeric criteria only; the error marker and other non-numeric
    /// diagnostics are skipped.
    pub fn numeric_criteria(&self) -> impl Iterator<Item = (&str, f64)> {
        self.criteria_breakdown
            .iter()
            .filter_map(|(k, v)| v.as_f64().map(|n| (k.as_str(), n)))
    }
}

#[derive(Deserialize)]
struct ScoreRecord {
    agent_name: String,
    score: f64,
    #[serde(default)]
    feedback: String,
    #[serde(default)]
    criteria_breakdown: BTreeMap<String, serde_json::Value>,
    #[serde(default = "Utc::now")]
    scored_at: DateTime<Utc>,
}

impl From<ScoreRecord> for ValidationScore {
    fn from(record: ScoreRecord) -> Self {
        let mut score = ValidationScore::new(record.agent_name, record.score, record.feedback);
        score.criteria_breakdown = record.criteria_breakdown;
        score.scored_at = record.scored_at;
        score
    }
}

/// Number of approving scores in a set.
pub fn approval_count(scores: &[ValidationScore]) -> usize {
    scores.iter().filter(|s| s.approved()).count()
}

/// Mean score of a set, `0.0` when empty.
pub fn average_score(scores: &[ValidationScore]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    scores.iter().map(ValidationScore::score).sum::<f64>() / scores.len() as f64
}

/// Immutable snapshot of one validation round.
///
/// `approval_count` and `approved` are derived from the scores and the
/// required count, both at construction and on deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ScoreRoundRecord")]
pub struct ScoreRound {
    round: u32,
    content_digest: String,
    scores: Vec<ValidationScore>,
    approval_count: usize,
    required: usize,
    approved: bool,
    scored_at: DateTime<Utc>,
}

impl ScoreRound {
    pub(crate) fn new(
        round: u32,
        content_digest: String,
        scores: Vec<ValidationScore>,
        required: usize,
    ) -> Self {
        let approvals = approval_count(&scores);
        Self {
            round,
            content_digest,
            scores,
            approval_count: approvals,
            required,
            approved: approvals >= required,
            scored_at: Utc::now(),
        }
    }

    /// 1-based round number within the post's lifetime.
    pub fn round(&self) -> u32 {
        self.round
    }

    /// Digest of the content that was scored.
    pub fn content_digest(&self) -> &str {
        &self.content_digest
    }

    /// Every validator's score, in validator registration order.
    pub fn scores(&self) -> &[ValidationScore] {
        &self.scores
    }

    pub fn approval_count(&self) -> usize {
        self.approval_count
    }

    /// Approvals that were required.
    pub fn required(&self) -> usize {
        self.required
    }

    /// Outcome of the approval predicate.
    pub fn approved(&self) -> bool {
        self.approved
    }

    pub fn scored_at(&self) -> DateTime<Utc> {
        self.scored_at
    }

    pub fn average_score(&self) -> f64 {
        average_score(&self.scores)
    }
}

#[derive(Deserialize)]
struct ScoreRoundRecord {
    round: u32,
    content_digest: String,
    scores: Vec<ValidationScore>,
    required: usize,
    #[serde(default = "Utc::now")]
    scored_at: DateTime<Utc>,
}

impl From<ScoreRoundRecord> for ScoreRound {
    fn from(record: ScoreRoundRecord) -> Self {
        let mut round = ScoreRound::new(record.round, record.content_digest, record.scores, record.required);
        round.scored_at = record.scored_at;
        round
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approved_is_derived_from_threshold() {
        assert!(ValidationScore::new("a", 7.0, "").approved());
        assert!(ValidationScore::new("a", 9.5, "").approved());
        assert!(!ValidationScore::new("a", 6.99, "").approved());
    }

    #[test]
    fn test_score_is_clamped() {
        assert_eq!(ValidationScore::new("a", 14.0, "").score(), 10.0);
        assert_eq!(ValidationScore::new("a", -3.0, "").score(), 0.0);
        assert_eq!(ValidationScore::new("a", f64::NAN, "").score(), 0.0);
    }

    #[test]
    fn test_failure_encodes_error_marker() {
        let s = ValidationScore::failure("brand", "upstream timeout");
        assert_eq!(s.score(), 0.0);
        assert!(!s.approved());
        assert!(s.is_failure());
        assert_eq!(
            s.criteria_breakdown().get(ERROR_MARKER),
            Some(&serde_json::json!("upstream timeout"))
        );
        assert_eq!(s.numeric_criteria().count(), 0);
    }

    #[test]
    fn test_deserialize_recomputes_approved() {
        let raw = serde_json::json!({
            "agent_name": "tone",
            "score": 4.0,
            "approved": true,
            "feedback": "flat",
            "criteria_breakdown": { "clarity": 3.0 },
        });
        let s: ValidationScore = serde_json::from_value(raw).unwrap();
        assert!(!s.approved());
        assert_eq!(s.numeric_criteria().collect::<Vec<_>>(), vec![("clarity", 3.0)]);
    }

    #[test]
    fn test_approval_count_and_average() {
        let scores = vec![
            ValidationScore::new("a", 8.0, ""),
            ValidationScore::new("b", 6.0, ""),
            ValidationScore::new("c", 7.5, ""),
        ];
        assert_eq!(approval_count(&scores), 2);
        assert!((average_score(&scores) - 7.1666).abs() < 1e-3);
        assert_eq!(average_score(&[]), 0.0);
    }

    #[test]
    fn test_round_deserialize_recomputes_outcome() {
        let round = ScoreRound::new(
            1,
            "abc".into(),
            vec![ValidationScore::new("a", 8.0, ""), ValidationScore::new("b", 3.0, "")],
            2,
        );
        assert_eq!(round.approval_count(), 1);
        assert!(!round.approved());

        let mut raw = serde_json::to_value(&round).unwrap();
        raw["approval_count"] = serde_json::json!(2);
        raw["approved"] = serde_json::json!(true);
        let back: ScoreRound = serde_json::from_value(raw).unwrap();

        assert_eq!(back, round);
        assert!(!back.approved());
    }
}
