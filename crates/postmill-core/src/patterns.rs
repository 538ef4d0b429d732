//! Failure-pattern analysis over rejected posts.
//!
//! The summary is handed to the content source as an "avoid" hint on the
//! regeneration pass.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::domain::{Post, PostStatus};

/// Feedback lines kept in a summary.
pub const MAX_FEEDBACK_PATTERNS: usize = 5;

/// Criteria scoring strictly below this are counted as weak.
pub const WEAK_CRITERION_THRESHOLD: f64 = 5.0;

/// Aggregate of why rejected posts failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FailurePatterns {
    /// Most frequent distinct feedback from non-approving scores, most
    /// frequent first; ties keep first-seen order.
    pub common_feedback: Vec<String>,

    /// Criterion -> number of scores where it fell below the weak threshold.
    pub weak_criteria: BTreeMap<String, usize>,

    pub cultural_references: BTreeSet<String>,

    pub target_audiences: BTreeSet<String>,

    /// Rejected posts the summary was built from.
    pub rejected_posts: usize,
}

impl FailurePatterns {
    /// Analyse the `Rejected` posts among `posts`; other posts are ignored.
    pub fn from_posts<'a>(posts: impl IntoIterator<Item = &'a Post>) -> Self {
        let mut patterns = FailurePatterns::default();
        let mut feedback_counts: HashMap<String, (usize, usize)> = HashMap::new();

        for post in posts
            .into_iter()
            .filter(|p| p.status() == PostStatus::Rejected)
        {
            patterns.rejected_posts += 1;

            for score in post.validation_scores() {
                if !score.approved() {
                    let feedback = score.feedback().trim();
                    if !feedback.is_empty() {
                        let first_seen = feedback_counts.len();
                        feedback_counts
                            .entry(feedback.to_string())
                            .or_insert((0, first_seen))
                            .0 += 1;
                    }
                }

                for (criterion, value) in score.numeric_criteria() {
                    if value < WEAK_CRITERION_THRESHOLD {
                        *patterns
                            .weak_criteria
                            .entry(criterion.to_string())
                            .or_insert(0) += 1;
                    }
                }
            }

            if let Some(reference) = post.cultural_reference() {
                patterns.cultural_references.insert(reference.to_string());
            }
            patterns
                .target_audiences
                .insert(post.target_audience().to_string());
        }

        let mut ranked: Vec<(String, (usize, usize))> = feedback_counts.into_iter().collect();
        ranked.sort_by(|(_, (ca, sa)), (_, (cb, sb))| cb.cmp(ca).then(sa.cmp(sb)));
        patterns.common_feedback = ranked
            .into_iter()
            .take(MAX_FEEDBACK_PATTERNS)
            .map(|(feedback, _)| feedback)
            .collect();

        patterns
    }

    pub fn is_empty(&self) -> bool {
        self.rejected_posts == 0
    }

    /// Weak criteria, most frequent first.
    pub fn weakest_criteria(&self) -> Vec<(&str, usize)> {
        let mut criteria: Vec<(&str, usize)> = self
            .weak_criteria
            .iter()
            .map(|(k, v)| (k.as_str(), *v))
            .collect();
        criteria.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        criteria
    }

    /// Plain-text rendering for generators that take a prompt hint.
    pub fn avoid_summary(&self) -> String {
        if self.is_empty() {
            return String::new();
        }

        let mut lines = vec![format!(
            "{} earlier post(s) were rejected.",
            self.rejected_posts
        )];
        if !self.common_feedback.is_empty() {
            lines.push(format!("Recurring feedback: {}", self.common_feedback.join("; ")));
        }
        let weak = self.weakest_criteria();
        if !weak.is_empty() {
            let rendered: Vec<String> = weak.iter().map(|(k, n)| format!("{k} ({n})")).collect();
            lines.push(format!("Weak criteria: {}", rendered.join(", ")));
        }
        if !self.cultural_references.is_empty() {
            lines.push(format!(
                "Avoid references: {}",
                join_set(&self.cultural_references)
            ));
        }
        if !self.target_audiences.is_empty() {
            lines.push(format!(
                "Audiences that under-performed: {}",
                join_set(&self.target_audiences)
            ));
        }
        lines.join("\n")
    }
}

fn join_set(set: &BTreeSet<String>) -> String {
    set.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}
