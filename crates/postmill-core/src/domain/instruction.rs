//! Improvement instructions and the tagged results of synthesis and revision.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::draft::Usage;
use super::post::Post;

/// Generic priority used when no validator left usable feedback.
pub const FALLBACK_PRIORITY: &str = "Improve overall clarity and engagement";

/// How many feedback lines a fallback instruction carries.
const FALLBACK_ISSUE_LIMIT: usize = 3;

/// Structured instruction handed to a reviser.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub main_issues: Vec<String>,

    /// Criterion or aspect -> concrete change.
    pub specific_improvements: BTreeMap<String, String>,

    pub keep_these_elements: Vec<String>,

    pub priority_fix: String,
}

impl Instruction {
    /// Best-effort instruction built from the post's non-approving feedback.
    ///
    /// Synthesizers return this (wrapped in [`Synthesis::Fallback`]) when
    /// their own pipeline fails.
    pub fn fallback_for(post: &Post) -> Self {
        let mut main_issues: Vec<String> = Vec::new();
        for score in post.validation_scores().iter().filter(|s| !s.approved()) {
            let feedback = score.feedback().trim();
            if feedback.is_empty() || main_issues.iter().any(|i| i == feedback) {
                continue;
            }
            main_issues.push(feedback.to_string());
            if main_issues.len() == FALLBACK_ISSUE_LIMIT {
                break;
            }
        }

        let priority_fix = main_issues
            .first()
            .cloned()
            .unwrap_or_else(|| FALLBACK_PRIORITY.to_string());

        Self {
            main_issues,
            specific_improvements: BTreeMap::new(),
            keep_these_elements: post.hashtags().to_vec(),
            priority_fix,
        }
    }
}

/// Result of a feedback synthesizer call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Synthesis {
    Synthesized(Instruction),
    Fallback { instruction: Instruction, reason: String },
}

impl Synthesis {
    pub fn instruction(&self) -> &Instruction {
        match self {
            Synthesis::Synthesized(instruction) => instruction,
            Synthesis::Fallback { instruction, .. } => instruction,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Synthesis::Fallback { .. })
    }
}

/// Result of a reviser call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Revision {
    /// New content, optionally with a new hashtag set.
    Revised {
        content: String,
        hashtags: Option<Vec<String>>,
        #[serde(default)]
        usage: Usage,
    },

    /// The reviser could not produce new content.
    Unchanged { reason: String },
}

impl Revision {
    pub fn revised(content: impl Into<String>) -> Self {
        Revision::Revised {
            content: content.into(),
            hashtags: None,
            usage: Usage::default(),
        }
    }

    pub fn unchanged(reason: impl Into<String>) -> Self {
        Revision::Unchanged {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PostDraft, ValidationScore};
    use uuid::Uuid;

    fn scored_post(scores: Vec<ValidationScore>) -> Post {
        let draft = PostDraft::new("x".repeat(80), "founders").with_hashtags(["#launch"]);
        let mut post = Post::from_draft(Uuid::new_v4(), 1, draft, 2).unwrap();
        post.begin_validation().unwrap();
        post.record_round(scores, 2).unwrap();
        post
    }

    #[test]
    fn test_fallback_collects_unique_failing_feedback() {
        let post = scored_post(vec![
            ValidationScore::new("a", 4.0, "too long"),
            ValidationScore::new("b", 5.0, "too long"),
            ValidationScore::new("c", 9.0, "great hook"),
            ValidationScore::new("d", 3.0, "  "),
        ]);
        let instruction = Instruction::fallback_for(&post);
        assert_eq!(instruction.main_issues, vec!["too long".to_string()]);
        assert_eq!(instruction.priority_fix, "too long");
        assert_eq!(instruction.keep_these_elements, vec!["#launch".to_string()]);
    }

    #[test]
    fn test_fallback_without_feedback_uses_generic_priority() {
        let post = scored_post(vec![ValidationScore::failure("a", "boom")]);
        let instruction = Instruction::fallback_for(&post);
        assert!(instruction.main_issues.is_empty());
        assert_eq!(instruction.priority_fix, FALLBACK_PRIORITY);
    }

    #[test]
    fn test_synthesis_accessors() {
        let fallback = Synthesis::Fallback {
            instruction: Instruction::default(),
            reason: "model unavailable".to_string(),
        };
        assert!(fallback.is_fallback());
        assert_eq!(fallback.instruction(), &Instruction::default());
        assert!(!Synthesis::Synthesized(Instruction::default()).is_fallback());
    }
}
