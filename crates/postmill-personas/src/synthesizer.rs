//! Template-based feedback synthesis.

use std::collections::BTreeMap;

use async_trait::async_trait;
use postmill_core::{FeedbackSynthesizer, Instruction, Post, Synthesis, APPROVAL_THRESHOLD};

/// Issues carried into `main_issues`.
const MAX_MAIN_ISSUES: usize = 3;

/// Builds instructions from the failing criteria of the latest round.
///
/// Every non-approving score contributes its feedback; each of its criteria
/// below the approval threshold becomes a `specific_improvements` entry
/// keyed by criterion name. The lowest-scoring validator's feedback is the
/// priority fix.
#[derive(Debug, Clone, Default)]
pub struct TemplateSynthesizer;

impl TemplateSynthesizer {
    pub fn new() -> Self {
        Self
    }

    fn build(post: &Post) -> Option<Instruction> {
        let mut failing: Vec<_> = post
            .validation_scores()
            .iter()
            .filter(|s| !s.approved() && !s.is_failure() && !s.feedback().trim().is_empty())
            .collect();
        if failing.is_empty() {
            return None;
        }
        failing.sort_by(|a, b| a.score().total_cmp(&b.score()));

        let mut main_issues: Vec<String> = Vec::new();
        let mut specific_improvements = BTreeMap::new();
        for score in &failing {
            let feedback = score.feedback().trim().to_string();
            for (criterion, value) in score.numeric_criteria() {
                if value < APPROVAL_THRESHOLD {
                    specific_improvements
                        .entry(criterion.to_string())
                        .or_insert_with(|| feedback.clone());
                }
            }
            if main_issues.len() < MAX_MAIN_ISSUES && !main_issues.contains(&feedback) {
                main_issues.push(feedback);
            }
        }

        let keep_these_elements = post
            .validation_scores()
            .iter()
            .filter(|s| s.approved())
            .flat_map(|s| s.numeric_criteria().map(|(k, _)| format!("current {k}")))
            .chain(post.hashtags().iter().cloned())
            .collect();

        Some(Instruction {
            priority_fix: main_issues[0].clone(),
            main_issues,
            specific_improvements,
            keep_these_elements,
        })
    }
}

#[async_trait]
impl FeedbackSynthesizer for TemplateSynthesizer {
    async fn synthesize(&self, post: &Post) -> Synthesis {
        match Self::build(post) {
            Some(instruction) => Synthesis::Synthesized(instruction),
            None => Synthesis::Fallback {
                instruction: Instruction::fallback_for(post),
                reason: "no actionable validator feedback".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use postmill_core::{PostDraft, ValidationScore};
    use uuid::Uuid;

    fn scored(scores: Vec<ValidationScore>) -> Post {
        let draft = PostDraft::new(
            "Synthesizer test draft with enough characters to be a valid post.",
            "ops",
        )
        .with_hashtags(["#ops"]);
        let mut post = Post::from_draft(Uuid::new_v4(), 1, draft, 2).unwrap();
        post.begin_validation().unwrap();
        post.record_round(scores, 2).unwrap();
        post
    }

    #[tokio::test]
    async fn failing_criteria_become_specific_improvements() {
        let post = scored(vec![
            ValidationScore::new("len", 4.0, "trim to at most 200 characters").with_criterion("length", 4.0),
            ValidationScore::new("tags", 5.5, "keep at most 3 hashtags").with_criterion("hashtag_count", 5.5),
            ValidationScore::new("read", 9.0, "").with_criterion("sentence_length", 9.0),
        ]);

        let synthesis = TemplateSynthesizer::new().synthesize(&post).await;

        assert!(!synthesis.is_fallback());
        let instruction = synthesis.instruction();
        assert_eq!(instruction.priority_fix, "trim to at most 200 characters");
        assert_eq!(instruction.main_issues.len(), 2);
        assert_eq!(
            instruction.specific_improvements.get("hashtag_count").map(String::as_str),
            Some("keep at most 3 hashtags")
        );
        assert!(instruction.keep_these_elements.contains(&"current sentence_length".to_string()));
        assert!(instruction.keep_these_elements.contains(&"#ops".to_string()));
    }

    #[tokio::test]
    async fn no_feedback_falls_back() {
        let post = scored(vec![
            ValidationScore::failure("broken", "timeout"),
            ValidationScore::new("quiet", 3.0, ""),
        ]);

        let synthesis = TemplateSynthesizer::new().synthesize(&post).await;

        assert!(synthesis.is_fallback());
        assert!(synthesis.instruction().specific_improvements.is_empty());
    }
}
