//! Aggregate batch metrics.

use serde::{Deserialize, Serialize};

use super::draft::Usage;
use super::post::{Post, PostStatus};

/// Counts and rates computed from a batch's posts.
///
/// Always produced in one pass by [`BatchMetrics::from_posts`]; nothing
/// updates individual fields afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchMetrics {
    pub total_posts: usize,
    pub approved_posts: usize,
    pub rejected_posts: usize,

    /// Posts that went through at least one revision attempt.
    pub revised_posts: usize,

    /// `approved_posts / total_posts`, 0 for an empty batch.
    pub approval_rate: f64,

    /// Approved-and-revised over revised, 0 when nothing was revised.
    pub revision_success_rate: f64,

    /// Mean of each approved post's final-round average score.
    pub average_approved_score: f64,

    /// Mean processing time over posts that recorded one.
    pub average_processing_time_ms: f64,

    pub total_tokens: u64,
    pub total_cost_usd: f64,
}

impl BatchMetrics {
    pub fn from_posts(posts: &[Post]) -> Self {
        let total_posts = posts.len();
        let approved: Vec<&Post> = posts
            .iter()
            .filter(|p| p.status() == PostStatus::Approved)
            .collect();
        let rejected_posts = posts
            .iter()
            .filter(|p| p.status() == PostStatus::Rejected)
            .count();
        let revised_posts = posts.iter().filter(|p| p.revision_count() > 0).count();
        let revised_and_approved = approved.iter().filter(|p| p.revision_count() > 0).count();

        let processing: Vec<u64> = posts.iter().filter_map(Post::processing_time_ms).collect();
        let usage: Usage = posts.iter().map(Post::usage).sum();

        Self {
            total_posts,
            approved_posts: approved.len(),
            rejected_posts,
            revised_posts,
            approval_rate: ratio(approved.len(), total_posts),
            revision_success_rate: ratio(revised_and_approved, revised_posts),
            average_approved_score: mean(approved.iter().map(|p| p.average_score())),
            average_processing_time_ms: mean(processing.iter().map(|ms| *ms as f64)),
            total_tokens: usage.tokens,
            total_cost_usd: usage.cost_usd,
        }
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
