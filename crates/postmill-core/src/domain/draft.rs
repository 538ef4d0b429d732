//! Drafts produced by a content source, plus usage accounting.

use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

/// Token and cost usage attributed to a post or batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub tokens: u64,
    pub cost_usd: f64,
}

impl Usage {
    pub fn new(tokens: u64, cost_usd: f64) -> Self {
        Self { tokens, cost_usd }
    }
}

impl Add for Usage {
    type Output = Usage;

    fn add(self, rhs: Usage) -> Usage {
        Usage {
            tokens: self.tokens + rhs.tokens,
            cost_usd: self.cost_usd + rhs.cost_usd,
        }
    }
}

impl AddAssign for Usage {
    fn add_assign(&mut self, rhs: Usage) {
        *self = *self + rhs;
    }
}

impl std::iter::Sum for Usage {
    fn sum<I: Iterator<Item = Usage>>(iter: I) -> Usage {
        iter.fold(Usage::default(), Add::add)
    }
}

/// Raw output of a content source, before it becomes a [`Post`](super::Post).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDraft {
    /// Post body.
    pub content: String,

    /// Audience the draft was written for.
    pub target_audience: String,

    /// Cultural or thematic reference the draft leans on, if any.
    #[serde(default)]
    pub cultural_reference: Option<String>,

    #[serde(default)]
    pub hashtags: Vec<String>,

    /// Generation cost of this draft.
    #[serde(default)]
    pub usage: Usage,
}

impl PostDraft {
    pub fn new(content: impl Into<String>, target_audience: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            target_audience: target_audience.into(),
            cultural_reference: None,
            hashtags: Vec::new(),
            usage: Usage::default(),
        }
    }

    pub fn with_cultural_reference(mut self, reference: impl Into<String>) -> Self {
        self.cultural_reference = Some(reference.into());
        self
    }

    pub fn with_hashtags<I, S>(mut self, hashtags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hashtags = hashtags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = usage;
        self
    }
}
