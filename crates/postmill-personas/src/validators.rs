//! Heuristic validators.
//!
//! Each persona checks one measurable property of a post and reports it as a
//! 0-10 sub-score under its criterion key. Feedback is left empty when the
//! property is within bounds; otherwise it names the bound to hit, in a form
//! [`RuleReviser`](crate::RuleReviser) can act on ("at most N", "at least N",
//! "longer than N words").

use std::ops::RangeInclusive;
use std::sync::OnceLock;

use async_trait::async_trait;
use postmill_core::{Post, ValidationScore, Validator};
use regex::Regex;

pub const CRITERION_LENGTH: &str = "length";
pub const CRITERION_HASHTAG_COUNT: &str = "hashtag_count";
pub const CRITERION_SENTENCE_LENGTH: &str = "sentence_length";

const IN_BOUNDS_SCORE: f64 = 9.0;

fn score_with(name: &str, criterion: &str, value: f64, feedback: String) -> ValidationScore {
    let value = (value * 10.0).round() / 10.0;
    ValidationScore::new(name, value, feedback).with_criterion(criterion, value)
}

// ---------------------------------------------------------------------------
// Length
// ---------------------------------------------------------------------------

/// Scores content length in characters against an ideal window.
#[derive(Debug, Clone)]
pub struct LengthValidator {
    name: String,
    ideal: RangeInclusive<usize>,
}

impl Default for LengthValidator {
    fn default() -> Self {
        Self::new(120..=600)
    }
}

impl LengthValidator {
    pub fn new(ideal: RangeInclusive<usize>) -> Self {
        Self {
            name: "length_editor".to_string(),
            ideal,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn evaluate(&self, chars: usize) -> (f64, String) {
        let (lo, hi) = (*self.ideal.start(), *self.ideal.end());
        if chars < lo {
            (
                IN_BOUNDS_SCORE * chars as f64 / lo.max(1) as f64,
                format!("Too short at {chars} characters; expand to at least {lo} characters"),
            )
        } else if chars > hi {
            (
                IN_BOUNDS_SCORE * hi as f64 / chars as f64,
                format!("Too long at {chars} characters; trim to at most {hi} characters"),
            )
        } else {
            (IN_BOUNDS_SCORE, String::new())
        }
    }
}

#[async_trait]
impl Validator for LengthValidator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn score(&self, post: &Post) -> ValidationScore {
        let (value, feedback) = self.evaluate(post.content().chars().count());
        score_with(&self.name, CRITERION_LENGTH, value, feedback)
    }
}

// ---------------------------------------------------------------------------
// Hashtags
// ---------------------------------------------------------------------------

/// Scores the hashtag count against an ideal window.
#[derive(Debug, Clone)]
pub struct HashtagValidator {
    name: String,
    ideal: RangeInclusive<usize>,
}

impl Default for HashtagValidator {
    fn default() -> Self {
        Self::new(1..=5)
    }
}

impl HashtagValidator {
    pub fn new(ideal: RangeInclusive<usize>) -> Self {
        Self {
            name: "hashtag_curator".to_string(),
            ideal,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn evaluate(&self, count: usize) -> (f64, String) {
        let (lo, hi) = (*self.ideal.start(), *self.ideal.end());
        if count < lo {
            (
                4.0 + 4.5 * count as f64 / lo as f64,
                format!("Only {count} hashtags; add at least {lo} relevant hashtags"),
            )
        } else if count > hi {
            (
                8.5 - 1.5 * (count - hi) as f64,
                format!("{count} hashtags is noisy; keep at most {hi} hashtags"),
            )
        } else {
            (8.5, String::new())
        }
    }
}

#[async_trait]
impl Validator for HashtagValidator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn score(&self, post: &Post) -> ValidationScore {
        let (value, feedback) = self.evaluate(post.hashtags().len());
        score_with(&self.name, CRITERION_HASHTAG_COUNT, value, feedback)
    }
}

// ---------------------------------------------------------------------------
// Readability
// ---------------------------------------------------------------------------

pub(crate) fn sentence_boundary() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?]+(\s+|$)").ok()).as_ref()
}

/// Word counts of each sentence in `text`, in order.
pub fn sentence_word_counts(text: &str) -> Vec<usize> {
    let sentences: Vec<&str> = match sentence_boundary() {
        Some(re) => re.split(text).collect(),
        None => vec![text],
    };
    sentences
        .into_iter()
        .map(|s| s.split_whitespace().count())
        .filter(|&n| n > 0)
        .collect()
}

/// Penalises long sentences.
#[derive(Debug, Clone)]
pub struct ReadabilityValidator {
    name: String,
    max_sentence_words: usize,
}

impl Default for ReadabilityValidator {
    fn default() -> Self {
        Self::new(25)
    }
}

impl ReadabilityValidator {
    pub fn new(max_sentence_words: usize) -> Self {
        Self {
            name: "plain_language_reader".to_string(),
            max_sentence_words,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn evaluate(&self, content: &str) -> (f64, String) {
        let counts = sentence_word_counts(content);
        let longest = counts.iter().copied().max().unwrap_or(0);
        if longest <= self.max_sentence_words {
            return (IN_BOUNDS_SCORE, String::new());
        }
        let average = counts.iter().sum::<usize>() as f64 / counts.len() as f64;
        (
            IN_BOUNDS_SCORE - 0.25 * (longest - self.max_sentence_words) as f64,
            format!(
                "Sentences average {average:.1} words and peak at {longest}; split sentences longer than {} words",
                self.max_sentence_words
            ),
        )
    }
}

#[async_trait]
impl Validator for ReadabilityValidator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn score(&self, post: &Post) -> ValidationScore {
        let (value, feedback) = self.evaluate(post.content());
        score_with(&self.name, CRITERION_SENTENCE_LENGTH, value, feedback)
    }
}
