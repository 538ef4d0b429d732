//! Rule-based reviser.
//!
//! Applies the mechanical subset of an instruction's `specific_improvements`:
//!
//! | criterion         | hint pattern            | action                       |
//! |-------------------|-------------------------|------------------------------|
//! | `sentence_length` | `longer than N words`   | split each long sentence     |
//! | `length`          | `at most N characters`  | trim at a word boundary      |
//! | `hashtag_count`   | `at most N hashtags`    | keep the first N hashtags    |
//!
//! Anything else (expanding short content, tone) needs a model and is left
//! alone. When no rule changes the post the result is
//! [`Revision::Unchanged`].

use std::sync::OnceLock;

use async_trait::async_trait;
use postmill_core::{Instruction, Post, Reviser, Revision, Usage, MIN_CONTENT_CHARS};
use regex::Regex;
use tracing::debug;

use crate::validators::{
    sentence_boundary, CRITERION_HASHTAG_COUNT, CRITERION_LENGTH, CRITERION_SENTENCE_LENGTH,
};

fn at_most_chars() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"at most (\d+) characters").ok()).as_ref()
}

fn at_most_hashtags() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"at most (\d+) hashtags").ok()).as_ref()
}

fn longer_than_words() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"longer than (\d+) words").ok()).as_ref()
}

fn bound(re: Option<&Regex>, hint: &str) -> Option<usize> {
    re?.captures(hint)?.get(1)?.as_str().parse().ok()
}

/// Cut `content` to at most `max` characters, ending on a word boundary and
/// terminal punctuation. Never goes below the post content floor.
pub fn trim_to_chars(content: &str, max: usize) -> Option<String> {
    if content.chars().count() <= max {
        return None;
    }
    let budget = max.saturating_sub(1).max(MIN_CONTENT_CHARS);
    let head: String = content.chars().take(budget).collect();
    let cut = match head.rfind(char::is_whitespace) {
        Some(i) if head[..i].chars().count() >= MIN_CONTENT_CHARS => &head[..i],
        _ => head.as_str(),
    };
    let mut trimmed = cut
        .trim_end_matches(|c: char| c.is_whitespace() || ",;:-".contains(c))
        .to_string();
    if !trimmed.ends_with(['.', '!', '?']) {
        trimmed.push('.');
    }
    Some(trimmed)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Where to break a long sentence: the comma closest to the middle, or the
/// middle word.
fn split_point(words: &[&str]) -> usize {
    let mid = words.len() / 2;
    (1..words.len())
        .filter(|&i| words[i - 1].ends_with(','))
        .min_by_key(|&i| i.abs_diff(mid))
        .unwrap_or(mid)
}

/// Split every sentence longer than `max_words` into two.
pub fn split_long_sentences(content: &str, max_words: usize) -> Option<String> {
    let boundary = sentence_boundary()?;
    let mut pieces: Vec<(&str, &str)> = Vec::new();
    let mut start = 0;
    for m in boundary.find_iter(content) {
        pieces.push((&content[start..m.start()], m.as_str().trim_end()));
        start = m.end();
    }
    if start < content.len() {
        pieces.push((&content[start..], ""));
    }

    let mut changed = false;
    let mut sentences = Vec::with_capacity(pieces.len());
    for (body, end) in pieces {
        let words: Vec<&str> = body.split_whitespace().collect();
        if words.is_empty() {
            continue;
        }
        if words.len() <= max_words {
            sentences.push(format!("{}{end}", words.join(" ")));
            continue;
        }
        changed = true;
        let at = split_point(&words);
        let end = if end.is_empty() { "." } else { end };
        sentences.push(format!("{}.", words[..at].join(" ").trim_end_matches(',')));
        sentences.push(format!("{}{end}", capitalize(&words[at..].join(" "))));
    }

    changed.then(|| sentences.join(" "))
}

#[derive(Debug, Clone, Default)]
pub struct RuleReviser;

impl RuleReviser {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Reviser for RuleReviser {
    async fn revise(&self, post: &Post, instruction: &Instruction) -> Revision {
        let hints = &instruction.specific_improvements;
        let mut content = post.content().to_string();
        let mut hashtags = None;
        let mut applied: Vec<&str> = Vec::new();

        if let Some(max_words) = hints
            .get(CRITERION_SENTENCE_LENGTH)
            .and_then(|h| bound(longer_than_words(), h))
        {
            if let Some(split) = split_long_sentences(&content, max_words) {
                content = split;
                applied.push(CRITERION_SENTENCE_LENGTH);
            }
        }

        if let Some(max_chars) = hints
            .get(CRITERION_LENGTH)
            .and_then(|h| bound(at_most_chars(), h))
        {
            if let Some(trimmed) = trim_to_chars(&content, max_chars) {
                content = trimmed;
                applied.push(CRITERION_LENGTH);
            }
        }

        if let Some(max_tags) = hints
            .get(CRITERION_HASHTAG_COUNT)
            .and_then(|h| bound(at_most_hashtags(), h))
        {
            if post.hashtags().len() > max_tags {
                hashtags = Some(post.hashtags()[..max_tags].to_vec());
                applied.push(CRITERION_HASHTAG_COUNT);
            }
        }

        if applied.is_empty() {
            let requested: Vec<&str> = hints.keys().map(String::as_str).collect();
            return Revision::unchanged(format!(
                "no mechanical rule applies to [{}]",
                requested.join(", ")
            ));
        }

        debug!(post_id = %post.id(), applied = ?applied, "rule revision applied");
        Revision::Revised {
            content,
            hashtags,
            usage: Usage::default(),
        }
    }
}
