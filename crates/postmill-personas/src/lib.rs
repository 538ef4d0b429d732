//! Postmill Personas
//!
//! Offline collaborators for the Postmill core: a JSON-backed draft pool,
//! heuristic validator personas, a template feedback synthesizer and a
//! rule-based reviser. Nothing here calls out to a model.

pub mod draft_pool;
pub mod reviser;
pub mod synthesizer;
pub mod validators;

use std::sync::Arc;

use postmill_core::Validator;

pub use draft_pool::DraftPool;
pub use reviser::{split_long_sentences, trim_to_chars, RuleReviser};
pub use synthesizer::TemplateSynthesizer;
pub use validators::{
    sentence_word_counts, HashtagValidator, LengthValidator, ReadabilityValidator,
    CRITERION_HASHTAG_COUNT, CRITERION_LENGTH, CRITERION_SENTENCE_LENGTH,
};

/// The three heuristic personas with their default bounds, in a stable
/// order.
pub fn default_panel() -> Vec<Arc<dyn Validator>> {
    vec![
        Arc::new(LengthValidator::default()),
        Arc::new(HashtagValidator::default()),
        Arc::new(ReadabilityValidator::default()),
    ]
}
