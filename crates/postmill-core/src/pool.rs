//! Concurrent validator fan-out.
//!
//! Every validator scores the same snapshot of the post in its own tokio
//! task; the pool waits for all of them. There is no early exit, because the
//! approval predicate needs the full score set. A task that panics or is
//! cancelled is turned into a failure score, so a round always yields exactly
//! one score per validator, in registration order.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{instrument, warn};

use crate::collaborators::Validator;
use crate::domain::{Post, ValidationScore};

/// The set of validators a post is scored by.
#[derive(Clone, Default)]
pub struct ValidatorPool {
    validators: Vec<Arc<dyn Validator>>,
}

impl std::fmt::Debug for ValidatorPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatorPool")
            .field("validators", &self.names())
            .finish()
    }
}

impl ValidatorPool {
    pub fn new(validators: Vec<Arc<dyn Validator>>) -> Self {
        Self { validators }
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.validators.iter().map(|v| v.name().to_string()).collect()
    }

    /// Score `post` with every validator concurrently.
    #[instrument(skip_all, fields(post_id = %post.id(), validators = self.validators.len()))]
    pub async fn score_all(&self, post: &Post) -> Vec<ValidationScore> {
        let snapshot = Arc::new(post.clone());

        let handles = self.validators.iter().map(|validator| {
            let validator = Arc::clone(validator);
            let snapshot = Arc::clone(&snapshot);
            tokio::spawn(async move { validator.score(&snapshot).await })
        });
        let outcomes = join_all(handles).await;

        outcomes
            .into_iter()
            .zip(&self.validators)
            .map(|(outcome, validator)| match outcome {
                Ok(score) => score,
                Err(e) => {
                    warn!(validator = %validator.name(), error = %e, "validator task aborted");
                    ValidationScore::failure(validator.name(), format!("validator task aborted: {e}"))
                }
            })
            .collect()
    }
}
