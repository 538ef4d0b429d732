//! Pipeline configuration.
//!
//! Values come from a TOML file (every key optional) and may be overridden
//! by CLI flags or `POSTMILL_*` environment variables in the binary.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::DEFAULT_MAX_REVISIONS;

/// Errors produced while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Knobs consumed by the lifecycle controller and batch coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Drafts requested for the initial pass of each batch.
    pub posts_per_batch: usize,

    /// Revision budget per post.
    pub max_revisions: u32,

    /// Approval rate (0.0–1.0) below which a batch regenerates.
    pub target_approval_rate: f64,

    /// Approving validators needed for a post to pass.
    pub min_approvals_required: usize,

    /// Ceiling on batches run by [`run_until_target`].
    ///
    /// [`run_until_target`]: crate::coordinator::BatchCoordinator::run_until_target
    pub max_total_attempts: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            posts_per_batch: 5,
            max_revisions: DEFAULT_MAX_REVISIONS,
            target_approval_rate: 0.6,
            min_approvals_required: 2,
            max_total_attempts: 3,
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Check internal consistency against the number of registered validators.
    pub fn validate(&self, validator_count: usize) -> Result<(), ConfigError> {
        if self.posts_per_batch == 0 {
            return Err(ConfigError::Invalid(
                "posts_per_batch must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.target_approval_rate) {
            return Err(ConfigError::Invalid(format!(
                "target_approval_rate must be within 0.0..=1.0, got {}",
                self.target_approval_rate
            )));
        }
        if self.min_approvals_required == 0 {
            return Err(ConfigError::Invalid(
                "min_approvals_required must be at least 1".to_string(),
            ));
        }
        if self.min_approvals_required > validator_count {
            return Err(ConfigError::Invalid(format!(
                "min_approvals_required ({}) exceeds the number of validators ({validator_count})",
                self.min_approvals_required
            )));
        }
        if self.max_total_attempts == 0 {
            return Err(ConfigError::Invalid(
                "max_total_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
