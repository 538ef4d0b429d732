//! A [`ContentSource`] backed by a fixed list of drafts.
//!
//! Drafts are served round-robin. On regeneration passes, drafts whose
//! audience or cultural reference shows up in the avoid hint are skipped
//! while any other draft is available.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use postmill_core::{ContentError, ContentSource, FailurePatterns, PostDraft};
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

/// Accepted JSON layouts: a bare array, or an object with a `drafts` key.
#[derive(Deserialize)]
#[serde(untagged)]
enum DraftFile {
    Bare(Vec<PostDraft>),
    Wrapped { drafts: Vec<PostDraft> },
}

impl From<DraftFile> for Vec<PostDraft> {
    fn from(file: DraftFile) -> Self {
        match file {
            DraftFile::Bare(drafts) | DraftFile::Wrapped { drafts } => drafts,
        }
    }
}

#[derive(Debug)]
pub struct DraftPool {
    drafts: Vec<PostDraft>,
    cursor: Mutex<usize>,
}

impl DraftPool {
    pub fn new(drafts: Vec<PostDraft>) -> Self {
        Self {
            drafts,
            cursor: Mutex::new(0),
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        let file: DraftFile = serde_json::from_str(raw)?;
        Ok(Self::new(file.into()))
    }

    /// Load drafts from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ContentError> {
        let load_error = |reason: String| ContentError::Load {
            path: path.to_path_buf(),
            reason,
        };
        let raw = std::fs::read_to_string(path).map_err(|e| load_error(e.to_string()))?;
        let pool = Self::from_json_str(&raw).map_err(|e| load_error(e.to_string()))?;
        if pool.is_empty() {
            return Err(load_error("file contains no drafts".to_string()));
        }
        Ok(pool)
    }

    pub fn len(&self) -> usize {
        self.drafts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drafts.is_empty()
    }

    fn avoided(draft: &PostDraft, avoid: &FailurePatterns) -> bool {
        avoid.target_audiences.contains(&draft.target_audience)
            || draft
                .cultural_reference
                .as_ref()
                .is_some_and(|r| avoid.cultural_references.contains(r))
    }

    /// Index of the next draft to serve, starting at `cursor`.
    fn pick(&self, cursor: usize, avoid: Option<&FailurePatterns>) -> usize {
        let len = self.drafts.len();
        let Some(avoid) = avoid.filter(|a| !a.is_empty()) else {
            return cursor % len;
        };
        (0..len)
            .map(|offset| (cursor + offset) % len)
            .find(|&i| !Self::avoided(&self.drafts[i], avoid))
            .unwrap_or(cursor % len)
    }
}

#[async_trait]
impl ContentSource for DraftPool {
    async fn generate(
        &self,
        batch_id: Uuid,
        count: usize,
        avoid: Option<&FailurePatterns>,
    ) -> Result<Vec<PostDraft>, ContentError> {
        if self.drafts.is_empty() {
            return Err(ContentError::Generation("draft pool is empty".to_string()));
        }

        let mut cursor = self.cursor.lock().unwrap_or_else(|p| p.into_inner());
        let mut served = Vec::with_capacity(count);
        for _ in 0..count {
            let index = self.pick(*cursor, avoid);
            served.push(self.drafts[index].clone());
            *cursor = index + 1;
        }
        debug!(%batch_id, count, avoiding = avoid.is_some(), "served drafts from pool");
        Ok(served)
    }
}
