// Media lookup collaborator - existence checks for external GIF references.

use async_trait::async_trait;
use std::collections::HashSet;

use crate::error::AppResult;

/// External media search integration. The engine only needs to know whether
/// every referenced id resolves; the actual search client lives outside this
/// crate and is wired in at startup.
#[async_trait]
pub trait MediaLookup: Send + Sync {
    /// True iff every id in `ids` resolves to existing media.
    async fn media_ids_exist(&self, ids: &[i64]) -> AppResult<bool>;
}

/// Accepts any id. Default when no media backend is configured.
#[derive(Debug, Default)]
pub struct PermissiveMedia;

#[async_trait]
impl MediaLookup for PermissiveMedia {
    async fn media_ids_exist(&self, _ids: &[i64]) -> AppResult<bool> {
        Ok(true)
    }
}

/// Accepts only a fixed id set. Used by tests to exercise rejection paths.
#[derive(Debug, Default)]
pub struct AllowListMedia {
    ids: HashSet<i64>,
}

impl AllowListMedia {
    pub fn new<I: IntoIterator<Item = i64>>(ids: I) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }
}

#[async_trait]
impl MediaLookup for AllowListMedia {
    async fn media_ids_exist(&self, ids: &[i64]) -> AppResult<bool> {
        Ok(ids.iter().all(|id| self.ids.contains(id)))
    }
}
