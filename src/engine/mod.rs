// Scene tree engine - the core service: relation cache, visibility, child
// ranking, voting and scene creation, kept consistent with the persistent
// store. The router layer calls into this and does no tree logic itself.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::clock::Clock;
use crate::error::{AppError, AppResult};
use crate::media::MediaLookup;
use crate::models::{SceneId, SceneRecord, SceneStatus};
use crate::store::SceneStore;

pub mod create;
pub mod locks;
pub mod rank;
pub mod relations;
pub mod visibility;
pub mod voting;

pub use create::SceneDraft;
pub use rank::{SceneOption, CREATE_PLACEHOLDER_ID};
pub use relations::RelationCache;
pub use visibility::{can_view, ViewerContext};
pub use voting::{VoteReceipt, MAX_DAILY_VOTES, VOTE_CHAIN_LIMIT};

use locks::LockTable;

/// A fetched scene plus the ranked option list the viewer may navigate to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneView {
    pub scene: SceneRecord,
    pub options: Vec<SceneOption>,
}

/// Tree-wide counters from the relation cache.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TreeTotals {
    pub scene_count: i64,
    pub last_id: SceneId,
}

/// Outcome of a moderation status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusChange {
    Unchanged,
    Updated,
}

/// The engine instance: one per process, constructed at startup and shared
/// by every request handler. Owns the relation cache; the store, media
/// lookup and clock are injected collaborators.
pub struct SceneEngine {
    store: Arc<dyn SceneStore>,
    media: Arc<dyn MediaLookup>,
    clock: Arc<dyn Clock>,
    relations: RwLock<RelationCache>,
    parent_locks: LockTable,
    voter_locks: LockTable,
}

impl SceneEngine {
    pub fn new(
        store: Arc<dyn SceneStore>,
        media: Arc<dyn MediaLookup>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            media,
            clock,
            relations: RwLock::new(RelationCache::default()),
            parent_locks: LockTable::new(),
            voter_locks: LockTable::new(),
        }
    }

    pub(crate) fn store(&self) -> &Arc<dyn SceneStore> {
        &self.store
    }

    pub(crate) fn media(&self) -> &Arc<dyn MediaLookup> {
        &self.media
    }

    pub(crate) fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub(crate) fn relations(&self) -> &RwLock<RelationCache> {
        &self.relations
    }

    pub(crate) fn parent_locks(&self) -> &LockTable {
        &self.parent_locks
    }

    pub(crate) fn voter_locks(&self) -> &LockTable {
        &self.voter_locks
    }

    /// Builds the relation cache from a full store scan. Must complete
    /// before any request is served; failure here is a startup failure.
    pub async fn build_cache(&self) -> AppResult<()> {
        let rows = self.store.scan_relations().await?;
        let cache = RelationCache::build(&rows);
        info!(
            "relation cache built: {} scenes, last id {}",
            cache.scene_count(),
            cache.last_id()
        );
        *self.relations.write().await = cache;
        Ok(())
    }

    /// Clone of the current cache state, for consistency checks and tests.
    pub async fn cache_snapshot(&self) -> RelationCache {
        self.relations.read().await.clone()
    }

    pub async fn totals(&self) -> TreeTotals {
        let relations = self.relations.read().await;
        TreeTotals {
            scene_count: relations.scene_count(),
            last_id: relations.last_id(),
        }
    }

    /// Loads a scene and assembles its option list for this viewer.
    pub async fn fetch_scene(
        &self,
        scene_id: SceneId,
        viewer: Option<&ViewerContext>,
    ) -> AppResult<SceneView> {
        let (exists, child_ids, parent_id) = {
            let relations = self.relations.read().await;
            (
                relations.exists(scene_id),
                relations.children_ids(scene_id),
                relations.parent_id(scene_id),
            )
        };
        if !exists {
            return Err(AppError::NotFound(format!(
                "Scene id={} does not exist or has been removed",
                scene_id
            )));
        }

        let scene = self.store.get_scene(scene_id).await?.ok_or_else(|| {
            AppError::Internal(format!("scene {} in cache but missing from store", scene_id))
        })?;
        if !can_view(viewer, scene.status, scene.creator_id) {
            return Err(AppError::NotVisible(format!(
                "Scene id={} is not available",
                scene_id
            )));
        }

        let summaries = self.store.get_child_summaries(&child_ids).await?;
        let visible: Vec<_> = summaries
            .into_iter()
            .filter(|child| can_view(viewer, child.status, child.creator_id))
            .collect();
        let ranked = rank::rank_children(visible);

        // The back link is only offered when the parent itself is visible.
        let visible_parent = match parent_id {
            Some(parent_id) => match self.store.get_scene(parent_id).await? {
                Some(parent) if can_view(viewer, parent.status, parent.creator_id) => {
                    Some(parent_id)
                }
                _ => None,
            },
            None => None,
        };

        let options = rank::build_options(&ranked, scene.status, visible_parent);
        Ok(SceneView { scene, options })
    }

    /// Moderation: change a scene's publication status. The status arrives
    /// as a name and is mapped totally; unknown names are rejected.
    pub async fn set_scene_status(
        &self,
        scene_id: SceneId,
        status_name: &str,
        viewer: &ViewerContext,
    ) -> AppResult<StatusChange> {
        if viewer.permission < crate::models::UserPermission::Moderator {
            return Err(AppError::Forbidden(
                "You don't have enough permissions to be here".to_string(),
            ));
        }
        let status = SceneStatus::parse_name(status_name).ok_or_else(|| AppError::Validation {
            field: "status".to_string(),
            message: format!("Status {} is unknown", status_name),
        })?;

        if !self.relations.read().await.exists(scene_id) {
            return Err(AppError::NotFound(format!(
                "Scene id={} does not exist or has been removed",
                scene_id
            )));
        }
        let current = self.store.get_scene_status(scene_id).await?.ok_or_else(|| {
            AppError::Internal(format!("scene {} in cache but missing from store", scene_id))
        })?;
        if current == status {
            return Ok(StatusChange::Unchanged);
        }

        self.store.set_scene_status(scene_id, status).await?;
        info!("scene {} status changed to {}", scene_id, status.name());
        Ok(StatusChange::Updated)
    }
}
