// Scene creation gate - validates a draft, reserves a child slot under the
// parent and registers the new scene in the relation cache.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::SceneEngine;
use crate::clock::Clock;
use crate::error::{AppError, AppResult};
use crate::media::MediaLookup;
use crate::models::{NewScene, SceneId, SceneStatus, UserId, UserPermission};
use crate::store::SceneStore;

pub const TITLE_MIN: usize = 5;
pub const TITLE_MAX: usize = 40;
pub const DESCRIPTION_MIN: usize = 80;
pub const DESCRIPTION_MAX: usize = 3000;

static TITLE_SPACE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").unwrap());
static LINE_EDGE_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ ]+|[ ]+$").unwrap());
static SPACE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ ]{2,}").unwrap());
static LINE_BREAK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\r\n\t\f\v]+").unwrap());

/// User-submitted fields for a new scene.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneDraft {
    pub title: String,
    pub description: String,
    pub gif_id: i64,
}

/// Trims and collapses internal whitespace runs to single spaces.
pub fn normalize_title(raw: &str) -> String {
    TITLE_SPACE_RUNS.replace_all(raw.trim(), " ").into_owned()
}

/// Trims, strips per-line edge spaces, collapses space runs and folds runs
/// of line breaks into the literal two-character `\n` escape the renderer
/// expects.
pub fn normalize_description(raw: &str) -> String {
    let trimmed = raw.trim();
    let no_edges = LINE_EDGE_SPACES.replace_all(trimmed, "");
    let collapsed = SPACE_RUNS.replace_all(&no_edges, " ");
    LINE_BREAK_RUNS.replace_all(&collapsed, r"\n").into_owned()
}

impl SceneEngine {
    /// Creates a child scene under `parent_id`. Serialized per parent so two
    /// near-simultaneous requests cannot both take the last free slot.
    pub async fn create_child_scene(
        &self,
        parent_id: SceneId,
        author_id: UserId,
        draft: SceneDraft,
    ) -> AppResult<SceneId> {
        if !self.relations().read().await.exists(parent_id) {
            return Err(AppError::NotFound(format!(
                "Scene id={} does not exist or has been removed",
                parent_id
            )));
        }

        // Held through the cache insert; the free-slot check below stays
        // authoritative for the duration.
        let _guard = self.parent_locks().acquire(parent_id).await;

        let parent_status = self.store().get_scene_status(parent_id).await?.ok_or_else(|| {
            AppError::Internal(format!(
                "scene {} in cache but missing from store",
                parent_id
            ))
        })?;
        if parent_status != SceneStatus::Public {
            return Err(AppError::ParentNotPublic(format!(
                "Scene id={} cannot accept children yet",
                parent_id
            )));
        }

        if !self.relations().read().await.has_free_child_slot(parent_id) {
            return Err(AppError::SlotsFull(format!(
                "There are no more children available for parent scene id={}",
                parent_id
            )));
        }

        let title = normalize_title(&draft.title);
        let title_len = title.chars().count();
        if title_len < TITLE_MIN || title_len > TITLE_MAX {
            return Err(AppError::Validation {
                field: "title".to_string(),
                message: format!(
                    "Title length must be between {} and {} characters",
                    TITLE_MIN, TITLE_MAX
                ),
            });
        }

        let description = normalize_description(&draft.description);
        let description_len = description.chars().count();
        if description_len < DESCRIPTION_MIN || description_len > DESCRIPTION_MAX {
            return Err(AppError::Validation {
                field: "description".to_string(),
                message: format!(
                    "Description length must be between {} and {} characters",
                    DESCRIPTION_MIN, DESCRIPTION_MAX
                ),
            });
        }

        if !self.media().media_ids_exist(&[draft.gif_id]).await? {
            return Err(AppError::Validation {
                field: "gif_id".to_string(),
                message: "GIF reference is invalid".to_string(),
            });
        }

        let author = self.store().get_user(author_id).await?.ok_or_else(|| {
            AppError::NotFound(format!("User id={} does not exist", author_id))
        })?;
        let status = if author.permission >= UserPermission::Trusted {
            SceneStatus::Public
        } else {
            SceneStatus::AwaitingReview
        };

        let new_id = self
            .store()
            .insert_scene(&NewScene {
                parent_id: Some(parent_id),
                creator_id: Some(author.id),
                creator_name: author.username.clone(),
                title,
                description,
                gif_id: draft.gif_id,
                status,
                created: self.clock().now_millis(),
            })
            .await?;

        let mut relations = self.relations().write().await;
        if !relations.insert(new_id, parent_id) {
            // The per-parent lock should make this unreachable; reaching it
            // means the slot check was violated, not a user mistake.
            return Err(AppError::Internal(format!(
                "relation cache rejected scene {} under parent {}",
                new_id, parent_id
            )));
        }
        drop(relations);

        info!(
            "scene {} created under parent {} by user {} ({})",
            new_id,
            parent_id,
            author.id,
            status.name()
        );
        Ok(new_id)
    }
}
