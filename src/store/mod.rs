// Persistent store interface - the relational source of truth for scenes,
// users and votes. The engine talks to it only through this trait.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::AppResult;
use crate::models::{
    ChildSummary, NewScene, NewVote, SceneId, SceneRecord, SceneStatus, TimeMillis, UserId,
    UserRecord, VoteStamp,
};

mod postgres;
mod sqlite;

pub use postgres::PostgresStore;
pub use sqlite::SqliteStore;

/// Storage operations the scene tree engine consumes.
///
/// Every call is bounded by a timeout inside the implementation and surfaces
/// as a retryable `AppError::Timeout` when exceeded. Implementations must be
/// safe to share across request tasks.
#[async_trait]
pub trait SceneStore: Send + Sync {
    /// Full `(id, parent_id)` scan in id order, for building the relation
    /// cache. Startup fails fatally when this does.
    async fn scan_relations(&self) -> AppResult<Vec<(SceneId, Option<SceneId>)>>;

    async fn get_scene(&self, id: SceneId) -> AppResult<Option<SceneRecord>>;

    /// Targeted status read, cheaper than a full row when only the
    /// publication state matters.
    async fn get_scene_status(&self, id: SceneId) -> AppResult<Option<SceneStatus>>;

    /// Summaries for the given child ids, in id order, with badge counts.
    async fn get_child_summaries(&self, ids: &[SceneId]) -> AppResult<Vec<ChildSummary>>;

    /// Inserts a scene row and returns the store-assigned id.
    async fn insert_scene(&self, scene: &NewScene) -> AppResult<SceneId>;

    /// Inserts the root scene with the fixed id 0. Called once, out-of-band,
    /// before the cache is built on an empty store.
    async fn seed_root(&self, scene: &NewScene) -> AppResult<SceneId>;

    async fn set_scene_status(&self, id: SceneId, status: SceneStatus) -> AppResult<()>;

    async fn increment_likes(&self, id: SceneId) -> AppResult<()>;

    async fn increment_dislikes(&self, id: SceneId) -> AppResult<()>;

    /// All votes by `owner` created at or after `since`, newest first.
    async fn votes_since(&self, owner: UserId, since: TimeMillis) -> AppResult<Vec<VoteStamp>>;

    /// Inserts one vote row. Returns false when the `(owner, scene, day)`
    /// unique index already holds a row, without treating it as an error.
    async fn insert_vote(&self, vote: &NewVote) -> AppResult<bool>;

    async fn get_user(&self, id: UserId) -> AppResult<Option<UserRecord>>;

    /// Creates a user row. Account management is owned by the auth layer;
    /// this exists for wiring and tests.
    async fn insert_user(
        &self,
        username: &str,
        permission: i32,
        show_awaiting: bool,
        created: TimeMillis,
    ) -> AppResult<UserId>;

    /// Attaches a distinguishing badge to a scene.
    async fn award_badge(&self, scene_id: SceneId, badge: &str) -> AppResult<()>;
}

/// Renders the local calendar day the way the vote unique index stores it.
pub(crate) fn day_key(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}
