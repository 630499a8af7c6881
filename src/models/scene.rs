use serde::{Deserialize, Serialize};

use super::{SceneId, TimeMillis, UserId};

/// Hard bound on the fan-out of any scene.
pub const MAX_CHILDREN: usize = 3;

/// Publication state of a scene. Only `Public` scenes may receive children
/// or votes. The numeric codes are what the store persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SceneStatus {
    AwaitingReview,
    Public,
}

impl SceneStatus {
    pub fn as_code(self) -> i32 {
        match self {
            SceneStatus::AwaitingReview => 20,
            SceneStatus::Public => 30,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            20 => Some(SceneStatus::AwaitingReview),
            30 => Some(SceneStatus::Public),
            _ => None,
        }
    }

    /// Total mapping from a status name to its variant. Unknown names return
    /// `None` and must be rejected by the caller, never defaulted.
    pub fn parse_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "AWAITING_REVIEW" => Some(SceneStatus::AwaitingReview),
            "PUBLIC" => Some(SceneStatus::Public),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SceneStatus::AwaitingReview => "AWAITING_REVIEW",
            SceneStatus::Public => "PUBLIC",
        }
    }
}

/// A persisted scene row. Immutable once published, except for the vote
/// counters and moderation status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneRecord {
    pub id: SceneId,
    pub parent_id: Option<SceneId>,
    /// The creator account may be deleted, severing the link without
    /// deleting the scene.
    pub creator_id: Option<UserId>,
    pub creator_name: String,
    pub title: String,
    pub description: String,
    pub gif_id: i64,
    pub likes: i64,
    pub dislikes: i64,
    pub status: SceneStatus,
    pub created: TimeMillis,
}

/// The slice of a child scene the rank engine and option list need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildSummary {
    pub id: SceneId,
    pub title: String,
    pub likes: i64,
    pub dislikes: i64,
    pub badge_count: i64,
    pub status: SceneStatus,
    pub creator_id: Option<UserId>,
}

/// Insert payload for a new scene row. The store assigns the id.
#[derive(Debug, Clone)]
pub struct NewScene {
    pub parent_id: Option<SceneId>,
    pub creator_id: Option<UserId>,
    pub creator_name: String,
    pub title: String,
    pub description: String,
    pub gif_id: i64,
    pub status: SceneStatus,
    pub created: TimeMillis,
}
