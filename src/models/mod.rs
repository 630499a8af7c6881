// Entity records for the scene tree: scenes, users, votes.

pub mod scene;
pub mod user;
pub mod vote;

pub use scene::{ChildSummary, NewScene, SceneRecord, SceneStatus, MAX_CHILDREN};
pub use user::{UserPermission, UserRecord};
pub use vote::{NewVote, VoteKind, VoteStamp};

/// Scene and user IDs are store-assigned, monotone and never reused.
pub type SceneId = i64;
pub type UserId = i64;

/// Timestamps are milliseconds since the Unix epoch.
pub type TimeMillis = i64;
