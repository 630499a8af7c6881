use serde::{Deserialize, Serialize};

use super::{TimeMillis, UserId};

/// Permission levels, ordered. Thresholds: `Trusted` publishes new scenes
/// without review, `Moderator` sees and moderates unreviewed content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UserPermission {
    Member,
    Trusted,
    Moderator,
    Administrator,
}

impl UserPermission {
    pub fn as_code(self) -> i32 {
        match self {
            UserPermission::Member => 0,
            UserPermission::Trusted => 10,
            UserPermission::Moderator => 20,
            UserPermission::Administrator => 30,
        }
    }

    /// Codes between named levels collapse down to the level they clear.
    pub fn from_code(code: i32) -> Self {
        match code {
            c if c >= 30 => UserPermission::Administrator,
            c if c >= 20 => UserPermission::Moderator,
            c if c >= 10 => UserPermission::Trusted,
            _ => UserPermission::Member,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub username: String,
    pub permission: UserPermission,
    /// Opt-in preference to see scenes still awaiting review.
    pub show_awaiting: bool,
    pub created: TimeMillis,
}
