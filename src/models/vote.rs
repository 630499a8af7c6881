use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{SceneId, TimeMillis, UserId};

/// A vote is +1 or -1 on a single scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteKind {
    Positive,
    Negative,
}

impl VoteKind {
    pub fn as_code(self) -> i32 {
        match self {
            VoteKind::Positive => 1,
            VoteKind::Negative => -1,
        }
    }

    /// Total mapping from a rating name. Unknown names return `None`.
    pub fn parse_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "POSITIVE" => Some(VoteKind::Positive),
            "NEGATIVE" => Some(VoteKind::Negative),
            _ => None,
        }
    }
}

/// The slice of a persisted vote the rate limiter needs: which scene, and
/// the shared batch timestamp it was created under.
#[derive(Debug, Clone, Copy)]
pub struct VoteStamp {
    pub scene_id: SceneId,
    pub created: TimeMillis,
}

/// Insert payload for one vote row. A batch of propagated positive votes
/// shares one `created` value; `day` is the voter-local calendar day backing
/// the one-vote-per-scene-per-day unique index.
#[derive(Debug, Clone)]
pub struct NewVote {
    pub owner_id: UserId,
    pub scene_id: SceneId,
    pub kind: VoteKind,
    pub created: TimeMillis,
    pub day: NaiveDate,
}
