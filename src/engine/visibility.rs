// Visibility policy - who may see a scene. Unauthenticated viewers are
// allowed; they only ever see public content.

use crate::models::{SceneStatus, UserId, UserPermission, UserRecord};

/// The authenticated viewer a request acts as. Built by the router layer
/// from the session; `None` means anonymous.
#[derive(Debug, Clone)]
pub struct ViewerContext {
    pub user_id: UserId,
    pub permission: UserPermission,
    pub show_awaiting: bool,
}

impl ViewerContext {
    pub fn new(user_id: UserId, permission: UserPermission, show_awaiting: bool) -> Self {
        ViewerContext {
            user_id,
            permission,
            show_awaiting,
        }
    }
}

impl From<&UserRecord> for ViewerContext {
    fn from(user: &UserRecord) -> Self {
        ViewerContext {
            user_id: user.id,
            permission: user.permission,
            show_awaiting: user.show_awaiting,
        }
    }
}

/// A scene is visible when it is public, or the viewer created it, or the
/// viewer moderates, or the viewer opted into the review queue and the scene
/// is specifically awaiting review. The last clause deliberately names the
/// sub-state: a future non-public status is not covered by the opt-in.
pub fn can_view(
    viewer: Option<&ViewerContext>,
    status: SceneStatus,
    creator_id: Option<UserId>,
) -> bool {
    if status == SceneStatus::Public {
        return true;
    }
    let Some(viewer) = viewer else {
        return false;
    };
    if creator_id == Some(viewer.user_id) {
        return true;
    }
    if viewer.permission >= UserPermission::Moderator {
        return true;
    }
    viewer.show_awaiting && status == SceneStatus::AwaitingReview
}
