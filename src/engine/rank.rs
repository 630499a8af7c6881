// Rank engine - display ordering for a scene's children and the fixed-width
// option list the presentation layer renders as buttons.

use serde::{Deserialize, Serialize};

use crate::models::{ChildSummary, SceneId, SceneStatus, MAX_CHILDREN};

/// Sentinel id for a "create your own branch" slot.
pub const CREATE_PLACEHOLDER_ID: SceneId = -1;

pub const CREATE_PLACEHOLDER_TITLE: &str = "Create your action";
pub const GO_BACK_TITLE: &str = "Go Back!";

/// One navigable option under a scene: a real child, a create placeholder,
/// or the back link to the parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneOption {
    pub id: SceneId,
    pub title: String,
}

/// Like ratio with a +1 in the denominator: avoids dividing by zero on
/// unvoted scenes and slightly discounts scenes with very few votes.
fn like_ratio(child: &ChildSummary) -> f64 {
    child.likes as f64 / (child.likes + child.dislikes + 1) as f64
}

/// Orders children for display: badge count first, like ratio second, both
/// descending. Ties keep their incoming (id) order; nothing more is promised.
pub fn rank_children(mut children: Vec<ChildSummary>) -> Vec<ChildSummary> {
    children.sort_by(|a, b| {
        b.badge_count
            .cmp(&a.badge_count)
            .then_with(|| like_ratio(b).total_cmp(&like_ratio(a)))
    });
    children
}

/// Builds the option list from ranked, already visibility-filtered children:
/// up to `MAX_CHILDREN` real entries, then create placeholders while the
/// scene can still accept children (public scenes only), then the back link
/// when the parent exists and is visible to this viewer.
pub fn build_options(
    ranked: &[ChildSummary],
    scene_status: SceneStatus,
    visible_parent: Option<SceneId>,
) -> Vec<SceneOption> {
    let mut options = Vec::with_capacity(MAX_CHILDREN + 1);

    for child in ranked.iter().take(MAX_CHILDREN) {
        options.push(SceneOption {
            id: child.id,
            title: child.title.clone(),
        });
    }
    if scene_status == SceneStatus::Public {
        while options.len() < MAX_CHILDREN {
            options.push(SceneOption {
                id: CREATE_PLACEHOLDER_ID,
                title: CREATE_PLACEHOLDER_TITLE.to_string(),
            });
        }
    }
    if let Some(parent_id) = visible_parent {
        options.push(SceneOption {
            id: parent_id,
            title: GO_BACK_TITLE.to_string(),
        });
    }

    options
}
