// Relation cache - the denormalized parent/children index over the whole
// scene tree. Built once from a full store scan, grown append-only on scene
// creation, never shrunk. Purely derived state: rebuilding from the store at
// any point must reproduce it exactly.

use std::collections::HashMap;

use crate::models::{SceneId, MAX_CHILDREN};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Relation {
    parent: Option<SceneId>,
    children: Vec<SceneId>,
}

/// Adjacency index keyed by scene id, plus tree-wide counters.
///
/// `scene_count` excludes the root; `last_id` is the highest id ever seen,
/// which can differ from the count when accounts were deleted and left holes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationCache {
    entries: HashMap<SceneId, Relation>,
    scene_count: i64,
    last_id: SceneId,
}

impl Default for RelationCache {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            scene_count: -1,
            last_id: -1,
        }
    }
}

impl RelationCache {
    /// Builds the cache from a full `(id, parent_id)` scan, rows in id order.
    /// Children whose parent is missing from the scan are kept as entries but
    /// not linked anywhere, matching what the store itself would answer.
    pub fn build(rows: &[(SceneId, Option<SceneId>)]) -> Self {
        let mut entries: HashMap<SceneId, Relation> = HashMap::with_capacity(rows.len());
        for (child, parent) in rows {
            entries.insert(
                *child,
                Relation {
                    parent: *parent,
                    children: Vec::new(),
                },
            );
        }
        for (child, parent) in rows {
            if let Some(parent) = parent {
                if let Some(entry) = entries.get_mut(parent) {
                    entry.children.push(*child);
                }
            }
        }

        // Excludes the root, whose parent is null.
        let scene_count = rows.len() as i64 - 1;
        let last_id = rows.iter().fold(-1, |max, (id, _)| max.max(*id));

        Self {
            entries,
            scene_count,
            last_id,
        }
    }

    /// Registers a freshly created scene under its parent. Returns false
    /// without mutating anything when `child` already has an entry or
    /// `parent` has none. Callers must serialize inserts per parent: two
    /// near-simultaneous inserts must not both pass the free-slot check.
    pub fn insert(&mut self, child: SceneId, parent: SceneId) -> bool {
        if self.entries.contains_key(&child) {
            return false;
        }
        if !self.entries.contains_key(&parent) {
            return false;
        }

        self.entries.insert(
            child,
            Relation {
                parent: Some(parent),
                children: Vec::new(),
            },
        );
        if let Some(entry) = self.entries.get_mut(&parent) {
            entry.children.push(child);
        }

        self.scene_count += 1;
        if self.last_id < child {
            self.last_id = child;
        }
        true
    }

    pub fn exists(&self, id: SceneId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn parent_id(&self, id: SceneId) -> Option<SceneId> {
        self.entries.get(&id).and_then(|entry| entry.parent)
    }

    pub fn children_ids(&self, id: SceneId) -> Vec<SceneId> {
        self.entries
            .get(&id)
            .map(|entry| entry.children.clone())
            .unwrap_or_default()
    }

    /// The ordered id chain `[id, parent, grandparent, ..]` ending at the
    /// root. A lone unknown id yields just itself.
    pub fn chain_to_root(&self, id: SceneId) -> Vec<SceneId> {
        let mut chain = vec![id];
        let mut current = match self.entries.get(&id) {
            Some(entry) => entry,
            None => return chain,
        };
        while let Some(parent) = current.parent {
            chain.push(parent);
            match self.entries.get(&parent) {
                Some(entry) => current = entry,
                None => break,
            }
        }
        chain
    }

    pub fn has_free_child_slot(&self, id: SceneId) -> bool {
        self.entries
            .get(&id)
            .map(|entry| entry.children.len() < MAX_CHILDREN)
            .unwrap_or(false)
    }

    pub fn max_children(&self) -> usize {
        MAX_CHILDREN
    }

    pub fn scene_count(&self) -> i64 {
        self.scene_count
    }

    pub fn last_id(&self) -> SceneId {
        self.last_id
    }
}
