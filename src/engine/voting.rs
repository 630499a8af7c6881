// Voting engine - applies a rating to a scene, propagating likes up the
// ancestor chain under the daily per-voter allowance.

use chrono::NaiveTime;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

use super::SceneEngine;
use crate::clock::Clock;
use crate::error::{AppError, AppResult};
use crate::models::{NewVote, SceneId, SceneStatus, UserId, VoteKind};
use crate::store::SceneStore;

/// Distinct vote actions a user gets per local day. One positive action may
/// write many ancestor rows; they share a timestamp and count once.
pub const MAX_DAILY_VOTES: i64 = 5;

/// Positive votes stop propagating past this many ancestors. An intentional
/// cost bound for deeply nested scenes, not an error.
pub const VOTE_CHAIN_LIMIT: usize = 10;

/// Successful vote outcome reported to the caller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VoteReceipt {
    /// Vote actions left today, already accounting for this one.
    pub remaining: i64,
    /// How many scenes had their counters credited.
    pub credited: usize,
}

impl SceneEngine {
    /// Applies one vote. Checks run cheapest first: cache existence, then
    /// the voter's daily ledger, then the scene's status from storage.
    pub async fn apply_vote(
        &self,
        scene_id: SceneId,
        kind: VoteKind,
        voter_id: UserId,
    ) -> AppResult<VoteReceipt> {
        // One vote action per voter at a time; closes the race between the
        // ledger read and the rows it decides to write.
        let _guard = self.voter_locks().acquire(voter_id).await;

        if !self.relations().read().await.exists(scene_id) {
            return Err(AppError::NotFound(format!(
                "Scene id={} does not exist or has been removed",
                scene_id
            )));
        }

        let now = self.clock().now();
        let day_start = now - now.time().signed_duration_since(NaiveTime::MIN);
        let stamps = self
            .store()
            .votes_since(voter_id, day_start.timestamp_millis())
            .await?;

        let mut voted_scenes: HashSet<SceneId> = HashSet::new();
        let mut batch_times: HashSet<i64> = HashSet::new();
        for stamp in &stamps {
            voted_scenes.insert(stamp.scene_id);
            batch_times.insert(stamp.created);
        }
        let remaining = MAX_DAILY_VOTES - batch_times.len() as i64;

        if voted_scenes.contains(&scene_id) {
            return Err(AppError::DuplicateVote {
                scene_id,
                remaining,
            });
        }
        if remaining <= 0 {
            let next_midnight = day_start + chrono::Duration::days(1);
            return Err(AppError::RateLimited {
                seconds_left: (next_midnight - now).num_seconds(),
            });
        }

        let status = self.store().get_scene_status(scene_id).await?.ok_or_else(|| {
            AppError::Internal(format!("scene {} in cache but missing from store", scene_id))
        })?;
        if status != SceneStatus::Public {
            return Err(AppError::NotPublic(format!(
                "Scene id={} cannot be rated yet",
                scene_id
            )));
        }

        // Every row written by this action shares one timestamp; the daily
        // allowance is counted in distinct timestamps, not rows.
        let created = now.timestamp_millis();
        let day = now.date_naive();
        let vote_row = |scene_id: SceneId| NewVote {
            owner_id: voter_id,
            scene_id,
            kind,
            created,
            day,
        };

        let credited = match kind {
            VoteKind::Negative => {
                if !self.store().insert_vote(&vote_row(scene_id)).await? {
                    return Err(AppError::DuplicateVote {
                        scene_id,
                        remaining,
                    });
                }
                self.store().increment_dislikes(scene_id).await?;
                1
            }
            VoteKind::Positive => {
                let chain = self.relations().read().await.chain_to_root(scene_id);
                // Closest ancestors first, capped, halting at the first
                // ancestor already credited today.
                let targets: Vec<SceneId> = chain
                    .into_iter()
                    .take(VOTE_CHAIN_LIMIT)
                    .take_while(|id| !voted_scenes.contains(id))
                    .collect();
                let (first, ancestors) = match targets.split_first() {
                    Some((first, ancestors)) => (*first, ancestors),
                    None => {
                        return Err(AppError::Internal(format!(
                            "empty vote chain for scene {}",
                            scene_id
                        )))
                    }
                };

                // The target scene itself: a constraint hit here means a
                // concurrent duplicate and fails the whole action.
                if !self.store().insert_vote(&vote_row(first)).await? {
                    return Err(AppError::DuplicateVote {
                        scene_id,
                        remaining,
                    });
                }
                self.store().increment_likes(first).await?;

                let writes = ancestors.iter().map(|&ancestor| {
                    let store = self.store().clone();
                    let vote = vote_row(ancestor);
                    async move {
                        if store.insert_vote(&vote).await? {
                            store.increment_likes(ancestor).await?;
                            Ok::<usize, AppError>(1)
                        } else {
                            // Already credited by a concurrent batch.
                            warn!("vote row for ancestor {} already present, skipping", ancestor);
                            Ok(0)
                        }
                    }
                });
                1 + try_join_all(writes).await?.into_iter().sum::<usize>()
            }
        };

        debug!(
            "voter {} rated scene {} ({:?}), {} scenes credited",
            voter_id, scene_id, kind, credited
        );
        Ok(VoteReceipt {
            remaining: remaining - 1,
            credited,
        })
    }
}
