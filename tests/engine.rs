// End-to-end engine tests over the in-memory SQLite store.

use chrono::{DateTime, Duration, Local, TimeZone};
use std::sync::Arc;

use storytree::clock::FixedClock;
use storytree::engine::{
    RelationCache, SceneDraft, SceneEngine, StatusChange, ViewerContext, CREATE_PLACEHOLDER_ID,
};
use storytree::error::AppError;
use storytree::media::AllowListMedia;
use storytree::models::{
    NewScene, SceneId, SceneStatus, UserId, UserPermission, VoteKind, MAX_CHILDREN,
};
use storytree::store::{SceneStore, SqliteStore};

const GIF: i64 = 101;

fn noon() -> DateTime<Local> {
    Local
        .with_ymd_and_hms(2024, 5, 10, 12, 0, 0)
        .single()
        .expect("valid local time")
}

struct Harness {
    store: Arc<SqliteStore>,
    engine: Arc<SceneEngine>,
    clock: Arc<FixedClock>,
}

impl Harness {
    async fn new() -> Self {
        let store = Arc::new(SqliteStore::in_memory().await.expect("store"));
        seed_root(store.as_ref()).await;
        Self::over(store).await
    }

    async fn over(store: Arc<SqliteStore>) -> Self {
        let clock = Arc::new(FixedClock::new(noon()));
        let engine = Arc::new(SceneEngine::new(
            store.clone(),
            Arc::new(AllowListMedia::new([GIF])),
            clock.clone(),
        ));
        engine.build_cache().await.expect("cache build");
        Harness {
            store,
            engine,
            clock,
        }
    }

    async fn user(&self, name: &str, permission: UserPermission) -> UserId {
        self.store
            .insert_user(name, permission.as_code(), false, 0)
            .await
            .expect("user")
    }

    async fn likes(&self, id: SceneId) -> i64 {
        self.store
            .get_scene(id)
            .await
            .expect("get_scene")
            .expect("scene row")
            .likes
    }

    async fn create(&self, parent: SceneId, author: UserId, title: &str) -> SceneId {
        self.engine
            .create_child_scene(parent, author, draft(title))
            .await
            .expect("create scene")
    }
}

async fn seed_root(store: &dyn SceneStore) {
    store
        .seed_root(&NewScene {
            parent_id: None,
            creator_id: None,
            creator_name: "storyteller".to_string(),
            title: "The story begins".to_string(),
            description: "x".repeat(80),
            gif_id: GIF,
            status: SceneStatus::Public,
            created: 0,
        })
        .await
        .expect("seed root");
}

fn draft(title: &str) -> SceneDraft {
    SceneDraft {
        title: title.to_string(),
        description: "x".repeat(80),
        gif_id: GIF,
    }
}

#[tokio::test]
async fn member_creation_awaits_review_and_fills_slot() {
    let h = Harness::new().await;
    let author = h.user("newcomer", UserPermission::Member).await;

    let id = h.create(0, author, "First branch").await;

    let scene = h.store.get_scene(id).await.unwrap().unwrap();
    assert_eq!(scene.status, SceneStatus::AwaitingReview);
    assert_eq!(scene.parent_id, Some(0));
    assert_eq!(scene.creator_id, Some(author));

    let cache = h.engine.cache_snapshot().await;
    assert_eq!(cache.children_ids(0), vec![id]);
    assert!(cache.has_free_child_slot(0));
    assert_eq!(cache.last_id(), id);
    assert_eq!(cache.scene_count(), 1);
}

#[tokio::test]
async fn fourth_child_is_rejected_and_cache_unchanged() {
    let h = Harness::new().await;
    let author = h.user("trusted", UserPermission::Trusted).await;
    for i in 0..MAX_CHILDREN {
        h.create(0, author, &format!("Branch number {}", i)).await;
    }

    let before = h.engine.cache_snapshot().await;
    let err = h
        .engine
        .create_child_scene(0, author, draft("One branch too many"))
        .await
        .expect_err("fourth child must fail");
    assert!(matches!(err, AppError::SlotsFull(_)), "got {:?}", err);
    assert_eq!(h.engine.cache_snapshot().await, before);
}

#[tokio::test]
async fn short_title_is_field_tagged_and_writes_nothing() {
    let h = Harness::new().await;
    let author = h.user("author", UserPermission::Member).await;

    let err = h
        .engine
        .create_child_scene(0, author, draft("1234"))
        .await
        .expect_err("short title must fail");
    match err {
        AppError::Validation { field, .. } => assert_eq!(field, "title"),
        other => panic!("expected validation error, got {:?}", other),
    }

    assert_eq!(h.store.scan_relations().await.unwrap().len(), 1, "root only");
    assert!(h.engine.cache_snapshot().await.children_ids(0).is_empty());
}

#[tokio::test]
async fn short_description_and_bad_gif_are_rejected() {
    let h = Harness::new().await;
    let author = h.user("author", UserPermission::Member).await;

    let err = h
        .engine
        .create_child_scene(
            0,
            author,
            SceneDraft {
                title: "A fine title".to_string(),
                description: "x".repeat(79),
                gif_id: GIF,
            },
        )
        .await
        .expect_err("short description must fail");
    assert!(
        matches!(err, AppError::Validation { ref field, .. } if field == "description"),
        "got {:?}",
        err
    );

    let err = h
        .engine
        .create_child_scene(
            0,
            author,
            SceneDraft {
                title: "A fine title".to_string(),
                description: "x".repeat(80),
                gif_id: 999,
            },
        )
        .await
        .expect_err("unknown gif must fail");
    assert!(
        matches!(err, AppError::Validation { ref field, .. } if field == "gif_id"),
        "got {:?}",
        err
    );
}

#[tokio::test]
async fn unreviewed_parent_accepts_no_children() {
    let h = Harness::new().await;
    let member = h.user("member", UserPermission::Member).await;
    let child = h.create(0, member, "Pending branch").await;

    let err = h
        .engine
        .create_child_scene(child, member, draft("Grandchild"))
        .await
        .expect_err("unreviewed parent must reject children");
    assert!(matches!(err, AppError::ParentNotPublic(_)), "got {:?}", err);
}

#[tokio::test]
async fn missing_parent_is_not_found() {
    let h = Harness::new().await;
    let author = h.user("author", UserPermission::Member).await;
    let err = h
        .engine
        .create_child_scene(999, author, draft("Orphan branch"))
        .await
        .expect_err("missing parent must fail");
    assert!(matches!(err, AppError::NotFound(_)), "got {:?}", err);
}

#[tokio::test]
async fn concurrent_creation_has_exactly_one_winner() {
    let h = Harness::new().await;
    let author = h.user("trusted", UserPermission::Trusted).await;
    h.create(0, author, "Branch one").await;
    h.create(0, author, "Branch two").await;

    let (a, b) = tokio::join!(
        h.engine.create_child_scene(0, author, draft("Last slot A")),
        h.engine.create_child_scene(0, author, draft("Last slot B")),
    );

    let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one creation may win: {:?} / {:?}", a, b);
    let loser = if a.is_err() { a } else { b };
    assert!(matches!(loser, Err(AppError::SlotsFull(_))));
    assert_eq!(
        h.engine.cache_snapshot().await.children_ids(0).len(),
        MAX_CHILDREN
    );
}

#[tokio::test]
async fn positive_vote_credits_at_most_ten_ancestors() {
    let h = Harness::new().await;
    let author = h.user("trusted", UserPermission::Trusted).await;

    // Linear chain under the root, depth 15.
    let mut parent = 0;
    let mut chain = vec![0];
    for i in 0..15 {
        parent = h.create(parent, author, &format!("Chapter {}", i)).await;
        chain.push(parent);
    }
    let deepest = parent;

    let voter = h.user("voter", UserPermission::Member).await;
    let receipt = h
        .engine
        .apply_vote(deepest, VoteKind::Positive, voter)
        .await
        .expect("vote");
    assert_eq!(receipt.credited, 10);
    assert_eq!(receipt.remaining, 4);

    // The ten closest get the like, everything above stays untouched.
    for &id in chain.iter().rev().take(10) {
        assert_eq!(h.likes(id).await, 1, "scene {} should be credited", id);
    }
    for &id in chain.iter().rev().skip(10) {
        assert_eq!(h.likes(id).await, 0, "scene {} is past the cap", id);
    }
}

#[tokio::test]
async fn propagation_halts_at_already_credited_ancestor() {
    let h = Harness::new().await;
    let author = h.user("trusted", UserPermission::Trusted).await;
    let a = h.create(0, author, "Middle scene").await;
    let b = h.create(a, author, "Leaf scene").await;

    let voter = h.user("voter", UserPermission::Member).await;
    let first = h.engine.apply_vote(a, VoteKind::Positive, voter).await.expect("vote a");
    assert_eq!(first.credited, 2, "scene and root");

    h.clock.advance(Duration::seconds(1));
    let second = h.engine.apply_vote(b, VoteKind::Positive, voter).await.expect("vote b");
    assert_eq!(second.credited, 1, "halts at the credited parent");

    assert_eq!(h.likes(b).await, 1);
    assert_eq!(h.likes(a).await, 1);
    assert_eq!(h.likes(0).await, 1, "root is never reached past the halt");
}

#[tokio::test]
async fn negative_vote_touches_only_the_target() {
    let h = Harness::new().await;
    let author = h.user("trusted", UserPermission::Trusted).await;
    let a = h.create(0, author, "Disliked scene").await;

    let voter = h.user("voter", UserPermission::Member).await;
    let receipt = h
        .engine
        .apply_vote(a, VoteKind::Negative, voter)
        .await
        .expect("vote");
    assert_eq!(receipt.remaining, 4);
    assert_eq!(receipt.credited, 1);

    let scene = h.store.get_scene(a).await.unwrap().unwrap();
    assert_eq!(scene.dislikes, 1);
    assert_eq!(scene.likes, 0);
    let root = h.store.get_scene(0).await.unwrap().unwrap();
    assert_eq!(root.dislikes, 0);
}

#[tokio::test]
async fn same_scene_same_day_is_a_duplicate() {
    let h = Harness::new().await;
    let author = h.user("trusted", UserPermission::Trusted).await;
    let a = h.create(0, author, "Voted scene").await;

    let voter = h.user("voter", UserPermission::Member).await;
    h.engine.apply_vote(a, VoteKind::Positive, voter).await.expect("first vote");

    h.clock.advance(Duration::seconds(1));
    let err = h
        .engine
        .apply_vote(a, VoteKind::Negative, voter)
        .await
        .expect_err("second vote same day must fail");
    match err {
        AppError::DuplicateVote { scene_id, remaining } => {
            assert_eq!(scene_id, a);
            assert_eq!(remaining, 4, "reports the allowance before this attempt");
        }
        other => panic!("expected duplicate vote, got {:?}", other),
    }

    // Next local day the same scene is votable again.
    h.clock.set(
        Local
            .with_ymd_and_hms(2024, 5, 11, 10, 0, 0)
            .single()
            .expect("valid local time"),
    );
    let receipt = h
        .engine
        .apply_vote(a, VoteKind::Negative, voter)
        .await
        .expect("vote next day");
    assert_eq!(receipt.remaining, 4);
}

#[tokio::test]
async fn five_actions_exhaust_the_daily_allowance() {
    let h = Harness::new().await;
    let author = h.user("trusted", UserPermission::Trusted).await;
    let a = h.create(0, author, "Branch aaaa").await;
    let b = h.create(0, author, "Branch bbbb").await;
    let a1 = h.create(a, author, "Leaf one").await;
    let a2 = h.create(a, author, "Leaf two").await;
    let a3 = h.create(a, author, "Leaf three").await;
    let b1 = h.create(b, author, "Leaf four").await;

    let voter = h.user("voter", UserPermission::Member).await;
    let mut remaining = 5;
    for scene in [a, b, a1, a2, a3] {
        let receipt = h
            .engine
            .apply_vote(scene, VoteKind::Positive, voter)
            .await
            .expect("vote within allowance");
        remaining -= 1;
        // Ancestor fan-out shares one timestamp and costs one action.
        assert_eq!(receipt.remaining, remaining);
        h.clock.advance(Duration::seconds(1));
    }

    let err = h
        .engine
        .apply_vote(b1, VoteKind::Positive, voter)
        .await
        .expect_err("sixth action must be limited");
    match err {
        AppError::RateLimited { seconds_left } => {
            assert!(seconds_left > 0 && seconds_left <= 12 * 3600);
        }
        other => panic!("expected rate limit, got {:?}", other),
    }
}

#[tokio::test]
async fn votes_require_public_scenes_that_exist() {
    let h = Harness::new().await;
    let member = h.user("member", UserPermission::Member).await;
    let pending = h.create(0, member, "Pending branch").await;

    let voter = h.user("voter", UserPermission::Member).await;
    let err = h
        .engine
        .apply_vote(pending, VoteKind::Positive, voter)
        .await
        .expect_err("unreviewed scene is not votable");
    assert!(matches!(err, AppError::NotPublic(_)), "got {:?}", err);

    let err = h
        .engine
        .apply_vote(999, VoteKind::Positive, voter)
        .await
        .expect_err("unknown scene");
    assert!(matches!(err, AppError::NotFound(_)), "got {:?}", err);
}

#[tokio::test]
async fn fetch_builds_options_with_placeholders_and_back_link() {
    let h = Harness::new().await;
    let author = h.user("trusted", UserPermission::Trusted).await;
    let child = h.create(0, author, "Only branch").await;

    let root_view = h.engine.fetch_scene(0, None).await.expect("fetch root");
    let ids: Vec<_> = root_view.options.iter().map(|o| o.id).collect();
    assert_eq!(ids, vec![child, CREATE_PLACEHOLDER_ID, CREATE_PLACEHOLDER_ID]);

    let child_view = h.engine.fetch_scene(child, None).await.expect("fetch child");
    let ids: Vec<_> = child_view.options.iter().map(|o| o.id).collect();
    assert_eq!(
        ids,
        vec![
            CREATE_PLACEHOLDER_ID,
            CREATE_PLACEHOLDER_ID,
            CREATE_PLACEHOLDER_ID,
            0
        ],
        "empty public scene offers three placeholders and the way back"
    );
}

#[tokio::test]
async fn fetch_hides_unreviewed_content_by_role() {
    let h = Harness::new().await;
    let member = h.user("member", UserPermission::Member).await;
    let pending = h.create(0, member, "Pending branch").await;

    // Anonymous viewers see neither the child option nor the scene.
    let root_view = h.engine.fetch_scene(0, None).await.expect("fetch root");
    assert!(root_view.options.iter().all(|o| o.id != pending));
    let err = h
        .engine
        .fetch_scene(pending, None)
        .await
        .expect_err("anonymous fetch of pending scene");
    assert!(matches!(err, AppError::NotVisible(_)), "got {:?}", err);

    // The creator sees their own pending scene; no placeholders under it.
    let creator = ViewerContext::new(member, UserPermission::Member, false);
    let view = h
        .engine
        .fetch_scene(pending, Some(&creator))
        .await
        .expect("creator fetch");
    let ids: Vec<_> = view.options.iter().map(|o| o.id).collect();
    assert_eq!(ids, vec![0], "only the back link, no create slots");

    // Moderators and review-queue opt-ins see it listed under the root.
    for viewer in [
        ViewerContext::new(999, UserPermission::Moderator, false),
        ViewerContext::new(998, UserPermission::Member, true),
    ] {
        let view = h
            .engine
            .fetch_scene(0, Some(&viewer))
            .await
            .expect("privileged fetch");
        assert!(view.options.iter().any(|o| o.id == pending));
    }
}

#[tokio::test]
async fn fetch_ranks_children_by_badges_then_ratio() {
    let h = Harness::new().await;
    let author = h.user("trusted", UserPermission::Trusted).await;
    let c1 = h.create(0, author, "Branch one").await;
    let c2 = h.create(0, author, "Branch two").await;
    let c3 = h.create(0, author, "Branch three").await;

    h.store.award_badge(c3, "featured").await.unwrap();
    h.store.award_badge(c3, "classic").await.unwrap();
    h.store.award_badge(c1, "featured").await.unwrap();

    let view = h.engine.fetch_scene(0, None).await.expect("fetch");
    let ids: Vec<_> = view.options.iter().map(|o| o.id).collect();
    assert_eq!(ids, vec![c3, c1, c2]);
}

#[tokio::test]
async fn moderation_flow_publishes_pending_scenes() {
    let h = Harness::new().await;
    let member = h.user("member", UserPermission::Member).await;
    let pending = h.create(0, member, "Pending branch").await;

    let moderator = ViewerContext::new(
        h.user("moderator", UserPermission::Moderator).await,
        UserPermission::Moderator,
        false,
    );

    let err = h
        .engine
        .set_scene_status(pending, "rejected", &moderator)
        .await
        .expect_err("unknown status name");
    assert!(
        matches!(err, AppError::Validation { ref field, .. } if field == "status"),
        "got {:?}",
        err
    );

    let member_viewer = ViewerContext::new(member, UserPermission::Member, false);
    let err = h
        .engine
        .set_scene_status(pending, "public", &member_viewer)
        .await
        .expect_err("members cannot moderate");
    assert!(matches!(err, AppError::Forbidden(_)), "got {:?}", err);

    let change = h
        .engine
        .set_scene_status(pending, "public", &moderator)
        .await
        .expect("publish");
    assert_eq!(change, StatusChange::Updated);
    let change = h
        .engine
        .set_scene_status(pending, "public", &moderator)
        .await
        .expect("republish");
    assert_eq!(change, StatusChange::Unchanged);

    // Once public the scene accepts children and votes.
    h.create(pending, member, "Now it grows").await;
    let voter = h.user("voter", UserPermission::Member).await;
    h.engine
        .apply_vote(pending, VoteKind::Positive, voter)
        .await
        .expect("vote on published scene");
}

#[tokio::test]
async fn incremental_cache_matches_full_rebuild() {
    let h = Harness::new().await;
    let author = h.user("trusted", UserPermission::Trusted).await;
    let a = h.create(0, author, "Branch aaaa").await;
    let b = h.create(0, author, "Branch bbbb").await;
    h.create(a, author, "Leaf one").await;
    h.create(a, author, "Leaf two").await;
    h.create(b, author, "Leaf three").await;

    let rows = h.store.scan_relations().await.expect("scan");
    let rebuilt = RelationCache::build(&rows);
    assert_eq!(h.engine.cache_snapshot().await, rebuilt);
}

#[tokio::test]
async fn cache_rebuild_survives_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!(
        "sqlite:{}?mode=rwc",
        dir.path().join("storytree.db").display()
    );

    let snapshot_before = {
        let store = Arc::new(SqliteStore::connect(&url).await.expect("store"));
        seed_root(store.as_ref()).await;
        let h = Harness::over(store).await;
        let author = h.user("trusted", UserPermission::Trusted).await;
        let a = h.create(0, author, "Branch aaaa").await;
        h.create(a, author, "Leaf one").await;
        h.engine.cache_snapshot().await
    };

    // A fresh process rebuilds an identical cache from storage alone.
    let store = Arc::new(SqliteStore::connect(&url).await.expect("reopen"));
    let h = Harness::over(store).await;
    assert_eq!(h.engine.cache_snapshot().await, snapshot_before);

    let totals = h.engine.totals().await;
    assert_eq!(totals.scene_count, 2);
    assert_eq!(totals.last_id, 2);
}

#[tokio::test]
async fn totals_track_creations() {
    let h = Harness::new().await;
    let totals = h.engine.totals().await;
    assert_eq!(totals.scene_count, 0);
    assert_eq!(totals.last_id, 0);

    let author = h.user("trusted", UserPermission::Trusted).await;
    let id = h.create(0, author, "Branch one").await;
    let totals = h.engine.totals().await;
    assert_eq!(totals.scene_count, 1);
    assert_eq!(totals.last_id, id);
}
