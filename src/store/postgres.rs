// PostgreSQL implementation of the scene store, the production backend.

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, QueryBuilder, Row};
use std::future::Future;
use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::models::{
    ChildSummary, NewScene, NewVote, SceneId, SceneRecord, SceneStatus, TimeMillis, UserId,
    UserPermission, UserRecord, VoteStamp,
};
use crate::store::{day_key, SceneStore};

const STORE_CALL_TIMEOUT: Duration = Duration::from_secs(5);

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(url: &str) -> AppResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(STORE_CALL_TIMEOUT)
            .connect(url)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Postgres: {}", e)))?;

        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    pub async fn health_check(&self) -> AppResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Database health check failed: {}", e)))?;
        Ok(())
    }

    /// Creates the schema when absent. Existing data is never dropped.
    async fn initialize(&self) -> AppResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS scenes (
                id BIGSERIAL PRIMARY KEY,
                parent_id BIGINT REFERENCES scenes(id),
                creator_id BIGINT,
                creator_name TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                gif_id BIGINT NOT NULL,
                likes BIGINT NOT NULL DEFAULT 0,
                dislikes BIGINT NOT NULL DEFAULT 0,
                status INTEGER NOT NULL,
                created BIGINT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to create scenes table: {}", e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id BIGSERIAL PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                permission INTEGER NOT NULL DEFAULT 0,
                show_awaiting BOOLEAN NOT NULL DEFAULT FALSE,
                created BIGINT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to create users table: {}", e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS scene_votes (
                id BIGSERIAL PRIMARY KEY,
                owner_id BIGINT NOT NULL,
                scene_id BIGINT NOT NULL,
                vote INTEGER NOT NULL,
                created BIGINT NOT NULL,
                day TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to create votes table: {}", e)))?;

        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS scene_votes_owner_scene_day
             ON scene_votes (owner_id, scene_id, day)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to create vote index: {}", e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS scene_badges (
                scene_id BIGINT NOT NULL REFERENCES scenes(id),
                badge TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to create badges table: {}", e)))?;

        Ok(())
    }
}

async fn bounded<T, F>(what: &str, fut: F) -> AppResult<T>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(STORE_CALL_TIMEOUT, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(AppError::Database(format!("{}: {}", what, e))),
        Err(_) => Err(AppError::Timeout(format!(
            "{} exceeded {}s",
            what,
            STORE_CALL_TIMEOUT.as_secs()
        ))),
    }
}

fn scene_from_row(row: &PgRow) -> AppResult<SceneRecord> {
    let code: i32 = row.get("status");
    let status = SceneStatus::from_code(code)
        .ok_or_else(|| AppError::Internal(format!("unknown scene status code {}", code)))?;
    Ok(SceneRecord {
        id: row.get("id"),
        parent_id: row.get("parent_id"),
        creator_id: row.get("creator_id"),
        creator_name: row.get("creator_name"),
        title: row.get("title"),
        description: row.get("description"),
        gif_id: row.get("gif_id"),
        likes: row.get("likes"),
        dislikes: row.get("dislikes"),
        status,
        created: row.get("created"),
    })
}

#[async_trait]
impl SceneStore for PostgresStore {
    async fn scan_relations(&self) -> AppResult<Vec<(SceneId, Option<SceneId>)>> {
        let rows = bounded(
            "scan_relations",
            sqlx::query("SELECT id, parent_id FROM scenes ORDER BY id")
                .fetch_all(&self.pool),
        )
        .await?;
        Ok(rows
            .iter()
            .map(|row| (row.get("id"), row.get("parent_id")))
            .collect())
    }

    async fn get_scene(&self, id: SceneId) -> AppResult<Option<SceneRecord>> {
        let row = bounded(
            "get_scene",
            sqlx::query(
                "SELECT id, parent_id, creator_id, creator_name, title, description,
                        gif_id, likes, dislikes, status, created
                 FROM scenes WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(&self.pool),
        )
        .await?;
        row.as_ref().map(scene_from_row).transpose()
    }

    async fn get_scene_status(&self, id: SceneId) -> AppResult<Option<SceneStatus>> {
        let row = bounded(
            "get_scene_status",
            sqlx::query("SELECT status FROM scenes WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool),
        )
        .await?;
        row.map(|row| {
            let code: i32 = row.get("status");
            SceneStatus::from_code(code)
                .ok_or_else(|| AppError::Internal(format!("unknown scene status code {}", code)))
        })
        .transpose()
    }

    async fn get_child_summaries(&self, ids: &[SceneId]) -> AppResult<Vec<ChildSummary>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let mut builder = QueryBuilder::new(
            "SELECT s.id, s.title, s.likes, s.dislikes, s.status, s.creator_id,
                    (SELECT COUNT(*) FROM scene_badges b WHERE b.scene_id = s.id) AS badge_count
             FROM scenes s WHERE s.id IN (",
        );
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        builder.push(") ORDER BY s.id");

        let rows = bounded(
            "get_child_summaries",
            builder.build().fetch_all(&self.pool),
        )
        .await?;

        rows.iter()
            .map(|row| {
                let code: i32 = row.get("status");
                let status = SceneStatus::from_code(code).ok_or_else(|| {
                    AppError::Internal(format!("unknown scene status code {}", code))
                })?;
                Ok(ChildSummary {
                    id: row.get("id"),
                    title: row.get("title"),
                    likes: row.get("likes"),
                    dislikes: row.get("dislikes"),
                    badge_count: row.get("badge_count"),
                    status,
                    creator_id: row.get("creator_id"),
                })
            })
            .collect()
    }

    async fn insert_scene(&self, scene: &NewScene) -> AppResult<SceneId> {
        let row = bounded(
            "insert_scene",
            sqlx::query(
                "INSERT INTO scenes (parent_id, creator_id, creator_name, title, description,
                                     gif_id, status, created)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                 RETURNING id",
            )
            .bind(scene.parent_id)
            .bind(scene.creator_id)
            .bind(&scene.creator_name)
            .bind(&scene.title)
            .bind(&scene.description)
            .bind(scene.gif_id)
            .bind(scene.status.as_code())
            .bind(scene.created)
            .fetch_one(&self.pool),
        )
        .await?;
        Ok(row.get("id"))
    }

    async fn seed_root(&self, scene: &NewScene) -> AppResult<SceneId> {
        bounded(
            "seed_root",
            sqlx::query(
                "INSERT INTO scenes (id, parent_id, creator_id, creator_name, title, description,
                                     gif_id, status, created)
                 VALUES (0, NULL, $1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(scene.creator_id)
            .bind(&scene.creator_name)
            .bind(&scene.title)
            .bind(&scene.description)
            .bind(scene.gif_id)
            .bind(scene.status.as_code())
            .bind(scene.created)
            .execute(&self.pool),
        )
        .await?;
        Ok(0)
    }

    async fn set_scene_status(&self, id: SceneId, status: SceneStatus) -> AppResult<()> {
        bounded(
            "set_scene_status",
            sqlx::query("UPDATE scenes SET status = $1 WHERE id = $2")
                .bind(status.as_code())
                .bind(id)
                .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn increment_likes(&self, id: SceneId) -> AppResult<()> {
        bounded(
            "increment_likes",
            sqlx::query("UPDATE scenes SET likes = likes + 1 WHERE id = $1")
                .bind(id)
                .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn increment_dislikes(&self, id: SceneId) -> AppResult<()> {
        bounded(
            "increment_dislikes",
            sqlx::query("UPDATE scenes SET dislikes = dislikes + 1 WHERE id = $1")
                .bind(id)
                .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn votes_since(&self, owner: UserId, since: TimeMillis) -> AppResult<Vec<VoteStamp>> {
        let rows = bounded(
            "votes_since",
            sqlx::query(
                "SELECT scene_id, created FROM scene_votes
                 WHERE owner_id = $1 AND created >= $2
                 ORDER BY created DESC",
            )
            .bind(owner)
            .bind(since)
            .fetch_all(&self.pool),
        )
        .await?;
        Ok(rows
            .iter()
            .map(|row| VoteStamp {
                scene_id: row.get("scene_id"),
                created: row.get("created"),
            })
            .collect())
    }

    async fn insert_vote(&self, vote: &NewVote) -> AppResult<bool> {
        let day = day_key(vote.day);
        bounded("insert_vote", async {
            let result = sqlx::query(
                "INSERT INTO scene_votes (owner_id, scene_id, vote, created, day)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(vote.owner_id)
            .bind(vote.scene_id)
            .bind(vote.kind.as_code())
            .bind(vote.created)
            .bind(&day)
            .execute(&self.pool)
            .await;
            match result {
                Ok(_) => Ok(true),
                Err(sqlx::Error::Database(db))
                    if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation) =>
                {
                    Ok(false)
                }
                Err(e) => Err(e),
            }
        })
        .await
    }

    async fn get_user(&self, id: UserId) -> AppResult<Option<UserRecord>> {
        let row = bounded(
            "get_user",
            sqlx::query(
                "SELECT id, username, permission, show_awaiting, created
                 FROM users WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(&self.pool),
        )
        .await?;
        Ok(row.map(|row| UserRecord {
            id: row.get("id"),
            username: row.get("username"),
            permission: UserPermission::from_code(row.get("permission")),
            show_awaiting: row.get("show_awaiting"),
            created: row.get("created"),
        }))
    }

    async fn insert_user(
        &self,
        username: &str,
        permission: i32,
        show_awaiting: bool,
        created: TimeMillis,
    ) -> AppResult<UserId> {
        let row = bounded(
            "insert_user",
            sqlx::query(
                "INSERT INTO users (username, permission, show_awaiting, created)
                 VALUES ($1, $2, $3, $4)
                 RETURNING id",
            )
            .bind(username)
            .bind(permission)
            .bind(show_awaiting)
            .bind(created)
            .fetch_one(&self.pool),
        )
        .await?;
        Ok(row.get("id"))
    }

    async fn award_badge(&self, scene_id: SceneId, badge: &str) -> AppResult<()> {
        bounded(
            "award_badge",
            sqlx::query("INSERT INTO scene_badges (scene_id, badge) VALUES ($1, $2)")
                .bind(scene_id)
                .bind(badge)
                .execute(&self.pool),
        )
        .await?;
        Ok(())
    }
}
