use std::sync::Arc;
use tracing::info;

use crate::{
    clock::{Clock, SystemClock},
    config::Config,
    engine::SceneEngine,
    media::PermissiveMedia,
    models::{NewScene, SceneStatus},
    store::{PostgresStore, SceneStore, SqliteStore},
};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SceneEngine>,
    pub store: Arc<dyn SceneStore>,
    pub config: Config,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store: Arc<dyn SceneStore> = if config.database.url.starts_with("postgres") {
            Arc::new(PostgresStore::connect(&config.database.url).await?)
        } else {
            Arc::new(SqliteStore::connect(&config.database.url).await?)
        };

        let clock = Arc::new(SystemClock);

        // The root scene is created out-of-band, never through the engine.
        if store.scan_relations().await?.is_empty() {
            store
                .seed_root(&NewScene {
                    parent_id: None,
                    creator_id: None,
                    creator_name: "storyteller".to_string(),
                    title: "The story begins".to_string(),
                    description: "A blank page waits for the first branch.".to_string(),
                    gif_id: 0,
                    status: SceneStatus::Public,
                    created: clock.now_millis(),
                })
                .await?;
            info!("seeded root scene");
        }

        let engine = Arc::new(SceneEngine::new(
            store.clone(),
            Arc::new(PermissiveMedia),
            clock,
        ));
        engine.build_cache().await?;

        Ok(Self {
            engine,
            store,
            config,
        })
    }
}
