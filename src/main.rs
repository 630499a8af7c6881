// Storytree Server - collaborative branching-story engine

use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use storytree::{app_state::AppState, config::Config, http::create_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load configuration
    let config = Config::from_env()?;

    // Build storage, seed the root if needed, build the relation cache.
    // Any failure here is fatal; requests are never served without a cache.
    let app_state = AppState::new(config.clone()).await?;

    let app = Router::new()
        .nest("/api", create_router(app_state))
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = config.server_address().parse()?;
    tracing::info!("storytree server listening on http://{}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
