// HTTP interface - thin router glue over the scene engine. Authentication,
// sessions and rendering live in the fronting layer; this surface only
// resolves the forwarded user id and translates JSON in and out.

use axum::{
    extract::{FromRequestParts, Path, State},
    http::request::Parts,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app_state::AppState;
use crate::engine::{SceneDraft, ViewerContext};
use crate::error::AppError;
use crate::models::{SceneId, VoteKind};
use crate::store::SceneStore;

/// Header the fronting auth layer sets for authenticated requests.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Viewer extractor for routes that allow anonymous access.
pub struct MaybeViewer(pub Option<ViewerContext>);

/// Viewer extractor for routes that require a signed-in user.
pub struct RequireViewer(pub ViewerContext);

impl FromRequestParts<AppState> for MaybeViewer {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(raw) = parts.headers.get(USER_ID_HEADER) else {
            return Ok(MaybeViewer(None));
        };
        let user_id: i64 = raw
            .to_str()
            .ok()
            .and_then(|value| value.parse().ok())
            .ok_or_else(|| AppError::Unauthorized("Malformed user id header".to_string()))?;
        let user = state
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized(format!("Unknown user id={}", user_id)))?;
        Ok(MaybeViewer(Some(ViewerContext::from(&user))))
    }
}

impl FromRequestParts<AppState> for RequireViewer {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match MaybeViewer::from_request_parts(parts, state).await? {
            MaybeViewer(Some(viewer)) => Ok(RequireViewer(viewer)),
            MaybeViewer(None) => Err(AppError::Unauthorized("Sign in to continue".to_string())),
        }
    }
}

#[derive(Deserialize)]
struct RateRequest {
    rating: String,
}

#[derive(Deserialize)]
struct StatusRequest {
    status: String,
}

async fn fetch_scene_handler(
    State(state): State<AppState>,
    MaybeViewer(viewer): MaybeViewer,
    Path(id): Path<SceneId>,
) -> Result<Json<Value>, AppError> {
    let view = state.engine.fetch_scene(id, viewer.as_ref()).await?;
    Ok(Json(json!({
        "scene": view.scene,
        "options": view.options
    })))
}

async fn rate_scene_handler(
    State(state): State<AppState>,
    RequireViewer(viewer): RequireViewer,
    Path(id): Path<SceneId>,
    Json(request): Json<RateRequest>,
) -> Result<Json<Value>, AppError> {
    let kind = VoteKind::parse_name(&request.rating).ok_or_else(|| AppError::Validation {
        field: "rating".to_string(),
        message: "Rating type must be positive or negative".to_string(),
    })?;
    let receipt = state.engine.apply_vote(id, kind, viewer.user_id).await?;
    Ok(Json(json!({
        "info": format!(
            "Vote counted for scene id={}! Remaining daily ratings: {}",
            id, receipt.remaining
        ),
        "remaining": receipt.remaining,
        "credited": receipt.credited
    })))
}

async fn create_scene_handler(
    State(state): State<AppState>,
    RequireViewer(viewer): RequireViewer,
    Path(parent_id): Path<SceneId>,
    Json(draft): Json<SceneDraft>,
) -> Result<Json<Value>, AppError> {
    let id = state
        .engine
        .create_child_scene(parent_id, viewer.user_id, draft)
        .await?;
    Ok(Json(json!({
        "info": "Successfully created scene",
        "id": id
    })))
}

async fn set_status_handler(
    State(state): State<AppState>,
    RequireViewer(viewer): RequireViewer,
    Path(id): Path<SceneId>,
    Json(request): Json<StatusRequest>,
) -> Result<Json<Value>, AppError> {
    let change = state
        .engine
        .set_scene_status(id, &request.status, &viewer)
        .await?;
    Ok(Json(json!({ "id": id, "change": change })))
}

async fn totals_handler(State(state): State<AppState>) -> Json<Value> {
    let totals = state.engine.totals().await;
    Json(json!({
        "scene_count": totals.scene_count,
        "last_id": totals.last_id
    }))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/scene/{id}", get(fetch_scene_handler))
        .route("/scene/{id}/rate", post(rate_scene_handler))
        .route("/scene/{id}/status", post(set_status_handler))
        .route("/create/{id}", post(create_scene_handler))
        .route("/total", get(totals_handler))
        .with_state(state)
}
