use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::extractors::AuthUser,
    channels::{
        dto::{ChannelProfile, WatchedVideo},
        services,
    },
    error::AppError,
    response::ApiResponse,
    state::AppState,
};

pub fn channel_routes() -> Router<AppState> {
    Router::new()
        .route("/channel/:username", get(get_channel_profile))
        .route("/watch-history", get(get_watch_history))
}

#[instrument(skip(state, viewer), fields(viewer_id = %viewer.0.id))]
pub async fn get_channel_profile(
    State(state): State<AppState>,
    viewer: AuthUser,
    Path(username): Path<String>,
) -> Result<Json<ApiResponse<ChannelProfile>>, AppError> {
    let profile = services::get_channel_profile(&state, &username, viewer.0.id).await?;
    Ok(Json(ApiResponse::new(
        StatusCode::OK,
        profile,
        "user channel fetched successfully",
    )))
}

#[instrument(skip(state, user), fields(user_id = %user.0.id))]
pub async fn get_watch_history(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<Vec<WatchedVideo>>>, AppError> {
    let history = services::get_watch_history(&state, user.0.id).await?;
    Ok(Json(ApiResponse::new(
        StatusCode::OK,
        history,
        "watch history fetched successfully",
    )))
}
