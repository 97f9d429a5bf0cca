use axum::{
    extract::{
        multipart::MultipartRejection, rejection::JsonRejection, DefaultBodyLimit, Multipart,
        State,
    },
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse},
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::json;
use tracing::instrument;

use crate::{
    auth::{
        cookies::{
            cleared_cookie, get_cookie, token_cookie, ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME,
        },
        dto::{
            ChangePasswordRequest, LoginRequest, LoginResponse, RefreshRequest, TokensResponse,
            UpdateAccountRequest,
        },
        extractors::AuthUser,
        jwt::{JwtKeys, TokenPair},
        repo_types::PublicUser,
        services::{self, ProfileImage, RegisterInput},
    },
    error::AppError,
    response::ApiResponse,
    state::AppState,
    storage::read_multipart,
};

const UPLOAD_BODY_LIMIT: usize = 20 * 1024 * 1024; // 20MB

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/refresh-token", post(refresh_token))
}

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/change-password", post(change_password))
        .route("/current-user", get(current_user))
        .route("/update-account", patch(update_account))
}

pub fn upload_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/update-avatar", patch(update_avatar))
        .route("/update-cover", patch(update_cover_image))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(b)| b)
        .map_err(|e| AppError::validation(format!("invalid request body: {e}")))
}

fn multipart_body(mp: Result<Multipart, MultipartRejection>) -> Result<Multipart, AppError> {
    mp.map_err(|e| AppError::validation(format!("invalid multipart body: {e}")))
}

fn session_cookies(keys: &JwtKeys, tokens: &TokenPair) -> AppendHeaders<[(axum::http::HeaderName, String); 2]> {
    AppendHeaders([
        (
            SET_COOKIE,
            token_cookie(ACCESS_COOKIE_NAME, &tokens.access_token, keys.access_ttl),
        ),
        (
            SET_COOKIE,
            token_cookie(REFRESH_COOKIE_NAME, &tokens.refresh_token, keys.refresh_ttl),
        ),
    ])
}

#[instrument(skip(state, mp))]
pub async fn register(
    State(state): State<AppState>,
    mp: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<ApiResponse<PublicUser>>), AppError> {
    let mut form = read_multipart(&state.config.upload_dir, multipart_body(mp)?).await?;
    let input = RegisterInput {
        full_name: form.take_text("fullname"),
        email: form.take_text("email"),
        username: form.take_text("username"),
        password: form.take_text("password"),
        avatar: form.take_file("avatar"),
        cover_image: form.take_file("coverImage"),
    };

    let user = services::register(&state, input).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(
            StatusCode::CREATED,
            user,
            "user registered successfully",
        )),
    ))
}

#[instrument(skip(state, body))]
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let payload = json_body(body)?;
    let outcome = services::login(
        &state,
        payload.username.as_deref(),
        payload.email.as_deref(),
        payload.password.as_deref(),
    )
    .await?;

    let cookies = session_cookies(&state.keys, &outcome.tokens);
    Ok((
        StatusCode::OK,
        cookies,
        Json(ApiResponse::new(
            StatusCode::OK,
            LoginResponse {
                user: outcome.user,
                access_token: outcome.tokens.access_token,
                refresh_token: outcome.tokens.refresh_token,
            },
            "user logged in successfully",
        )),
    ))
}

#[instrument(skip(state, user), fields(user_id = %user.0.id))]
pub async fn logout(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    services::logout(&state, user.0.id).await?;
    Ok((
        StatusCode::OK,
        AppendHeaders([
            (SET_COOKIE, cleared_cookie(ACCESS_COOKIE_NAME)),
            (SET_COOKIE, cleared_cookie(REFRESH_COOKIE_NAME)),
        ]),
        Json(ApiResponse::new(StatusCode::OK, json!({}), "user logged out")),
    ))
}

/// The cookie wins over the body, matching browser clients that send both.
#[instrument(skip_all)]
pub async fn refresh_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<RefreshRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let from_body = body.and_then(|Json(b)| b.refresh_token);
    let presented = get_cookie(&headers, REFRESH_COOKIE_NAME)
        .map(str::to_string)
        .or(from_body);

    let tokens = services::refresh_session(&state, presented.as_deref()).await?;

    let cookies = session_cookies(&state.keys, &tokens);
    Ok((
        StatusCode::OK,
        cookies,
        Json(ApiResponse::new(
            StatusCode::OK,
            TokensResponse {
                access_token: tokens.access_token,
                refresh_token: tokens.refresh_token,
            },
            "access token refreshed",
        )),
    ))
}

#[instrument(skip(state, user, body), fields(user_id = %user.0.id))]
pub async fn change_password(
    State(state): State<AppState>,
    user: AuthUser,
    body: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let payload = json_body(body)?;
    services::change_password(
        &state,
        user.0.id,
        payload.old_password.as_deref(),
        payload.new_password.as_deref(),
    )
    .await?;
    Ok(Json(ApiResponse::new(
        StatusCode::OK,
        json!({}),
        "password changed successfully",
    )))
}

#[instrument(skip(user), fields(user_id = %user.0.id))]
pub async fn current_user(user: AuthUser) -> Json<ApiResponse<PublicUser>> {
    Json(ApiResponse::new(
        StatusCode::OK,
        user.0,
        "current user fetched successfully",
    ))
}

#[instrument(skip(state, user, body), fields(user_id = %user.0.id))]
pub async fn update_account(
    State(state): State<AppState>,
    user: AuthUser,
    body: Result<Json<UpdateAccountRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<PublicUser>>, AppError> {
    let payload = json_body(body)?;
    let updated = services::update_account(
        &state,
        user.0.id,
        payload.full_name.as_deref(),
        payload.email.as_deref(),
    )
    .await?;
    Ok(Json(ApiResponse::new(
        StatusCode::OK,
        updated,
        "account details updated successfully",
    )))
}

async fn update_image(
    state: AppState,
    user: AuthUser,
    mp: Result<Multipart, MultipartRejection>,
    kind: ProfileImage,
) -> Result<Json<ApiResponse<PublicUser>>, AppError> {
    let mut form = read_multipart(&state.config.upload_dir, multipart_body(mp)?).await?;
    let (field, message) = match kind {
        ProfileImage::Avatar => ("avatar", "avatar updated successfully"),
        ProfileImage::CoverImage => ("coverImage", "cover image updated successfully"),
    };
    let updated =
        services::update_profile_image(&state, user.0.id, kind, form.take_file(field)).await?;
    Ok(Json(ApiResponse::new(StatusCode::OK, updated, message)))
}

#[instrument(skip(state, user, mp), fields(user_id = %user.0.id))]
pub async fn update_avatar(
    State(state): State<AppState>,
    user: AuthUser,
    mp: Result<Multipart, MultipartRejection>,
) -> Result<Json<ApiResponse<PublicUser>>, AppError> {
    update_image(state, user, mp, ProfileImage::Avatar).await
}

#[instrument(skip(state, user, mp), fields(user_id = %user.0.id))]
pub async fn update_cover_image(
    State(state): State<AppState>,
    user: AuthUser,
    mp: Result<Multipart, MultipartRejection>,
) -> Result<Json<ApiResponse<PublicUser>>, AppError> {
    update_image(state, user, mp, ProfileImage::CoverImage).await
}
