use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use tracing::warn;

use crate::{
    auth::{
        cookies::{get_cookie, ACCESS_COOKIE_NAME},
        repo_types::PublicUser,
    },
    error::AppError,
    state::AppState,
};

/// Verifies the access token (cookie or bearer header) and resolves the user it names.
pub struct AuthUser(pub PublicUser);

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let auth = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = get_cookie(&parts.headers, ACCESS_COOKIE_NAME)
            .or_else(|| bearer_token(&parts.headers))
            .ok_or_else(|| AppError::unauthorized("unauthorized request"))?;

        let claims = state.keys.verify_access(token).map_err(|e| {
            warn!(error = %e, "access token rejected");
            AppError::unauthorized("invalid access token")
        })?;

        let user = state
            .users
            .find_by_id(claims.id)
            .await?
            .ok_or_else(|| {
                warn!(user_id = %claims.id, "access token for unknown user");
                AppError::unauthorized("invalid access token")
            })?;

        Ok(AuthUser(user.into()))
    }
}
