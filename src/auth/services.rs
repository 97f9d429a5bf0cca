use lazy_static::lazy_static;
use regex::Regex;
use tempfile::NamedTempFile;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        jwt::TokenPair,
        repo_types::{NewUser, PublicUser, User},
    },
    error::AppError,
    state::AppState,
    storage::upload_temp_file,
};

/// Local part and host around a single `@`. Hosts without a dot are accepted.
pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Trims and lower-cases an identifier; blank input becomes `None`.
fn normalize(value: Option<&str>) -> Option<String> {
    value
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
}

fn required(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Registration input as received from the multipart form.
#[derive(Default)]
pub struct RegisterInput {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub avatar: Option<NamedTempFile>,
    pub cover_image: Option<NamedTempFile>,
}

#[derive(Debug)]
pub struct LoginOutcome {
    pub user: PublicUser,
    pub tokens: TokenPair,
}

#[instrument(skip_all)]
pub async fn register(st: &AppState, input: RegisterInput) -> Result<PublicUser, AppError> {
    let RegisterInput {
        full_name,
        email,
        username,
        password,
        avatar,
        cover_image,
    } = input;

    let (Some(full_name), Some(email), Some(username), Some(password)) = (
        required(full_name),
        normalize(email.as_deref()),
        normalize(username.as_deref()),
        password.filter(|p| !p.trim().is_empty()),
    ) else {
        return Err(AppError::validation("all fields are required"));
    };

    if !is_valid_email(&email) {
        warn!(%email, "invalid email");
        return Err(AppError::validation("invalid email"));
    }

    if st
        .users
        .find_by_username_or_email(Some(&username), Some(&email))
        .await?
        .is_some()
    {
        warn!(%username, %email, "username or email already registered");
        return Err(AppError::Conflict(
            "user with email or username already exists".into(),
        ));
    }

    let Some(avatar) = avatar else {
        return Err(AppError::validation("avatar file is required"));
    };

    let avatar_url = upload_temp_file(st.media.as_ref(), avatar)
        .await
        .map_err(|e| {
            warn!(error = %e, "avatar upload failed");
            AppError::Upload("avatar upload failed".into())
        })?;

    let cover_url = match cover_image {
        Some(cover) => upload_temp_file(st.media.as_ref(), cover)
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "cover image upload failed; continuing without it");
                String::new()
            }),
        None => String::new(),
    };

    let password_hash = st.hasher.hash(&password).await?;

    let user = st
        .users
        .create(NewUser {
            username,
            email,
            full_name,
            avatar: avatar_url,
            cover_image: cover_url,
            password_hash,
        })
        .await?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(user.into())
}

/// Signs a new pair and stores the refresh token, replacing the previous one.
async fn rotate_tokens(st: &AppState, user: &User) -> Result<TokenPair, AppError> {
    let tokens = st
        .keys
        .issue(user)
        .map_err(|e| AppError::Internal(e.context("generate access and refresh tokens")))?;
    st.users
        .set_refresh_token(user.id, Some(&tokens.refresh_token))
        .await?;
    Ok(tokens)
}

#[instrument(skip(st, password))]
pub async fn login(
    st: &AppState,
    username: Option<&str>,
    email: Option<&str>,
    password: Option<&str>,
) -> Result<LoginOutcome, AppError> {
    let username = normalize(username);
    let email = normalize(email);
    if username.is_none() && email.is_none() {
        return Err(AppError::validation("username or email is required"));
    }
    let password = password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::validation("password is required"))?;

    let Some(user) = st
        .users
        .find_by_username_or_email(username.as_deref(), email.as_deref())
        .await?
    else {
        warn!(?username, ?email, "login for unknown user");
        return Err(AppError::NotFound("user does not exist".into()));
    };

    if !st.hasher.verify(password, &user.password_hash).await? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::unauthorized("invalid user credentials"));
    }

    let tokens = rotate_tokens(st, &user).await?;

    info!(user_id = %user.id, username = %user.username, "user logged in");
    Ok(LoginOutcome {
        user: user.into(),
        tokens,
    })
}

#[instrument(skip(st))]
pub async fn logout(st: &AppState, user_id: Uuid) -> Result<(), AppError> {
    st.users.set_refresh_token(user_id, None).await?;
    info!(%user_id, "user logged out");
    Ok(())
}

#[instrument(skip_all)]
pub async fn refresh_session(st: &AppState, presented: Option<&str>) -> Result<TokenPair, AppError> {
    let presented = presented
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::unauthorized("unauthorized request"))?;

    let claims = st.keys.verify_refresh(presented).map_err(|e| {
        warn!(error = %e, "refresh token rejected");
        AppError::unauthorized("invalid refresh token")
    })?;

    let Some(user) = st.users.find_by_id(claims.id).await? else {
        warn!(user_id = %claims.id, "refresh token for unknown user");
        return Err(AppError::unauthorized("invalid refresh token"));
    };

    if user.refresh_token.as_deref() != Some(presented) {
        warn!(user_id = %user.id, "refresh token superseded or revoked");
        return Err(AppError::unauthorized("refresh token is expired or used"));
    }

    let tokens = rotate_tokens(st, &user).await?;
    info!(user_id = %user.id, "session refreshed");
    Ok(tokens)
}

#[instrument(skip(st, old_password, new_password))]
pub async fn change_password(
    st: &AppState,
    user_id: Uuid,
    old_password: Option<&str>,
    new_password: Option<&str>,
) -> Result<(), AppError> {
    let (Some(old_password), Some(new_password)) = (
        old_password.filter(|p| !p.is_empty()),
        new_password.filter(|p| !p.is_empty()),
    ) else {
        return Err(AppError::validation("old and new password are required"));
    };

    let user = st
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("user does not exist".into()))?;

    if !st.hasher.verify(old_password, &user.password_hash).await? {
        warn!(%user_id, "change password with wrong old password");
        return Err(AppError::unauthorized("invalid old password"));
    }

    let hash = st.hasher.hash(new_password).await?;
    st.users.set_password_hash(user_id, &hash).await?;
    info!(%user_id, "password changed");
    Ok(())
}

#[instrument(skip(st))]
pub async fn update_account(
    st: &AppState,
    user_id: Uuid,
    full_name: Option<&str>,
    email: Option<&str>,
) -> Result<PublicUser, AppError> {
    let (Some(full_name), Some(email)) = (
        required(full_name.map(str::to_string)),
        normalize(email),
    ) else {
        return Err(AppError::validation("full name and email are required"));
    };
    if !is_valid_email(&email) {
        return Err(AppError::validation("invalid email"));
    }

    let user = st
        .users
        .update_account(user_id, &full_name, &email)
        .await?
        .ok_or_else(|| AppError::NotFound("user does not exist".into()))?;

    info!(%user_id, "account details updated");
    Ok(user.into())
}

/// Which profile image an upload replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileImage {
    Avatar,
    CoverImage,
}

impl ProfileImage {
    fn label(self) -> &'static str {
        match self {
            ProfileImage::Avatar => "avatar",
            ProfileImage::CoverImage => "cover image",
        }
    }
}

#[instrument(skip(st, file))]
pub async fn update_profile_image(
    st: &AppState,
    user_id: Uuid,
    kind: ProfileImage,
    file: Option<NamedTempFile>,
) -> Result<PublicUser, AppError> {
    let file = file.ok_or_else(|| AppError::validation(format!("{} file is missing", kind.label())))?;

    let url = upload_temp_file(st.media.as_ref(), file)
        .await
        .map_err(|e| {
            warn!(error = %e, %user_id, "{} upload failed", kind.label());
            AppError::Upload(format!("error while uploading {}", kind.label()))
        })?;

    let updated = match kind {
        ProfileImage::Avatar => st.users.set_avatar(user_id, &url).await?,
        ProfileImage::CoverImage => st.users.set_cover_image(user_id, &url).await?,
    };
    let user = updated.ok_or_else(|| AppError::NotFound("user does not exist".into()))?;

    info!(%user_id, %url, "{} updated", kind.label());
    Ok(user.into())
}
