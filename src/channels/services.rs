use tracing::warn;
use uuid::Uuid;

use crate::{
    channels::dto::{ChannelProfile, WatchedVideo},
    error::AppError,
    state::AppState,
};

pub async fn get_channel_profile(
    st: &AppState,
    username: &str,
    viewer: Uuid,
) -> Result<ChannelProfile, AppError> {
    let username = username.trim().to_lowercase();
    if username.is_empty() {
        return Err(AppError::validation("username is missing"));
    }

    match st.channels.channel_profile(&username, viewer).await? {
        Some(profile) => Ok(profile),
        None => {
            warn!(%username, "channel not found");
            Err(AppError::NotFound("channel does not exist".into()))
        }
    }
}

pub async fn get_watch_history(st: &AppState, user_id: Uuid) -> Result<Vec<WatchedVideo>, AppError> {
    Ok(st.channels.watch_history(user_id).await?)
}
