use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    channels::dto::{ChannelProfile, VideoOwner, WatchedVideo},
    error::StoreError,
};

/// Read side over users, subscriptions and videos.
#[async_trait]
pub trait ChannelRepo: Send + Sync {
    /// `username` is already lower-cased. `viewer` decides `is_subscribed`.
    async fn channel_profile(
        &self,
        username: &str,
        viewer: Uuid,
    ) -> Result<Option<ChannelProfile>, StoreError>;

    /// Videos in watch order, oldest entry first.
    async fn watch_history(&self, user_id: Uuid) -> Result<Vec<WatchedVideo>, StoreError>;
}

#[derive(Debug, FromRow)]
struct WatchHistoryRow {
    id: Uuid,
    title: String,
    description: String,
    video_file: String,
    thumbnail: String,
    duration: f64,
    views: i64,
    created_at: OffsetDateTime,
    owner_full_name: String,
    owner_username: String,
    owner_avatar: String,
}

impl From<WatchHistoryRow> for WatchedVideo {
    fn from(r: WatchHistoryRow) -> Self {
        Self {
            id: r.id,
            title: r.title,
            description: r.description,
            video_file: r.video_file,
            thumbnail: r.thumbnail,
            duration: r.duration,
            views: r.views,
            created_at: r.created_at,
            owner: VideoOwner {
                full_name: r.owner_full_name,
                username: r.owner_username,
                avatar: r.owner_avatar,
            },
        }
    }
}

#[derive(Clone)]
pub struct PgChannelRepo {
    db: PgPool,
}

impl PgChannelRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ChannelRepo for PgChannelRepo {
    async fn channel_profile(
        &self,
        username: &str,
        viewer: Uuid,
    ) -> Result<Option<ChannelProfile>, StoreError> {
        let profile = sqlx::query_as::<_, ChannelProfile>(
            r#"
            SELECT u.id, u.username, u.email, u.full_name, u.avatar, u.cover_image,
                   (SELECT COUNT(*) FROM subscriptions s WHERE s.channel_id = u.id)
                       AS subscribers_count,
                   (SELECT COUNT(*) FROM subscriptions s WHERE s.subscriber_id = u.id)
                       AS channels_subscribed_to_count,
                   EXISTS (SELECT 1 FROM subscriptions s
                            WHERE s.channel_id = u.id AND s.subscriber_id = $2)
                       AS is_subscribed
            FROM users u
            WHERE u.username = $1
            "#,
        )
        .bind(username)
        .bind(viewer)
        .fetch_optional(&self.db)
        .await?;
        Ok(profile)
    }

    async fn watch_history(&self, user_id: Uuid) -> Result<Vec<WatchedVideo>, StoreError> {
        let rows = sqlx::query_as::<_, WatchHistoryRow>(
            r#"
            SELECT v.id, v.title, v.description, v.video_file, v.thumbnail,
                   v.duration, v.views, v.created_at,
                   o.full_name AS owner_full_name,
                   o.username  AS owner_username,
                   o.avatar    AS owner_avatar
              FROM watch_history w
              JOIN videos v ON v.id = w.video_id
              JOIN users  o ON o.id = v.owner_id
             WHERE w.user_id = $1
             ORDER BY w.position ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(WatchedVideo::from).collect())
    }
}
