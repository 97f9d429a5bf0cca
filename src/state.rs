use std::sync::Arc;

use anyhow::Context;

use crate::{
    auth::{
        jwt::JwtKeys,
        password::Hasher,
        repo::{PgUserRepo, UserRepo},
    },
    channels::repo::{ChannelRepo, PgChannelRepo},
    config::AppConfig,
    db,
    storage::{MediaHost, S3MediaHost},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepo>,
    pub channels: Arc<dyn ChannelRepo>,
    pub media: Arc<dyn MediaHost>,
    pub keys: JwtKeys,
    pub hasher: Hasher,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let pool = db::connect(&config.database_url).await?;
        db::migrate(&pool).await?;

        tokio::fs::create_dir_all(&config.upload_dir)
            .await
            .with_context(|| format!("create upload dir {}", config.upload_dir.display()))?;

        let media = Arc::new(S3MediaHost::new(&config.media).await?) as Arc<dyn MediaHost>;

        Self::from_parts(
            config,
            Arc::new(PgUserRepo::new(pool.clone())),
            Arc::new(PgChannelRepo::new(pool)),
            media,
        )
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserRepo>,
        channels: Arc<dyn ChannelRepo>,
        media: Arc<dyn MediaHost>,
    ) -> anyhow::Result<Self> {
        let keys = JwtKeys::new(&config.jwt);
        let hasher = Hasher::new(config.password_hash_cost)?;
        Ok(Self {
            config,
            users,
            channels,
            media,
            keys,
            hasher,
        })
    }
}
