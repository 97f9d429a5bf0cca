use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub access_secret: String,
    pub access_ttl: Duration,
    pub refresh_secret: String,
    pub refresh_ttl: Duration,
    pub issuer: String,
    pub audience: String,
}

/// S3-compatible bucket that hosts avatars and cover images.
#[derive(Debug, Clone)]
pub struct MediaConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    /// Base URL under which uploaded objects are publicly reachable.
    pub public_url: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub password_hash_cost: u32,
    pub cors_origin: Option<String>,
    pub upload_dir: PathBuf,
    pub media: MediaConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL")?;

        let jwt = JwtConfig {
            access_secret: std::env::var("ACCESS_TOKEN_SECRET").context("ACCESS_TOKEN_SECRET")?,
            access_ttl: parse_ttl(
                &std::env::var("ACCESS_TOKEN_EXPIRY").unwrap_or_else(|_| "1d".into()),
            )
            .context("ACCESS_TOKEN_EXPIRY")?,
            refresh_secret: std::env::var("REFRESH_TOKEN_SECRET")
                .context("REFRESH_TOKEN_SECRET")?,
            refresh_ttl: parse_ttl(
                &std::env::var("REFRESH_TOKEN_EXPIRY").unwrap_or_else(|_| "10d".into()),
            )
            .context("REFRESH_TOKEN_EXPIRY")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "channelhub".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "channelhub-users".into()),
        };

        let media = MediaConfig {
            endpoint: std::env::var("MEDIA_ENDPOINT").context("MEDIA_ENDPOINT")?,
            bucket: std::env::var("MEDIA_BUCKET").context("MEDIA_BUCKET")?,
            access_key: std::env::var("MEDIA_ACCESS_KEY").context("MEDIA_ACCESS_KEY")?,
            secret_key: std::env::var("MEDIA_SECRET_KEY").context("MEDIA_SECRET_KEY")?,
            region: std::env::var("MEDIA_REGION").unwrap_or_else(|_| "us-east-1".into()),
            public_url: std::env::var("MEDIA_PUBLIC_URL").context("MEDIA_PUBLIC_URL")?,
        };

        let password_hash_cost =
            parse_hash_cost(std::env::var("PASSWORD_HASH_COST").ok().as_deref())
                .context("PASSWORD_HASH_COST")?;

        Ok(Self {
            database_url,
            jwt,
            password_hash_cost,
            cors_origin: std::env::var("CORS_ORIGIN").ok().filter(|v| !v.is_empty()),
            upload_dir: std::env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./public/temp")),
            media,
        })
    }
}

/// Argon2 time cost; unset means 2.
pub fn parse_hash_cost(raw: Option<&str>) -> anyhow::Result<u32> {
    let Some(raw) = raw else {
        return Ok(2);
    };
    let cost: u32 = raw
        .trim()
        .parse()
        .with_context(|| format!("invalid hash cost {raw:?}"))?;
    anyhow::ensure!(cost > 0, "hash cost must be positive");
    Ok(cost)
}

/// Longest accepted token lifetime.
pub const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Parses expiry values such as `15m`, `1d`, `12h`, `30s` or a bare number of seconds.
pub fn parse_ttl(raw: &str) -> anyhow::Result<Duration> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    let amount: u64 = digits
        .parse()
        .with_context(|| format!("invalid duration {raw:?}"))?;
    let unit_secs: u64 = match unit {
        "" | "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 60 * 60 * 24,
        other => anyhow::bail!("unknown duration unit {other:?}"),
    };
    let secs = amount
        .checked_mul(unit_secs)
        .with_context(|| format!("duration {raw:?} overflows"))?;
    anyhow::ensure!(secs > 0, "duration must be positive");
    anyhow::ensure!(
        secs <= MAX_TTL.as_secs(),
        "duration {raw:?} exceeds {} days",
        MAX_TTL.as_secs() / 86_400
    );
    Ok(Duration::from_secs(secs))
}
