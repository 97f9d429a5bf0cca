use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::{
        password::HashedPassword,
        repo_types::{NewUser, User},
    },
    error::StoreError,
};

/// Persistence for user records. Usernames and emails are passed in already normalized.
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Matches a user whose username equals `username` or whose email equals `email`.
    /// Absent identifiers never match.
    async fn find_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, StoreError>;

    async fn create(&self, user: NewUser) -> Result<User, StoreError>;

    /// Overwrites (or clears) the single stored refresh token.
    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> Result<(), StoreError>;

    async fn set_password_hash(&self, id: Uuid, hash: &HashedPassword) -> Result<(), StoreError>;

    async fn update_account(
        &self,
        id: Uuid,
        full_name: &str,
        email: &str,
    ) -> Result<Option<User>, StoreError>;

    async fn set_avatar(&self, id: Uuid, url: &str) -> Result<Option<User>, StoreError>;

    async fn set_cover_image(&self, id: Uuid, url: &str) -> Result<Option<User>, StoreError>;
}

const USER_COLUMNS: &str = "id, username, email, full_name, avatar, cover_image, \
                            password_hash, refresh_token, created_at, updated_at";

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE ($1::text IS NOT NULL AND username = $1)
               OR ($2::text IS NOT NULL AND email = $2)
            ORDER BY created_at ASC
            LIMIT 1
            "#
        ))
        .bind(username)
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let created = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, username, email, full_name, avatar, cover_image, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(&user.avatar)
        .bind(&user.cover_image)
        .bind(user.password_hash.as_str())
        .fetch_one(&self.db)
        .await?;
        Ok(created)
    }

    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET refresh_token = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(token)
            .bind(OffsetDateTime::now_utc())
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn set_password_hash(&self, id: Uuid, hash: &HashedPassword) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(hash.as_str())
            .bind(OffsetDateTime::now_utc())
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn update_account(
        &self,
        id: Uuid,
        full_name: &str,
        email: &str,
    ) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET full_name = $2, email = $3, updated_at = $4
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(full_name)
        .bind(email)
        .bind(OffsetDateTime::now_utc())
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn set_avatar(&self, id: Uuid, url: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET avatar = $2, updated_at = $3 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(url)
        .bind(OffsetDateTime::now_utc())
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn set_cover_image(&self, id: Uuid, url: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET cover_image = $2, updated_at = $3 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(url)
        .bind(OffsetDateTime::now_utc())
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }
}
