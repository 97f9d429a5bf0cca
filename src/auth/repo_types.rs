use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::password::HashedPassword;

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,             // lower-cased, unique
    pub email: String,                // lower-cased, unique
    pub full_name: String,
    pub avatar: String,               // hosted media URL
    pub cover_image: String,          // empty when never uploaded
    pub password_hash: String,        // Argon2 PHC string, never serialized
    pub refresh_token: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Fields needed to insert a user. The hash can only come from `Hasher::hash`.
#[derive(Debug)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: String,
    pub cover_image: String,
    pub password_hash: HashedPassword,
}

/// Public part of the user returned to clients.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: String,
    pub cover_image: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            full_name: u.full_name,
            avatar: u.avatar,
            cover_image: u.cover_image,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_user_json_has_no_secrets() {
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            username: "ada".into(),
            email: "ada@x.com".into(),
            full_name: "Ada L".into(),
            avatar: "https://media.test/a.png".into(),
            cover_image: String::new(),
            password_hash: "$argon2id$v=19$secret".into(),
            refresh_token: Some("refresh-secret".into()),
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(PublicUser::from(user)).unwrap();
        assert_eq!(json["username"], "ada");
        assert_eq!(json["fullName"], "Ada L");
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("refreshToken").is_none());
        assert!(!json.to_string().contains("secret"));
    }
}
