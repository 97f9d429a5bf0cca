use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payload of the short-lived access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessClaims {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub full_name: String,
    pub jti: Uuid,  // unique per issuance
    pub iat: usize, // issued at (unix timestamp)
    pub exp: usize, // expires at (unix timestamp)
    pub iss: String,
    pub aud: String,
}

/// Payload of the refresh token: identity only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub jti: Uuid,
    pub iat: usize,
    pub exp: usize,
    pub iss: String,
    pub aud: String,
}
