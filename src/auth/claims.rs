use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity a session token is issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub user_id: Uuid,
    pub email: String,
    pub name: Option<String>,
}

/// JWT payload used for authentication.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: Uuid,  // user ID
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub iat: i64,   // issued at (unix timestamp)
    pub exp: i64,   // expires at (unix timestamp)
    pub iss: String,
    pub aud: String,
}
