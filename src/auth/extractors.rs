use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::{auth::repo_types::User, error::ApiError, state::AppState};

/// Caller resolved from the `Authorization: Bearer <token>` header.
/// Any failure, including a missing header, rejects with [`ApiError::Unauthorized`].
pub struct AuthUser(pub User);

pub(crate) fn bearer_token(parts: &Parts) -> Option<&str> {
    let auth = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?;
    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = state.auth.identify(bearer_token(parts)).await?;
        Ok(AuthUser(user))
    }
}
