use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use super::jwt::JwtKeys;
use crate::error::ApiError;
use crate::state::AppState;
use crate::users::repo::User;

/// Extracts the bearer token, verifies it, and loads the acting user's
/// row. Rejection is always `InvalidCredentials` (401 + challenge).
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ApiError::InvalidCredentials("missing Authorization header".into())
            })?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .or_else(|| auth_header.strip_prefix("bearer "))
            .ok_or_else(|| ApiError::InvalidCredentials("invalid auth scheme".into()))?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify(token)?;

        let user = User::find_by_username(&state.db, &claims.sub)
            .await?
            .ok_or_else(|| {
                warn!(username = %claims.sub, "token subject no longer exists");
                ApiError::InvalidCredentials("invalid or expired token".into())
            })?;

        Ok(CurrentUser(user))
    }
}
