use axum::{
    extract::{FromRef, State},
    routing::post,
    Form, Json, Router,
};
use sqlx::PgPool;
use tracing::{info, instrument, warn};

use super::dto::{TokenRequest, TokenResponse};
use super::jwt::JwtKeys;
use super::password::verify_password;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::users::repo::User;

pub fn token_routes() -> Router<AppState> {
    Router::new().route("/token", post(issue_token))
}

/// Looks up the user and checks the password. Unknown usernames are
/// `NotFound`, bad passwords `InvalidCredentials`; the token endpoint
/// collapses both into a 401 so callers cannot probe for usernames.
pub async fn authenticate(db: &PgPool, username: &str, password: &str) -> ApiResult<User> {
    let user = User::find_by_username(db, username)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no user named '{username}'")))?;

    if !verify_password(password, &user.password_hash).map_err(ApiError::Internal)? {
        warn!(username, "password verification failed");
        return Err(ApiError::InvalidCredentials(
            "incorrect username or password".into(),
        ));
    }

    Ok(user)
}

#[instrument(skip(state, form))]
pub async fn issue_token(
    State(state): State<AppState>,
    Form(form): Form<TokenRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let user = authenticate(&state.db, &form.username, &form.password)
        .await
        .map_err(|e| match e {
            ApiError::NotFound(_) | ApiError::InvalidCredentials(_) => {
                ApiError::InvalidCredentials("incorrect username or password".into())
            }
            other => other,
        })?;

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(&user.username)?;

    info!(user_id = user.id, username = %user.username, "access token issued");
    Ok(Json(TokenResponse::bearer(token)))
}
