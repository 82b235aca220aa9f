use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

pub type ApiResult<T> = Result<T, ApiError>;

/// Unified error taxonomy for every workflow in the service.
///
/// Handlers return `ApiResult<T>`; the `IntoResponse` impl below decides
/// the HTTP status and body shape in one place.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unknown username during authentication.
    #[error("{0}")]
    NotFound(String),

    /// Wrong password, or an invalid/expired/malformed bearer token.
    #[error("{0}")]
    InvalidCredentials(String),

    /// Duplicate username or email.
    #[error("{0}")]
    Conflict(String),

    /// Bad field value: empty after trim, too long, non-JPEG upload.
    #[error("{0}")]
    InvalidInput(String),

    /// Unexpected storage or filesystem failure. Details are logged,
    /// never sent to the client.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "not_found",
            ApiError::InvalidCredentials(_) => "invalid_credentials",
            ApiError::Conflict(_) => "conflict",
            ApiError::InvalidInput(_) => "invalid_input",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (status, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::InvalidCredentials(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            // Conflicts surface as 400, matching the public contract.
            ApiError::Conflict(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Internal(e) => {
                error!(error = %e, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorBody { error: code, message });
        let mut response = (status, body).into_response();
        if matches!(self, ApiError::InvalidCredentials(_)) {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                header::HeaderValue::from_static("Bearer"),
            );
        }
        response
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        // Unique indexes on username/email are the safety net for
        // registration races; the losing insert must become a Conflict,
        // not a 500.
        if let Some(db_err) = e.as_database_error() {
            if db_err.is_unique_violation() {
                return ApiError::Conflict("username or email already in use".into());
            }
        }
        match e {
            sqlx::Error::RowNotFound => ApiError::NotFound("record not found".into()),
            other => ApiError::Internal(other.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_maps_to_bad_request() {
        let resp = ApiError::Conflict("username taken".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn invalid_credentials_maps_to_401_with_challenge() {
        let resp = ApiError::InvalidCredentials("bad password".into()).into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            resp.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
    }

    #[test]
    fn internal_hides_details() {
        let resp = ApiError::Internal(anyhow::anyhow!("disk exploded")).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn not_found_maps_to_404() {
        let resp = ApiError::NotFound("no such user".into()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
