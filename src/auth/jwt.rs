use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use crate::config::JwtConfig;
use crate::error::ApiError;
use crate::state::AppState;

/// JWT payload: the subject username plus issued-at/expiry instants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: usize,
    pub exp: usize,
}

/// Signing and verification keys derived from the configured secret,
/// threaded in from [`AppState`] rather than read from a global.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    pub default_ttl: TimeDuration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let JwtConfig {
            secret,
            ttl_minutes,
        } = state.config.jwt.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            default_ttl: TimeDuration::minutes(ttl_minutes),
        }
    }
}

impl JwtKeys {
    /// Signs an access token for `username` with the default lifetime.
    pub fn sign(&self, username: &str) -> Result<String, ApiError> {
        self.sign_with_ttl(username, self.default_ttl)
    }

    pub fn sign_with_ttl(&self, username: &str, ttl: TimeDuration) -> Result<String, ApiError> {
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            sub: username.to_string(),
            iat: now.unix_timestamp() as usize,
            exp: (now + ttl).unix_timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| ApiError::Internal(e.into()))?;
        debug!(username, "jwt signed");
        Ok(token)
    }

    /// Returns the verified claims, or `InvalidCredentials` for a bad
    /// signature, malformed payload, or past expiry.
    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(|_| ApiError::InvalidCredentials("invalid or expired token".into()))?;
        debug!(username = %data.claims.sub, "jwt verified");
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys() -> JwtKeys {
        let state = AppState::fake();
        JwtKeys::from_ref(&state)
    }

    #[tokio::test]
    async fn sign_and_verify_returns_subject() {
        let keys = make_keys();
        let token = keys.sign("ann").expect("sign");
        let claims = keys.verify(&token).expect("verify");
        assert_eq!(claims.sub, "ann");
        assert!(claims.exp > claims.iat);
    }

    #[tokio::test]
    async fn verify_rejects_expired_token() {
        let keys = make_keys();
        // Beyond the default 60s validation leeway.
        let token = keys
            .sign_with_ttl("ann", TimeDuration::seconds(-120))
            .expect("sign");
        let err = keys.verify(&token).unwrap_err();
        assert!(matches!(err, ApiError::InvalidCredentials(_)));
    }

    #[tokio::test]
    async fn verify_rejects_wrong_secret() {
        let keys = make_keys();
        let token = keys.sign("ann").expect("sign");

        let other = JwtKeys {
            encoding: EncodingKey::from_secret(b"different-secret"),
            decoding: DecodingKey::from_secret(b"different-secret"),
            default_ttl: TimeDuration::minutes(30),
        };
        assert!(matches!(
            other.verify(&token),
            Err(ApiError::InvalidCredentials(_))
        ));
    }

    #[tokio::test]
    async fn verify_rejects_garbage() {
        let keys = make_keys();
        assert!(matches!(
            keys.verify("not.a.jwt"),
            Err(ApiError::InvalidCredentials(_))
        ));
    }
}
