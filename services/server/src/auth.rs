//! Access tokens, password hashing, refresh tokens.
//!
//! Access tokens are HS256 JWTs carrying the user id in `sub`.  Refresh
//! tokens are opaque random strings; only their SHA-256 hash is stored, so a
//! database leak never yields usable tokens.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use base64::Engine as _;
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use uuid::Uuid;

use crate::errors::ChatError;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: Uuid,
    exp: i64,
    iat: i64,
}

pub fn generate_token(
    secret: &str,
    user_id: Uuid,
    expiration: Duration,
) -> Result<String, ChatError> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id,
        exp: now + expiration.as_secs() as i64,
        iat: now,
    };
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ChatError::Internal(format!("token signing failed: {e}")))
}

/// Opaque token -> user id.  Any decode/expiry/signature failure is an
/// authentication failure; the caller never learns which.
pub fn verify_token(secret: &str, token: &str) -> Result<Uuid, ChatError> {
    let data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ChatError::Unauthenticated)?;
    Ok(data.claims.sub)
}

pub fn hash_password(password: &str) -> Result<String, ChatError> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|e| ChatError::Internal(format!("password hashing failed: {e}")))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// Generates a fresh refresh token: (raw value for the cookie, hash for the
/// store).
pub fn new_refresh_token() -> (String, String) {
    let mut entropy = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut entropy);
    let raw = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(entropy);
    let hash = hash_refresh_token(&raw);
    (raw, hash)
}

pub fn hash_refresh_token(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

pub fn extract_bearer(authorization: &str) -> Option<&str> {
    authorization.strip_prefix("Bearer ")
}

/// The authenticated caller, extracted from the `Authorization` header.
///
/// Handlers that take `AuthUser` reject unauthenticated requests with 401
/// before the body runs.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ChatError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(extract_bearer)
            .ok_or(ChatError::Unauthenticated)?;
        let user_id = verify_token(&state.config.jwt_secret, token)?;
        Ok(Self(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip_recovers_user_id() {
        let user_id = Uuid::new_v4();
        let token = generate_token("s3cret", user_id, Duration::from_secs(60)).unwrap();
        assert_eq!(verify_token("s3cret", &token).unwrap(), user_id);
    }

    #[test]
    fn token_with_wrong_secret_is_rejected() {
        let token = generate_token("s3cret", Uuid::new_v4(), Duration::from_secs(60)).unwrap();
        assert!(matches!(
            verify_token("other", &token),
            Err(ChatError::Unauthenticated)
        ));
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(verify_token("s3cret", "not-a-jwt").is_err());
    }

    #[test]
    fn refresh_tokens_are_unique_and_hash_deterministically() {
        let (raw_a, hash_a) = new_refresh_token();
        let (raw_b, hash_b) = new_refresh_token();
        assert_ne!(raw_a, raw_b);
        assert_ne!(hash_a, hash_b);
        assert_eq!(hash_refresh_token(&raw_a), hash_a);
    }

    #[test]
    fn password_verify_accepts_only_the_original() {
        let hash = hash_password("hunter2").unwrap();
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
    }

    #[test]
    fn extract_bearer_handles_malformed_headers() {
        assert_eq!(extract_bearer("Bearer abc"), Some("abc"));
        assert_eq!(extract_bearer("Basic abc"), None);
        assert_eq!(extract_bearer(""), None);
    }
}
