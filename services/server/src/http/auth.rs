//! Registration, login, refresh, logout.
//!
//! Access tokens travel in the JSON body; refresh tokens only ever travel in
//! an HTTP-only cookie scoped to `/auth`.  Refresh rotates: the presented
//! token is revoked and a new one is issued.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration as ChronoDuration, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::auth::{
    generate_token, hash_password, hash_refresh_token, new_refresh_token, verify_password,
};
use crate::errors::ChatError;
use crate::repo::{refresh_tokens, users};
use crate::state::AppState;

const REFRESH_COOKIE: &str = "refresh_token";

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ChatError> {
    let username = req.username.trim();
    if username.is_empty() || username.len() > 50 {
        return Err(ChatError::Validation(
            "username must be 1-50 characters".to_owned(),
        ));
    }
    if !req.email.contains('@') {
        return Err(ChatError::Validation("email is not valid".to_owned()));
    }
    if req.password.len() < 6 {
        return Err(ChatError::Validation(
            "password must be at least 6 characters".to_owned(),
        ));
    }

    if users::find_by_email(&state.pool, &req.email).await?.is_some() {
        return Err(ChatError::Conflict("email already registered".to_owned()));
    }

    let password_hash = hash_password(&req.password)?;
    let user = users::create(&state.pool, username, &req.email, &password_hash).await?;
    info!(user_id = %user.id, "user registered");

    let (token, cookie) = issue_tokens(&state, user.id).await?;
    Ok((
        StatusCode::CREATED,
        jar.add(cookie),
        Json(json!({ "token": token, "user": user })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ChatError> {
    let user = users::find_by_email(&state.pool, &req.email)
        .await?
        .ok_or(ChatError::Unauthenticated)?;
    if !verify_password(&req.password, &user.password_hash) {
        return Err(ChatError::Unauthenticated);
    }

    let (token, cookie) = issue_tokens(&state, user.id).await?;
    Ok((
        StatusCode::OK,
        jar.add(cookie),
        Json(json!({ "token": token, "user": user })),
    ))
}

pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ChatError> {
    let raw = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_owned())
        .ok_or(ChatError::Unauthenticated)?;

    let stored = refresh_tokens::get_by_hash(&state.pool, &hash_refresh_token(&raw))
        .await?
        .ok_or(ChatError::Unauthenticated)?;
    if stored.revoked {
        // Replay of a rotated-out token: assume the worst and cut the whole
        // family for this user.
        warn!(user_id = %stored.user_id, "revoked refresh token presented, revoking all");
        refresh_tokens::revoke_by_user(&state.pool, stored.user_id).await?;
        return Err(ChatError::Unauthenticated);
    }
    if stored.expires_at <= Utc::now() {
        return Err(ChatError::Unauthenticated);
    }

    // Rotation: the old token dies with this request.
    refresh_tokens::revoke(&state.pool, stored.id).await?;
    let (token, cookie) = issue_tokens(&state, stored.user_id).await?;
    Ok((StatusCode::OK, jar.add(cookie), Json(json!({ "token": token }))))
}

pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ChatError> {
    if let Some(cookie) = jar.get(REFRESH_COOKIE) {
        if let Some(stored) =
            refresh_tokens::get_by_hash(&state.pool, &hash_refresh_token(cookie.value())).await?
        {
            refresh_tokens::revoke(&state.pool, stored.id).await?;
        }
    }
    let jar = jar.remove(Cookie::build((REFRESH_COOKIE, "")).path("/auth"));
    Ok((StatusCode::OK, jar, Json(json!({ "status": "ok" }))))
}

/// Issues a fresh access token plus a refresh cookie for `user_id`.
async fn issue_tokens(
    state: &AppState,
    user_id: uuid::Uuid,
) -> Result<(String, Cookie<'static>), ChatError> {
    let token = generate_token(&state.config.jwt_secret, user_id, state.config.jwt_expiration)?;

    let (raw_refresh, refresh_hash) = new_refresh_token();
    let expires_at = Utc::now()
        + ChronoDuration::seconds(state.config.refresh_token_ttl.as_secs() as i64);
    refresh_tokens::create(&state.pool, user_id, &refresh_hash, expires_at).await?;

    let cookie = Cookie::build((REFRESH_COOKIE, raw_refresh))
        .path("/auth")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    Ok((token, cookie))
}
