use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::ChatError;
use crate::repo::users;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    q: String,
}

/// `GET /users?q=` -- username search, always excluding the caller.
pub async fn search_users(
    State(state): State<AppState>,
    AuthUser(caller_id): AuthUser,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, ChatError> {
    let found = users::search(&state.pool, query.q.trim(), caller_id).await?;
    Ok(Json(found))
}

/// `GET /users/:id` -- public profile.
pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(_caller_id): AuthUser,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ChatError> {
    let user_id: Uuid = user_id
        .parse()
        .map_err(|_| ChatError::Validation("invalid user id".to_owned()))?;
    let user = users::find_by_id(&state.pool, user_id)
        .await?
        .ok_or_else(|| ChatError::NotFound("user not found".to_owned()))?;
    Ok(Json(user))
}
