use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::ChatError;
use crate::repo::groups;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
    #[serde(default)]
    pub member_ids: Vec<Uuid>,
}

/// `POST /groups` -- creates the group with the caller as ADMIN and the
/// listed members as MEMBERs.  Individual member failures (unknown ids,
/// duplicates) are skipped, not fatal.
pub async fn create_group(
    State(state): State<AppState>,
    AuthUser(creator_id): AuthUser,
    Json(req): Json<CreateGroupRequest>,
) -> Result<impl IntoResponse, ChatError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ChatError::Validation("group name is required".to_owned()));
    }

    let group = groups::create(&state.pool, name).await?;
    groups::add_member(&state.pool, group.id, creator_id, groups::ROLE_ADMIN).await?;

    for member_id in req.member_ids {
        if member_id == creator_id {
            continue;
        }
        if let Err(e) =
            groups::add_member(&state.pool, group.id, member_id, groups::ROLE_MEMBER).await
        {
            warn!(group_id = %group.id, member_id = %member_id, error = %e,
                "skipping member that could not be added");
        }
    }

    info!(group_id = %group.id, creator_id = %creator_id, "group created");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "id": group.id, "name": group.name })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: Uuid,
}

/// `POST /groups/:id/members` -- ADMIN-only.
pub async fn add_member(
    State(state): State<AppState>,
    AuthUser(caller_id): AuthUser,
    Path(group_id): Path<String>,
    Json(req): Json<AddMemberRequest>,
) -> Result<impl IntoResponse, ChatError> {
    let group_id: Uuid = group_id
        .parse()
        .map_err(|_| ChatError::Validation("invalid group id".to_owned()))?;

    if groups::find_by_id(&state.pool, group_id).await?.is_none() {
        return Err(ChatError::NotFound("group not found".to_owned()));
    }
    if !groups::is_admin(&state.pool, group_id, caller_id).await? {
        return Err(ChatError::Forbidden);
    }
    if groups::is_member(&state.pool, group_id, req.user_id).await? {
        return Err(ChatError::Conflict("user is already a member".to_owned()));
    }

    groups::add_member(&state.pool, group_id, req.user_id, groups::ROLE_MEMBER).await?;
    Ok((StatusCode::OK, Json(json!({ "status": "ok" }))))
}
