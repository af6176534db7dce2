//! Inbox, history, and receipt queries.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use chat_protocol::{ConversationType, ReceiptStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::ChatError;
use crate::messaging;
use crate::repo::{conversations, groups, receipts, users};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub conv_type: ConversationType,
    pub target_id: Uuid,
    pub target_name: String,
    pub last_message: String,
    pub last_message_at: DateTime<Utc>,
    pub unread_count: i32,
}

/// `GET /conversations` -- the caller's inbox, most recent first, enriched
/// with display names.  A failed name lookup leaves the name empty rather
/// than failing the listing.
pub async fn get_conversations(
    State(state): State<AppState>,
    AuthUser(owner_id): AuthUser,
) -> Result<impl IntoResponse, ChatError> {
    let convs = conversations::find_by_user(&state.pool, owner_id).await?;

    let mut response = Vec::with_capacity(convs.len());
    for conv in convs {
        let target_name = match conv.conv_type {
            ConversationType::Dm => match users::find_by_id(&state.pool, conv.target_id).await {
                Ok(Some(user)) => user.username,
                Ok(None) => String::new(),
                Err(e) => {
                    warn!(target_id = %conv.target_id, error = %e, "failed to resolve DM peer name");
                    String::new()
                }
            },
            ConversationType::Group => match groups::find_by_id(&state.pool, conv.target_id).await
            {
                Ok(Some(group)) => group.name,
                Ok(None) => String::new(),
                Err(e) => {
                    warn!(target_id = %conv.target_id, error = %e, "failed to resolve group name");
                    String::new()
                }
            },
        };
        response.push(ConversationResponse {
            id: conv.id,
            conv_type: conv.conv_type,
            target_id: conv.target_id,
            target_name,
            last_message: conv.last_message,
            last_message_at: conv.last_message_at,
            unread_count: conv.unread_count,
        });
    }
    Ok(Json(response))
}

// Query params arrive as raw strings so that every validation failure maps
// to the same ERR_VALIDATION envelope.
#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    target_id: Option<String>,
    #[serde(rename = "type")]
    conv_type: Option<String>,
    limit: Option<String>,
    before_id: Option<String>,
}

const DEFAULT_HISTORY_LIMIT: i64 = 50;
const MAX_HISTORY_LIMIT: i64 = 200;

/// `GET /messages?target_id&type&limit&before_id` -- history page, newest
/// first.  Resets the caller's unread counter for the conversation.
pub async fn get_messages(
    State(state): State<AppState>,
    AuthUser(viewer_id): AuthUser,
    Query(query): Query<MessagesQuery>,
) -> Result<impl IntoResponse, ChatError> {
    let target_id: Uuid = query
        .target_id
        .as_deref()
        .ok_or_else(|| ChatError::Validation("target_id is required".to_owned()))?
        .parse()
        .map_err(|_| ChatError::Validation("invalid target_id".to_owned()))?;

    let conv_type = match query.conv_type.as_deref() {
        None => ConversationType::Dm,
        Some(raw) => ConversationType::parse(raw)
            .ok_or_else(|| ChatError::Validation("type must be DM or GROUP".to_owned()))?,
    };

    let limit = match query.limit.as_deref() {
        None => DEFAULT_HISTORY_LIMIT,
        Some(raw) => {
            let limit: i64 = raw
                .parse()
                .map_err(|_| ChatError::Validation("limit must be a positive integer".to_owned()))?;
            if limit < 1 {
                return Err(ChatError::Validation(
                    "limit must be a positive integer".to_owned(),
                ));
            }
            limit.min(MAX_HISTORY_LIMIT)
        }
    };

    let before_id = query
        .before_id
        .as_deref()
        .map(|raw| {
            raw.parse::<Uuid>()
                .map_err(|_| ChatError::Validation("invalid before_id".to_owned()))
        })
        .transpose()?;

    let page =
        messaging::get_history(&state, viewer_id, target_id, conv_type, limit, before_id).await?;

    // Viewing history clears the unread counter; best-effort.
    if let Err(e) = conversations::reset_unread(&state.pool, viewer_id, conv_type, target_id).await
    {
        warn!(viewer_id = %viewer_id, error = %e, "failed to reset unread counter");
    }

    Ok(Json(page))
}

/// `POST /messages/:id/read`
pub async fn mark_read(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(message_id): Path<String>,
) -> Result<impl IntoResponse, ChatError> {
    let message_id: Uuid = message_id
        .parse()
        .map_err(|_| ChatError::Validation("invalid message id".to_owned()))?;
    messaging::update_receipts(&state, user_id, &[message_id], ReceiptStatus::Read).await?;
    Ok(Json(json!({ "status": "READ", "message_id": message_id })))
}

/// `GET /messages/:id/receipts` -- parties only.
pub async fn get_receipts(
    State(state): State<AppState>,
    AuthUser(caller_id): AuthUser,
    Path(message_id): Path<String>,
) -> Result<impl IntoResponse, ChatError> {
    let message_id: Uuid = message_id
        .parse()
        .map_err(|_| ChatError::Validation("invalid message id".to_owned()))?;
    let found = messaging::get_message_receipts(&state, caller_id, message_id).await?;
    Ok(Json(found))
}

/// `GET /messages/unread-count` -- aggregate unread receipts for the caller.
pub async fn get_unread_count(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<impl IntoResponse, ChatError> {
    let unread = receipts::find_unread_count(&state.pool, user_id).await?;
    Ok(Json(json!({ "unread_count": unread })))
}
