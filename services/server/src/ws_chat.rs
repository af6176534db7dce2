//! The realtime endpoint: `GET /ws?token=` upgrade and inbound frame
//! dispatch.
//!
//! Inbound errors never tear the connection down: a frame that fails to
//! parse, names an unknown type, or hits a pipeline error is logged and the
//! next frame is processed.

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use chat_protocol::{ClientFrame, ReceiptStatus, ServerFrame};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth;
use crate::connection::{Connection, MAX_FRAME_BYTES};
use crate::errors::ChatError;
use crate::messaging;
use crate::repo::users;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

/// Token is checked before the upgrade: a bad token gets a plain 401, never
/// a WebSocket.
pub async fn ws_chat_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    let Some(token) = query.token else {
        return ChatError::Unauthenticated.into_response();
    };
    let user_id = match auth::verify_token(&state.config.jwt_secret, &token) {
        Ok(user_id) => user_id,
        Err(e) => return e.into_response(),
    };
    ws.max_message_size(MAX_FRAME_BYTES)
        .on_upgrade(move |socket| handle_chat_socket(socket, state, user_id))
}

async fn handle_chat_socket(socket: WebSocket, state: AppState, user_id: Uuid) {
    let (connection, handle) = Connection::open(user_id);
    if state.hub.register(handle).await.is_err() {
        // Shutting down; dropping the socket closes it.
        info!(user_id = %user_id, "connection refused during shutdown");
        return;
    }
    info!(user_id = %user_id, conn_id = %connection.conn_id, "chat connection established");
    connection.run(socket, state).await;
}

/// Routes one inbound text frame.  `ack_tx` reaches only the initiating
/// connection, for `message_sent` acknowledgements.
pub(crate) async fn dispatch_frame(
    state: &AppState,
    user_id: Uuid,
    conn_id: Uuid,
    ack_tx: &mpsc::Sender<String>,
    text: &str,
) {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            debug!(user_id = %user_id, error = %e, "dropping unparseable frame");
            return;
        }
    };

    match frame {
        ClientFrame::SendMessage(payload) => {
            let result = if let Some(receiver_id) = payload.to_user_id {
                messaging::send_direct_message(state, user_id, receiver_id, &payload.content).await
            } else if let Some(group_id) = payload.group_id {
                messaging::send_group_message(state, user_id, group_id, &payload.content).await
            } else {
                debug!(user_id = %user_id, "send_message without a target, dropping");
                return;
            };
            match result {
                Ok(event) => ack_sender(ack_tx, &ServerFrame::MessageSent(event)),
                Err(e) => {
                    warn!(user_id = %user_id, code = e.code(), error = %e, "send failed");
                }
            }
        }
        ClientFrame::MessageDelivered(payload) => {
            if let Err(e) = messaging::update_receipts(
                state,
                user_id,
                &[payload.message_id],
                ReceiptStatus::Delivered,
            )
            .await
            {
                warn!(user_id = %user_id, error = %e, "failed to mark delivered");
            }
        }
        ClientFrame::TypingStart(payload) => {
            let username = match users::find_by_id(&state.pool, user_id).await {
                Ok(Some(user)) => user.username,
                Ok(None) => {
                    warn!(user_id = %user_id, "typing from unknown user, dropping");
                    return;
                }
                Err(e) => {
                    warn!(user_id = %user_id, error = %e, "user lookup failed for typing event");
                    return;
                }
            };
            if let Err(e) = messaging::broadcast_typing(
                state,
                user_id,
                &username,
                payload.conversation_type,
                payload.target_id,
                true,
            )
            .await
            {
                warn!(user_id = %user_id, code = e.code(), "failed to broadcast typing_start");
            }
        }
        ClientFrame::TypingStop(payload) => {
            if let Err(e) = messaging::broadcast_typing(
                state,
                user_id,
                "",
                payload.conversation_type,
                payload.target_id,
                false,
            )
            .await
            {
                warn!(user_id = %user_id, code = e.code(), "failed to broadcast typing_stop");
            }
        }
        ClientFrame::SetActiveConversation(payload) => match payload.target_id {
            Some(target_id) => state.hub.set_active_conversation(
                user_id,
                conn_id,
                payload.conversation_type,
                target_id,
            ),
            None => state.hub.clear_active_conversation(user_id, conn_id),
        },
    }
}

fn ack_sender(ack_tx: &mpsc::Sender<String>, frame: &ServerFrame) {
    match serde_json::to_string(frame) {
        // Same overflow policy as fan-out: a full queue drops the ack.
        Ok(text) => {
            if ack_tx.try_send(text).is_err() {
                debug!("ack dropped, outbound queue full or closed");
            }
        }
        Err(e) => warn!(error = %e, "failed to encode ack frame"),
    }
}
