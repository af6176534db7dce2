//! The message pipeline and its receipt/typing companions.
//!
//! Every send follows the same shape: authorize, persist, hydrate sender
//! info, create receipts, update per-user conversations, then fan the live
//! event out.  Persistence always completes before fan-out, so no subscriber
//! ever sees an event whose message is not durable.

use chat_protocol::{
    ConversationType, MessageEvent, ReceiptEvent, ReceiptStatus, ServerFrame, TypingEvent,
    TypingStoppedEvent,
};
use tracing::warn;
use uuid::Uuid;

use crate::errors::ChatError;
use crate::repo::{conversations, groups, messages, receipts, users};
use crate::state::AppState;

/// Sends a DM: persist, receipt the peer, bump both conversation rows, fan
/// out.  Returns the event so the caller can ack its own connection.
pub async fn send_direct_message(
    state: &AppState,
    sender_id: Uuid,
    receiver_id: Uuid,
    content: &str,
) -> Result<MessageEvent, ChatError> {
    if content.is_empty() {
        return Err(ChatError::Validation("content must not be empty".to_owned()));
    }
    if users::find_by_id(&state.pool, receiver_id).await?.is_none() {
        return Err(ChatError::NotFound("recipient not found".to_owned()));
    }

    let message = messages::create(
        &state.pool,
        sender_id,
        Some(receiver_id),
        None,
        content,
        ConversationType::Dm,
    )
    .await?;

    let sender_username = hydrate_username(state, sender_id).await;

    receipts::create(&state.pool, message.id, receiver_id, ReceiptStatus::Sent).await?;

    // Sender's own row never counts unread.
    if let Err(e) = conversations::touch_preview(
        &state.pool,
        sender_id,
        ConversationType::Dm,
        receiver_id,
        &message.content,
        message.created_at,
    )
    .await
    {
        warn!(sender_id = %sender_id, error = %e, "failed to update sender conversation");
    }

    let viewing = state
        .hub
        .is_user_viewing(receiver_id, ConversationType::Dm, sender_id);
    if let Err(e) = bump_recipient_conversation(
        state,
        receiver_id,
        ConversationType::Dm,
        sender_id,
        &message.content,
        message.created_at,
        viewing,
    )
    .await
    {
        warn!(receiver_id = %receiver_id, error = %e, "failed to update receiver conversation");
    }

    let event = message.into_event(sender_username);
    fan_out_new_message(state, &event, &[receiver_id, sender_id]);
    Ok(event)
}

/// Sends to a group: membership gate, persist, one receipt per member
/// (batched; failure aborts), conversation bookkeeping for every member,
/// fan out to all members including the sender's other devices.
pub async fn send_group_message(
    state: &AppState,
    sender_id: Uuid,
    group_id: Uuid,
    content: &str,
) -> Result<MessageEvent, ChatError> {
    if content.is_empty() {
        return Err(ChatError::Validation("content must not be empty".to_owned()));
    }
    if !groups::is_member(&state.pool, group_id, sender_id).await? {
        return Err(ChatError::NotMember);
    }

    let message = messages::create(
        &state.pool,
        sender_id,
        None,
        Some(group_id),
        content,
        ConversationType::Group,
    )
    .await?;

    let sender_username = hydrate_username(state, sender_id).await;

    let members = groups::get_members(&state.pool, group_id).await?;
    let recipient_ids: Vec<Uuid> = members
        .iter()
        .map(|m| m.user_id)
        .filter(|&id| id != sender_id)
        .collect();

    // The receipt set must match the recipient set at send time; a partial
    // batch would break that, so failure aborts the send.
    receipts::create_batch(&state.pool, message.id, &recipient_ids, ReceiptStatus::Sent).await?;

    if let Err(e) = conversations::touch_preview(
        &state.pool,
        sender_id,
        ConversationType::Group,
        group_id,
        &message.content,
        message.created_at,
    )
    .await
    {
        warn!(sender_id = %sender_id, error = %e, "failed to update sender conversation");
    }

    for &recipient in &recipient_ids {
        let viewing = state
            .hub
            .is_user_viewing(recipient, ConversationType::Group, group_id);
        if let Err(e) = bump_recipient_conversation(
            state,
            recipient,
            ConversationType::Group,
            group_id,
            &message.content,
            message.created_at,
            viewing,
        )
        .await
        {
            warn!(recipient = %recipient, error = %e, "failed to update member conversation");
        }
    }

    let event = message.into_event(sender_username);
    let mut targets = recipient_ids;
    targets.push(sender_id);
    fan_out_new_message(state, &event, &targets);
    Ok(event)
}

/// Marks receipts DELIVERED or READ for `user_id`, fanning a
/// `receipt_update` back to each message's sender.  Transitions that do not
/// advance the status emit nothing; per-id failures are skipped.
pub async fn update_receipts(
    state: &AppState,
    user_id: Uuid,
    message_ids: &[Uuid],
    status: ReceiptStatus,
) -> Result<(), ChatError> {
    for &message_id in message_ids {
        let updated_at =
            match receipts::update_status(&state.pool, message_id, user_id, status).await {
                Ok(Some(updated_at)) => updated_at,
                Ok(None) => continue, // already at or past this status
                Err(e) => {
                    warn!(message_id = %message_id, error = %e, "receipt update failed, skipping");
                    continue;
                }
            };

        let message = match messages::find_by_id(&state.pool, message_id).await {
            Ok(Some(message)) => message,
            Ok(None) => continue,
            Err(e) => {
                warn!(message_id = %message_id, error = %e, "message lookup failed, skipping");
                continue;
            }
        };

        if message.sender_id != user_id {
            state.hub.send_frame_to_user(
                message.sender_id,
                &ServerFrame::ReceiptUpdate(ReceiptEvent {
                    message_id,
                    user_id,
                    status,
                    updated_at,
                }),
            );
        }
    }
    Ok(())
}

/// Ephemeral typing broadcast: never persisted, never receipted.
pub async fn broadcast_typing(
    state: &AppState,
    user_id: Uuid,
    username: &str,
    conv_type: ConversationType,
    target_id: Uuid,
    is_typing: bool,
) -> Result<(), ChatError> {
    let frame = if is_typing {
        ServerFrame::UserTyping(TypingEvent {
            user_id,
            username: username.to_owned(),
            conversation_type: conv_type,
            target_id,
        })
    } else {
        ServerFrame::UserStoppedTyping(TypingStoppedEvent {
            user_id,
            conversation_type: conv_type,
            target_id,
        })
    };

    match conv_type {
        ConversationType::Dm => {
            if target_id != user_id {
                state.hub.send_frame_to_user(target_id, &frame);
            }
        }
        ConversationType::Group => {
            if !groups::is_member(&state.pool, target_id, user_id).await? {
                return Err(ChatError::NotMember);
            }
            let members = groups::get_members(&state.pool, target_id).await?;
            let text = serde_json::to_string(&frame)
                .map_err(|e| ChatError::Internal(format!("failed to encode typing frame: {e}")))?;
            for member in members {
                if member.user_id != user_id {
                    state.hub.send_to_user(member.user_id, &text);
                }
            }
        }
    }
    Ok(())
}

/// History page for one conversation.  Group history requires membership;
/// an unknown `before_id` cursor is an error, not a silent full page.
pub async fn get_history(
    state: &AppState,
    viewer_id: Uuid,
    target_id: Uuid,
    conv_type: ConversationType,
    limit: i64,
    before_id: Option<Uuid>,
) -> Result<Vec<messages::Message>, ChatError> {
    if conv_type == ConversationType::Group
        && !groups::is_member(&state.pool, target_id, viewer_id).await?
    {
        return Err(ChatError::Forbidden);
    }

    let before = match before_id {
        Some(id) => Some(
            messages::cursor_position(&state.pool, id)
                .await?
                .ok_or_else(|| {
                    ChatError::NotFound("before_id references an unknown message".to_owned())
                })?,
        ),
        None => None,
    };

    Ok(messages::find_by_conversation(&state.pool, viewer_id, target_id, conv_type, limit, before)
        .await?)
}

/// Receipts for a message, visible only to parties of that message.
pub async fn get_message_receipts(
    state: &AppState,
    caller_id: Uuid,
    message_id: Uuid,
) -> Result<Vec<receipts::Receipt>, ChatError> {
    let message = messages::find_by_id(&state.pool, message_id)
        .await?
        .ok_or_else(|| ChatError::NotFound("message not found".to_owned()))?;

    let is_party = if message.sender_id == caller_id {
        true
    } else {
        match (message.msg_type, message.receiver_id, message.group_id) {
            (ConversationType::Dm, Some(receiver_id), _) => receiver_id == caller_id,
            (ConversationType::Group, _, Some(group_id)) => {
                groups::is_member(&state.pool, group_id, caller_id).await?
            }
            _ => false,
        }
    };
    if !is_party {
        return Err(ChatError::AccessDenied);
    }

    Ok(receipts::find_by_message(&state.pool, message_id).await?)
}

async fn hydrate_username(state: &AppState, user_id: Uuid) -> Option<String> {
    match users::find_by_id(&state.pool, user_id).await {
        Ok(Some(user)) => Some(user.username),
        Ok(None) => None,
        Err(e) => {
            // Best-effort enrichment; the send goes on without it.
            warn!(user_id = %user_id, error = %e, "failed to hydrate sender username");
            None
        }
    }
}

async fn bump_recipient_conversation(
    state: &AppState,
    owner_id: Uuid,
    conv_type: ConversationType,
    target_id: Uuid,
    content: &str,
    created_at: chrono::DateTime<chrono::Utc>,
    actively_viewing: bool,
) -> Result<(), sqlx::Error> {
    if actively_viewing {
        // Viewer keeps unread at zero but still gets the fresh preview.
        conversations::touch_preview(&state.pool, owner_id, conv_type, target_id, content, created_at)
            .await
    } else {
        conversations::increment_unread(
            &state.pool,
            owner_id,
            conv_type,
            target_id,
            content,
            created_at,
        )
        .await
    }
}

fn fan_out_new_message(state: &AppState, event: &MessageEvent, targets: &[Uuid]) {
    let frame = ServerFrame::NewMessage(event.clone());
    let text = match serde_json::to_string(&frame) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "failed to encode new_message frame");
            return;
        }
    };
    for &target in targets {
        state.hub.send_to_user(target, &text);
    }
}
