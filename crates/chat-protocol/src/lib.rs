// chat-protocol: chat wire-format types and serialization.
//
// All WebSocket frames are JSON objects with a top-level `type` field and a
// `payload` object, modeled as adjacently-tagged enums.  The variants map
// 1:1 to the frozen frame vocabulary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Shared sub-types
// ---------------------------------------------------------------------------

/// Conversation kind, doubling as the message type discriminator.
///
/// `target_id` semantics depend on this: the peer user for `DM`, the group
/// for `GROUP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConversationType {
    #[serde(rename = "DM")]
    Dm,
    #[serde(rename = "GROUP")]
    Group,
}

impl ConversationType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dm => "DM",
            Self::Group => "GROUP",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DM" => Some(Self::Dm),
            "GROUP" => Some(Self::Group),
            _ => None,
        }
    }
}

/// Delivery progress of a message for one recipient.
///
/// Transitions are monotonic: SENT -> DELIVERED -> READ.  Backward
/// transitions are rejected at the write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReceiptStatus {
    Sent,
    Delivered,
    Read,
}

impl ReceiptStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sent => "SENT",
            Self::Delivered => "DELIVERED",
            Self::Read => "READ",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SENT" => Some(Self::Sent),
            "DELIVERED" => Some(Self::Delivered),
            "READ" => Some(Self::Read),
            _ => None,
        }
    }

    /// Numeric rank used for monotonicity checks in SQL and in memory.
    pub fn rank(self) -> i16 {
        match self {
            Self::Sent => 1,
            Self::Delivered => 2,
            Self::Read => 3,
        }
    }
}

// ---------------------------------------------------------------------------
// Client -> Server payloads
// ---------------------------------------------------------------------------

/// Payload of `send_message`.  Exactly one of `to_user_id` / `group_id` is
/// expected; frames carrying neither are dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessagePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_user_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<Uuid>,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDeliveredPayload {
    pub message_id: Uuid,
}

/// Payload of `typing_start` / `typing_stop`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingPayload {
    pub conversation_type: ConversationType,
    pub target_id: Uuid,
}

/// Payload of `set_active_conversation`.  A null/absent `target_id` clears
/// the active conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetActiveConversationPayload {
    pub conversation_type: ConversationType,
    #[serde(default)]
    pub target_id: Option<Uuid>,
}

// ---------------------------------------------------------------------------
// Server -> Client payloads
// ---------------------------------------------------------------------------

/// A message as delivered over the wire (`new_message`, `message_sent`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEvent {
    pub id: Uuid,
    pub sender_id: Uuid,
    /// Hydrated best-effort; absent when the lookup failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<Uuid>,
    pub content: String,
    pub msg_type: ConversationType,
    pub created_at: DateTime<Utc>,
}

/// Receipt progress pushed back to the original sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptEvent {
    pub message_id: Uuid,
    pub user_id: Uuid,
    pub status: ReceiptStatus,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingEvent {
    pub user_id: Uuid,
    pub username: String,
    pub conversation_type: ConversationType,
    pub target_id: Uuid,
}

/// `user_stopped_typing` carries no username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingStoppedEvent {
    pub user_id: Uuid,
    pub conversation_type: ConversationType,
    pub target_id: Uuid,
}

/// Presence edge (`user_online` / `user_offline`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceEvent {
    pub user_id: Uuid,
}

// ---------------------------------------------------------------------------
// Top-level discriminated unions
// ---------------------------------------------------------------------------

/// All frames a client may send.
///
/// ```json
/// { "type": "send_message", "payload": { "to_user_id": "...", "content": "hi" } }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
#[serde(rename_all = "snake_case")]
pub enum ClientFrame {
    SendMessage(SendMessagePayload),
    MessageDelivered(MessageDeliveredPayload),
    TypingStart(TypingPayload),
    TypingStop(TypingPayload),
    SetActiveConversation(SetActiveConversationPayload),
}

/// All frames the server may push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
#[serde(rename_all = "snake_case")]
pub enum ServerFrame {
    NewMessage(MessageEvent),
    /// Acknowledgement to the sender's own connection for a successful send.
    MessageSent(MessageEvent),
    ReceiptUpdate(ReceiptEvent),
    UserTyping(TypingEvent),
    UserStoppedTyping(TypingStoppedEvent),
    UserOnline(PresenceEvent),
    UserOffline(PresenceEvent),
}

/// Frozen error codes, shared by the HTTP envelope and WS-side logging.
pub mod error_codes {
    pub const UNAUTHENTICATED: &str = "ERR_UNAUTHENTICATED";
    pub const FORBIDDEN: &str = "ERR_FORBIDDEN";
    pub const VALIDATION: &str = "ERR_VALIDATION";
    pub const NOT_FOUND: &str = "ERR_NOT_FOUND";
    pub const CONFLICT: &str = "ERR_CONFLICT";
    pub const NOT_MEMBER: &str = "ERR_NOT_MEMBER";
    pub const ACCESS_DENIED: &str = "ERR_ACCESS_DENIED";
    pub const INTERNAL: &str = "ERR_INTERNAL";
}

/// Body of every non-2xx REST response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpErrorEnvelope {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}
