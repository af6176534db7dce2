use chat_protocol::{ConversationType, MessageEvent};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone, serde::Serialize)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<Uuid>,
    pub content: String,
    pub msg_type: ConversationType,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Wire representation, with the best-effort sender username attached.
    pub fn into_event(self, sender_username: Option<String>) -> MessageEvent {
        MessageEvent {
            id: self.id,
            sender_id: self.sender_id,
            sender_username,
            receiver_id: self.receiver_id,
            group_id: self.group_id,
            content: self.content,
            msg_type: self.msg_type,
            created_at: self.created_at,
        }
    }
}

fn map_message(row: &sqlx::postgres::PgRow) -> Result<Message, sqlx::Error> {
    let msg_type: String = row.get("msg_type");
    let msg_type = ConversationType::parse(&msg_type)
        .ok_or_else(|| sqlx::Error::Decode(format!("bad msg_type: {msg_type}").into()))?;
    Ok(Message {
        id: row.get("id"),
        sender_id: row.get("sender_id"),
        receiver_id: row.get("receiver_id"),
        group_id: row.get("group_id"),
        content: row.get("content"),
        msg_type,
        created_at: row.get("created_at"),
    })
}

pub async fn create(
    pool: &PgPool,
    sender_id: Uuid,
    receiver_id: Option<Uuid>,
    group_id: Option<Uuid>,
    content: &str,
    msg_type: ConversationType,
) -> Result<Message, sqlx::Error> {
    let row = sqlx::query(
        r#"INSERT INTO messages (id, sender_id, receiver_id, group_id, content, msg_type, created_at)
           VALUES ($1, $2, $3, $4, $5, $6, now())
           RETURNING id, sender_id, receiver_id, group_id, content, msg_type, created_at"#,
    )
    .bind(Uuid::new_v4())
    .bind(sender_id)
    .bind(receiver_id)
    .bind(group_id)
    .bind(content)
    .bind(msg_type.as_str())
    .fetch_one(pool)
    .await?;
    map_message(&row)
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Message>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT id, sender_id, receiver_id, group_id, content, msg_type, created_at
           FROM messages WHERE id = $1"#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(map_message).transpose()
}

/// Resolves a pagination cursor to the position of the referenced message.
/// `None` means the cursor does not exist.
pub async fn cursor_position(
    pool: &PgPool,
    before_id: Uuid,
) -> Result<Option<(DateTime<Utc>, Uuid)>, sqlx::Error> {
    let row = sqlx::query("SELECT created_at, id FROM messages WHERE id = $1")
        .bind(before_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| (r.get("created_at"), r.get("id"))))
}

/// History page for one conversation, newest first.
///
/// For DMs the page spans both directions between the viewer and the target.
/// With a cursor, only messages strictly older than the cursor position are
/// returned (created_at tie-broken by id).
pub async fn find_by_conversation(
    pool: &PgPool,
    viewer_id: Uuid,
    target_id: Uuid,
    conv_type: ConversationType,
    limit: i64,
    before: Option<(DateTime<Utc>, Uuid)>,
) -> Result<Vec<Message>, sqlx::Error> {
    let rows = match (conv_type, before) {
        (ConversationType::Dm, None) => {
            sqlx::query(
                r#"SELECT id, sender_id, receiver_id, group_id, content, msg_type, created_at
                   FROM messages
                   WHERE msg_type = 'DM'
                     AND ((sender_id = $1 AND receiver_id = $2)
                       OR (sender_id = $2 AND receiver_id = $1))
                   ORDER BY created_at DESC, id DESC
                   LIMIT $3"#,
            )
            .bind(viewer_id)
            .bind(target_id)
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
        (ConversationType::Dm, Some((cursor_at, cursor_id))) => {
            sqlx::query(
                r#"SELECT id, sender_id, receiver_id, group_id, content, msg_type, created_at
                   FROM messages
                   WHERE msg_type = 'DM'
                     AND ((sender_id = $1 AND receiver_id = $2)
                       OR (sender_id = $2 AND receiver_id = $1))
                     AND (created_at, id) < ($4, $5)
                   ORDER BY created_at DESC, id DESC
                   LIMIT $3"#,
            )
            .bind(viewer_id)
            .bind(target_id)
            .bind(limit)
            .bind(cursor_at)
            .bind(cursor_id)
            .fetch_all(pool)
            .await?
        }
        (ConversationType::Group, None) => {
            sqlx::query(
                r#"SELECT id, sender_id, receiver_id, group_id, content, msg_type, created_at
                   FROM messages
                   WHERE msg_type = 'GROUP' AND group_id = $1
                   ORDER BY created_at DESC, id DESC
                   LIMIT $2"#,
            )
            .bind(target_id)
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
        (ConversationType::Group, Some((cursor_at, cursor_id))) => {
            sqlx::query(
                r#"SELECT id, sender_id, receiver_id, group_id, content, msg_type, created_at
                   FROM messages
                   WHERE msg_type = 'GROUP' AND group_id = $1
                     AND (created_at, id) < ($3, $4)
                   ORDER BY created_at DESC, id DESC
                   LIMIT $2"#,
            )
            .bind(target_id)
            .bind(limit)
            .bind(cursor_at)
            .bind(cursor_id)
            .fetch_all(pool)
            .await?
        }
    };
    rows.iter().map(map_message).collect()
}
