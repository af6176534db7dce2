use chat_protocol::ConversationType;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// One side of a conversation: the owner's view of a DM peer or a group.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Conversation {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub conv_type: ConversationType,
    pub target_id: Uuid,
    pub last_message: String,
    pub last_message_at: DateTime<Utc>,
    pub unread_count: i32,
}

fn map_conversation(row: &sqlx::postgres::PgRow) -> Result<Conversation, sqlx::Error> {
    let conv_type: String = row.get("type");
    let conv_type = ConversationType::parse(&conv_type)
        .ok_or_else(|| sqlx::Error::Decode(format!("bad conversation type: {conv_type}").into()))?;
    Ok(Conversation {
        id: row.get("id"),
        user_id: row.get("user_id"),
        conv_type,
        target_id: row.get("target_id"),
        last_message: row.get("last_message"),
        last_message_at: row.get("last_message_at"),
        unread_count: row.get("unread_count"),
    })
}

/// Overwrites the preview without touching the unread counter.  Used for the
/// sender's own row and for recipients who are actively viewing the
/// conversation.  Creates the row (unread 0) on first contact.
pub async fn touch_preview(
    pool: &PgPool,
    owner_id: Uuid,
    conv_type: ConversationType,
    target_id: Uuid,
    last_message: &str,
    last_message_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO conversations (id, user_id, type, target_id, last_message, last_message_at, unread_count)
           VALUES ($1, $2, $3, $4, $5, $6, 0)
           ON CONFLICT (user_id, type, target_id)
           DO UPDATE SET last_message = EXCLUDED.last_message,
                         last_message_at = EXCLUDED.last_message_at"#,
    )
    .bind(Uuid::new_v4())
    .bind(owner_id)
    .bind(conv_type.as_str())
    .bind(target_id)
    .bind(last_message)
    .bind(last_message_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Atomically bumps the unread counter and overwrites the preview, creating
/// the row with unread 1 on first contact.
pub async fn increment_unread(
    pool: &PgPool,
    owner_id: Uuid,
    conv_type: ConversationType,
    target_id: Uuid,
    last_message: &str,
    last_message_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO conversations (id, user_id, type, target_id, last_message, last_message_at, unread_count)
           VALUES ($1, $2, $3, $4, $5, $6, 1)
           ON CONFLICT (user_id, type, target_id)
           DO UPDATE SET unread_count = conversations.unread_count + 1,
                         last_message = EXCLUDED.last_message,
                         last_message_at = EXCLUDED.last_message_at"#,
    )
    .bind(Uuid::new_v4())
    .bind(owner_id)
    .bind(conv_type.as_str())
    .bind(target_id)
    .bind(last_message)
    .bind(last_message_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn reset_unread(
    pool: &PgPool,
    owner_id: Uuid,
    conv_type: ConversationType,
    target_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE conversations SET unread_count = 0 WHERE user_id = $1 AND type = $2 AND target_id = $3",
    )
    .bind(owner_id)
    .bind(conv_type.as_str())
    .bind(target_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// The owner's inbox, most recently active first.
pub async fn find_by_user(pool: &PgPool, owner_id: Uuid) -> Result<Vec<Conversation>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT id, user_id, type, target_id, last_message, last_message_at, unread_count
           FROM conversations
           WHERE user_id = $1
           ORDER BY last_message_at DESC"#,
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await?;
    rows.iter().map(map_conversation).collect()
}

/// Users whose DM conversation points at `user_id`, i.e. the peers that
/// should see this user's presence edges.
pub async fn find_contacts_of_user(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<Uuid>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT DISTINCT user_id FROM conversations WHERE type = 'DM' AND target_id = $1",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(|r| r.get("user_id")).collect())
}

/// The user's own DM peers, used for the initial presence snapshot a fresh
/// connection receives.
pub async fn find_dm_peers(pool: &PgPool, user_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT target_id FROM conversations WHERE type = 'DM' AND user_id = $1",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(|r| r.get("target_id")).collect())
}
