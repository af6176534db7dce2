use chat_protocol::ReceiptStatus;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone, serde::Serialize)]
pub struct Receipt {
    pub id: Uuid,
    pub message_id: Uuid,
    pub user_id: Uuid,
    pub status: ReceiptStatus,
    pub updated_at: DateTime<Utc>,
}

fn map_receipt(row: &sqlx::postgres::PgRow) -> Result<Receipt, sqlx::Error> {
    let status: String = row.get("status");
    let status = ReceiptStatus::parse(&status)
        .ok_or_else(|| sqlx::Error::Decode(format!("bad receipt status: {status}").into()))?;
    Ok(Receipt {
        id: row.get("id"),
        message_id: row.get("message_id"),
        user_id: row.get("user_id"),
        status,
        updated_at: row.get("updated_at"),
    })
}

pub async fn create(
    pool: &PgPool,
    message_id: Uuid,
    user_id: Uuid,
    status: ReceiptStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO message_receipts (id, message_id, user_id, status, updated_at)
           VALUES ($1, $2, $3, $4, now())"#,
    )
    .bind(Uuid::new_v4())
    .bind(message_id)
    .bind(user_id)
    .bind(status.as_str())
    .execute(pool)
    .await?;
    Ok(())
}

/// One receipt per recipient, inserted in a single statement so a failure
/// leaves no partial receipt set behind.
pub async fn create_batch(
    pool: &PgPool,
    message_id: Uuid,
    user_ids: &[Uuid],
    status: ReceiptStatus,
) -> Result<(), sqlx::Error> {
    if user_ids.is_empty() {
        return Ok(());
    }
    let ids: Vec<Uuid> = user_ids.iter().map(|_| Uuid::new_v4()).collect();
    sqlx::query(
        r#"INSERT INTO message_receipts (id, message_id, user_id, status, updated_at)
           SELECT unnest($1::uuid[]), $2, unnest($3::uuid[]), $4, now()"#,
    )
    .bind(&ids)
    .bind(message_id)
    .bind(user_ids)
    .bind(status.as_str())
    .execute(pool)
    .await?;
    Ok(())
}

/// Monotonic status advance.  Returns the new `updated_at` when the row
/// actually moved forward; a stored status at or past the requested one is a
/// no-op and yields `None`.
pub async fn update_status(
    pool: &PgPool,
    message_id: Uuid,
    user_id: Uuid,
    status: ReceiptStatus,
) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
    let row = sqlx::query(
        r#"UPDATE message_receipts
           SET status = $3, updated_at = now()
           WHERE message_id = $1 AND user_id = $2
             AND CASE status WHEN 'SENT' THEN 1 WHEN 'DELIVERED' THEN 2 ELSE 3 END
               < CASE $3 WHEN 'SENT' THEN 1 WHEN 'DELIVERED' THEN 2 ELSE 3 END
           RETURNING updated_at"#,
    )
    .bind(message_id)
    .bind(user_id)
    .bind(status.as_str())
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|r| r.get("updated_at")))
}

pub async fn find_by_message(
    pool: &PgPool,
    message_id: Uuid,
) -> Result<Vec<Receipt>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT id, message_id, user_id, status, updated_at
           FROM message_receipts
           WHERE message_id = $1
           ORDER BY updated_at"#,
    )
    .bind(message_id)
    .fetch_all(pool)
    .await?;
    rows.iter().map(map_receipt).collect()
}

/// Total unread receipts for a user across all conversations.
pub async fn find_unread_count(pool: &PgPool, user_id: Uuid) -> Result<i64, sqlx::Error> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS n FROM message_receipts WHERE user_id = $1 AND status <> 'READ'",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(row.get("n"))
}
