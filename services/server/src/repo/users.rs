use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone, serde::Serialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_online: bool,
    pub last_seen: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

fn map_user(row: &sqlx::postgres::PgRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        is_online: row.get("is_online"),
        last_seen: row.get("last_seen"),
        created_at: row.get("created_at"),
    }
}

pub async fn create(
    pool: &PgPool,
    username: &str,
    email: &str,
    password_hash: &str,
) -> Result<User, sqlx::Error> {
    let row = sqlx::query(
        r#"INSERT INTO users (id, username, email, password_hash, is_online, last_seen)
           VALUES ($1, $2, $3, $4, false, now())
           RETURNING id, username, email, password_hash, is_online, last_seen, created_at"#,
    )
    .bind(Uuid::new_v4())
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .fetch_one(pool)
    .await?;
    Ok(map_user(&row))
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<User>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT id, username, email, password_hash, is_online, last_seen, created_at
           FROM users WHERE id = $1"#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row.as_ref().map(map_user))
}

pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT id, username, email, password_hash, is_online, last_seen, created_at
           FROM users WHERE email = $1"#,
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(row.as_ref().map(map_user))
}

/// Username substring search, excluding the caller.  Bounded to keep the
/// endpoint cheap regardless of the query.
pub async fn search(
    pool: &PgPool,
    query: &str,
    exclude_user_id: Uuid,
) -> Result<Vec<User>, sqlx::Error> {
    let pattern = format!("%{}%", query.replace('%', "\\%").replace('_', "\\_"));
    let rows = sqlx::query(
        r#"SELECT id, username, email, password_hash, is_online, last_seen, created_at
           FROM users
           WHERE username ILIKE $1 AND id <> $2
           ORDER BY username
           LIMIT 20"#,
    )
    .bind(pattern)
    .bind(exclude_user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(map_user).collect())
}

pub async fn update_online(
    pool: &PgPool,
    user_id: Uuid,
    is_online: bool,
    last_seen: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET is_online = $1, last_seen = $2 WHERE id = $3")
        .bind(is_online)
        .bind(last_seen)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}
