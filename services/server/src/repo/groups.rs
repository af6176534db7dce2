use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone, serde::Serialize)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct GroupMember {
    pub group_id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub joined_at: DateTime<Utc>,
}

pub const ROLE_ADMIN: &str = "ADMIN";
pub const ROLE_MEMBER: &str = "MEMBER";

pub async fn create(pool: &PgPool, name: &str) -> Result<Group, sqlx::Error> {
    let row = sqlx::query(
        r#"INSERT INTO groups (id, name) VALUES ($1, $2)
           RETURNING id, name, created_at"#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .fetch_one(pool)
    .await?;
    Ok(Group {
        id: row.get("id"),
        name: row.get("name"),
        created_at: row.get("created_at"),
    })
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Group>, sqlx::Error> {
    let row = sqlx::query("SELECT id, name, created_at FROM groups WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| Group {
        id: r.get("id"),
        name: r.get("name"),
        created_at: r.get("created_at"),
    }))
}

pub async fn get_members(pool: &PgPool, group_id: Uuid) -> Result<Vec<GroupMember>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT group_id, user_id, role, joined_at
           FROM group_members WHERE group_id = $1 ORDER BY joined_at"#,
    )
    .bind(group_id)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .iter()
        .map(|r| GroupMember {
            group_id: r.get("group_id"),
            user_id: r.get("user_id"),
            role: r.get("role"),
            joined_at: r.get("joined_at"),
        })
        .collect())
}

pub async fn is_member(pool: &PgPool, group_id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
    let row = sqlx::query(
        "SELECT EXISTS(SELECT 1 FROM group_members WHERE group_id = $1 AND user_id = $2) AS present",
    )
    .bind(group_id)
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(row.get("present"))
}

pub async fn is_admin(pool: &PgPool, group_id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT EXISTS(
               SELECT 1 FROM group_members
               WHERE group_id = $1 AND user_id = $2 AND role = 'ADMIN'
           ) AS present"#,
    )
    .bind(group_id)
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(row.get("present"))
}

pub async fn add_member(
    pool: &PgPool,
    group_id: Uuid,
    user_id: Uuid,
    role: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO group_members (group_id, user_id, role) VALUES ($1, $2, $3)")
        .bind(group_id)
        .bind(user_id)
        .bind(role)
        .execute(pool)
        .await?;
    Ok(())
}
