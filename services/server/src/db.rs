//! Postgres setup for the chat store: pool construction, schema
//! migrations, and the boot-time cleanup the hub's presence flags rely on.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Builds the connection pool and brings the chat schema up to date.
/// Startup is the only caller, so failures abort the process.
pub async fn connect_and_migrate(database_url: &str, max_connections: u32) -> PgPool {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .expect("failed to connect to Postgres");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("failed to run database migrations");
    pool
}

/// Clears `is_online` flags left behind by an unclean shutdown.  The hub
/// owns these flags while running, and at boot nobody is connected yet, so
/// any flag still set is stale.
pub async fn clear_stale_online_flags(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE users SET is_online = false WHERE is_online = true")
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
