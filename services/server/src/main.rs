use server::config::Config;
use server::db;
use server::hub::Hub;
use server::state::AppState;
use std::env;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level))
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            std::process::exit(1);
        }
    };

    info!("connecting to database...");
    let pool = db::connect_and_migrate(&config.database_url, config.db_max_connections).await;
    let cleared = db::clear_stale_online_flags(&pool)
        .await
        .expect("failed to reset user online status");
    if cleared > 0 {
        info!(cleared, "reset stale online flags from a previous run");
    }

    let (hub, runner) = Hub::new(pool.clone());
    let hub_task = tokio::spawn(runner.run());

    let state = AppState::new(pool, hub.clone(), config.clone());
    let router = server::build_router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("failed to bind");
    info!(addr = %config.bind_addr, "server listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(termination_signal())
        .await
        .expect("server error");

    // Drain the hub: close queues, wait for presence/status tasks, bounded
    // by the configured grace period.
    hub.shutdown();
    if tokio::time::timeout(config.shutdown_grace, hub_task)
        .await
        .is_err()
    {
        warn!("hub drain exceeded the shutdown grace period");
    }
    info!("server shut down gracefully");
}

/// Resolves when the process is asked to stop.  Serves as the shutdown
/// trigger for the accept loop; the hub drains after it fires.
async fn termination_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("Ctrl+C received, beginning shutdown"),
            _ = sigterm.recv() => info!("SIGTERM received, beginning shutdown"),
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Ctrl+C received, beginning shutdown");
    }
}
