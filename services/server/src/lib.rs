pub mod auth;
pub mod config;
pub mod connection;
pub mod db;
pub mod errors;
pub mod http;
pub mod hub;
pub mod messaging;
pub mod repo;
pub mod state;
pub mod ws_chat;

pub use config::Config;
pub use hub::Hub;
pub use state::AppState;

use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_chat::ws_chat_handler))
        .route("/health", get(health::health))
        .route("/auth/register", post(http::auth::register))
        .route("/auth/login", post(http::auth::login))
        .route("/auth/refresh", post(http::auth::refresh))
        .route("/auth/logout", post(http::auth::logout))
        .route("/users", get(http::users::search_users))
        .route("/users/:user_id", get(http::users::get_user))
        .route("/groups", post(http::groups::create_group))
        .route("/groups/:group_id/members", post(http::groups::add_member))
        .route("/conversations", get(http::chat::get_conversations))
        .route("/messages", get(http::chat::get_messages))
        .route("/messages/unread-count", get(http::chat::get_unread_count))
        .route("/messages/:message_id/read", post(http::chat::mark_read))
        .route(
            "/messages/:message_id/receipts",
            get(http::chat::get_receipts),
        )
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

mod health {
    use axum::response::IntoResponse;
    use axum::Json;
    use serde_json::json;

    pub async fn health() -> impl IntoResponse {
        Json(json!({ "status": "ok" }))
    }
}
