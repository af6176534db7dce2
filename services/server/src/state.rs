use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::hub::Hub;

/// Shared application state, cheap to clone into every handler and pump.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub hub: Hub,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(pool: PgPool, hub: Hub, config: Config) -> Self {
        Self {
            pool,
            hub,
            config: Arc::new(config),
        }
    }
}
