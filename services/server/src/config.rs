//! Server configuration loading.
//!
//! Environment variables are the sole config source.  Everything except
//! `DATABASE_URL` has a default suitable for local development.
//!
//! | Var | Default |
//! |---|---|
//! | `BIND_ADDR` | `0.0.0.0:8080` |
//! | `DATABASE_URL` | (required) |
//! | `DB_MAX_CONNECTIONS` | `10` |
//! | `JWT_SECRET` | `dev-secret-change-me` |
//! | `JWT_EXPIRATION_SECS` | `900` |
//! | `REFRESH_TOKEN_TTL_SECS` | `604800` |
//! | `SHUTDOWN_GRACE_SECS` | `10` |
//! | `LOG_LEVEL` | `info` |

use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub jwt_secret: String,
    pub jwt_expiration: Duration,
    pub refresh_token_ttl: Duration,
    pub shutdown_grace: Duration,
}

impl Config {
    /// Reads configuration from the process environment.
    ///
    /// Returns `Err` only for a missing `DATABASE_URL`; malformed numeric
    /// values fall back to their defaults.
    pub fn from_env() -> Result<Self, String> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set".to_owned())?;
        Ok(Self {
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:8080"),
            database_url,
            db_max_connections: env_or_u64("DB_MAX_CONNECTIONS", 10) as u32,
            jwt_secret: env_or("JWT_SECRET", "dev-secret-change-me"),
            jwt_expiration: Duration::from_secs(env_or_u64("JWT_EXPIRATION_SECS", 900)),
            refresh_token_ttl: Duration::from_secs(env_or_u64(
                "REFRESH_TOKEN_TTL_SECS",
                7 * 24 * 60 * 60,
            )),
            shutdown_grace: Duration::from_secs(env_or_u64("SHUTDOWN_GRACE_SECS", 10)),
        })
    }
}

fn env_or(key: &str, fallback: &str) -> String {
    env::var(key).unwrap_or_else(|_| fallback.to_owned())
}

fn env_or_u64(key: &str, fallback: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_u64_falls_back_on_garbage() {
        std::env::set_var("CONFIG_TEST_BAD_U64", "not-a-number");
        assert_eq!(env_or_u64("CONFIG_TEST_BAD_U64", 42), 42);
        std::env::remove_var("CONFIG_TEST_BAD_U64");
    }

    #[test]
    fn env_or_prefers_the_environment() {
        std::env::set_var("CONFIG_TEST_STR", "custom");
        assert_eq!(env_or("CONFIG_TEST_STR", "fallback"), "custom");
        std::env::remove_var("CONFIG_TEST_STR");
        assert_eq!(env_or("CONFIG_TEST_STR", "fallback"), "fallback");
    }
}
