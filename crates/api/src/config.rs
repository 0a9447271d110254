//! Process configuration, read from the environment at startup.

use std::time::Duration;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_LOCK_TIMEOUT_MS: u64 = 250;

/// Runtime configuration for the API process.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP listen address.
    pub listen_addr: String,
    /// Postgres connection string; when unset the process runs on the
    /// in-memory store with demo accounts.
    pub database_url: Option<String>,
    /// Bound on waiting for a per-account hold.
    pub lock_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            database_url: None,
            lock_timeout: Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS),
        }
    }
}

impl Config {
    /// Read `LISTEN_ADDR`, `DATABASE_URL` and `LOCK_TIMEOUT_MS`, falling
    /// back to defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let listen_addr =
            std::env::var("LISTEN_ADDR").unwrap_or_else(|_| DEFAULT_LISTEN_ADDR.to_string());

        let database_url = std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());

        let lock_timeout_ms = std::env::var("LOCK_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_LOCK_TIMEOUT_MS);

        Self {
            listen_addr,
            database_url,
            lock_timeout: Duration::from_millis(lock_timeout_ms),
        }
    }
}
