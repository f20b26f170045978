//! Application configuration loaded from environment variables.

use std::time::Duration;

use saga::{RetryPolicy, SagaConfig};

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT` — `"json"` for JSON log lines, anything else for text
/// - `DATABASE_URL` — PostgreSQL ledger; in-memory when unset
/// - `SAGA_RETRY_MAX_ATTEMPTS` — attempts per step (default: `3`)
/// - `SAGA_RETRY_BASE_DELAY_MS` — first backoff delay (default: `50`)
/// - `SAGA_RETRY_MAX_DELAY_MS` — backoff cap (default: `1000`)
/// - `SETTLE_RETRY_MAX_ATTEMPTS` — attempts per settle/rollback step (default: `5`)
/// - `ONEGAMEHUB_LAUNCH_URL` — game launch base URL
/// - `ONEGAMEHUB_OPERATOR_ID` — operator id sent on launch
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_json: bool,
    pub database_url: Option<String>,
    pub retry_max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub settle_retry_max_attempts: u32,
    pub onegamehub_launch_url: String,
    pub onegamehub_operator_id: String,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: env_or("PORT", defaults.port),
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
            log_json: std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")),
            database_url: std::env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            retry_max_attempts: env_or("SAGA_RETRY_MAX_ATTEMPTS", defaults.retry_max_attempts),
            retry_base_delay_ms: env_or("SAGA_RETRY_BASE_DELAY_MS", defaults.retry_base_delay_ms),
            retry_max_delay_ms: env_or("SAGA_RETRY_MAX_DELAY_MS", defaults.retry_max_delay_ms),
            settle_retry_max_attempts: env_or(
                "SETTLE_RETRY_MAX_ATTEMPTS",
                defaults.settle_retry_max_attempts,
            ),
            onegamehub_launch_url: std::env::var("ONEGAMEHUB_LAUNCH_URL")
                .unwrap_or(defaults.onegamehub_launch_url),
            onegamehub_operator_id: std::env::var("ONEGAMEHUB_OPERATOR_ID")
                .unwrap_or(defaults.onegamehub_operator_id),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Builds the per-saga retry configuration.
    pub fn saga_config(&self) -> SagaConfig {
        let default = RetryPolicy::exponential(
            self.retry_max_attempts,
            Duration::from_millis(self.retry_base_delay_ms),
            Duration::from_millis(self.retry_max_delay_ms),
        );
        SagaConfig::from_parts(default, self.settle_retry_max_attempts)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_json: false,
            database_url: None,
            retry_max_attempts: 3,
            retry_base_delay_ms: 50,
            retry_max_delay_ms: 1000,
            settle_retry_max_attempts: 5,
            onegamehub_launch_url: "https://play.onegamehub.com/launch".to_string(),
            onegamehub_operator_id: "operator".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_addr_default() {
        let config = Config::default();
        assert_eq!(config.addr(), "0.0.0.0:3000");
    }

    #[test]
    fn test_saga_config() {
        let config = Config {
            retry_max_attempts: 2,
            retry_base_delay_ms: 10,
            retry_max_delay_ms: 40,
            settle_retry_max_attempts: 6,
            ..Config::default()
        };
        let saga = config.saga_config();

        assert_eq!(saga.place.max_attempts, 2);
        assert_eq!(saga.end.max_attempts, 2);
        assert_eq!(saga.settle.max_attempts, 6);
        assert_eq!(saga.rollback.max_attempts, 6);
        assert_eq!(saga.place.delay_for(1), Duration::from_millis(10));
        assert_eq!(saga.place.delay_for(5), Duration::from_millis(40));
    }
}
