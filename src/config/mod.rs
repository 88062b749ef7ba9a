//! Configuration module for the Bizdesk backend and client.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::AppError;

/// Bounds of the request cache TTL, in milliseconds.
pub const MIN_CACHE_TTL_MS: u64 = 2_000;
pub const MAX_CACHE_TTL_MS: u64 = 5_000;

/// Backend configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bearer token required on `/api` routes (none disables auth)
    pub api_token: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let api_token = env::var("BIZDESK_API_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());

        let db_path = env::var("BIZDESK_DB_PATH")
            .unwrap_or_else(|_| "./data/bizdesk.sqlite".to_string())
            .into();

        let bind_addr_raw =
            env::var("BIZDESK_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let bind_addr = bind_addr_raw.parse().map_err(|e| {
            AppError::Validation(format!("Invalid BIZDESK_BIND_ADDR {:?}: {}", bind_addr_raw, e))
        })?;

        let log_level = env::var("BIZDESK_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            api_token,
            db_path,
            bind_addr,
            log_level,
        })
    }
}

/// Client configuration: where the API lives and how requests are cached.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub cache_ttl: Duration,
    pub page_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            timeout: Duration::from_secs(30),
            cache_ttl: Duration::from_millis(3_000),
            page_size: 10,
        }
    }
}

impl ClientConfig {
    /// Load client configuration from environment variables.
    ///
    /// Unparseable numbers fall back to the defaults; the cache TTL is clamped
    /// to `MIN_CACHE_TTL_MS..=MAX_CACHE_TTL_MS`.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let base_url = env::var("BIZDESK_API_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.base_url);

        let timeout = env::var("BIZDESK_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);

        let cache_ttl = env::var("BIZDESK_CACHE_TTL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(clamp_cache_ttl)
            .unwrap_or(defaults.cache_ttl);

        let page_size = env::var("BIZDESK_PAGE_SIZE")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|size| *size > 0)
            .unwrap_or(defaults.page_size);

        Self {
            base_url,
            timeout,
            cache_ttl,
            page_size,
        }
    }
}

pub fn clamp_cache_ttl(ms: u64) -> Duration {
    Duration::from_millis(ms.clamp(MIN_CACHE_TTL_MS, MAX_CACHE_TTL_MS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        // Clear any existing env vars
        env::remove_var("BIZDESK_API_TOKEN");
        env::remove_var("BIZDESK_DB_PATH");
        env::remove_var("BIZDESK_BIND_ADDR");
        env::remove_var("BIZDESK_LOG_LEVEL");

        let config = Config::from_env().unwrap();

        assert!(config.api_token.is_none());
        assert_eq!(config.db_path, PathBuf::from("./data/bizdesk.sqlite"));
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_client_config_env_overrides() {
        env::set_var("BIZDESK_API_URL", "http://api.example.test/");
        env::set_var("BIZDESK_CACHE_TTL_MS", "60000");
        env::set_var("BIZDESK_PAGE_SIZE", "0");

        let config = ClientConfig::from_env();

        assert_eq!(config.base_url, "http://api.example.test");
        assert_eq!(config.cache_ttl, Duration::from_millis(MAX_CACHE_TTL_MS));
        assert_eq!(config.page_size, 10);

        env::remove_var("BIZDESK_API_URL");
        env::remove_var("BIZDESK_CACHE_TTL_MS");
        env::remove_var("BIZDESK_PAGE_SIZE");
    }

    #[test]
    fn test_clamp_cache_ttl() {
        assert_eq!(clamp_cache_ttl(500), Duration::from_millis(2_000));
        assert_eq!(clamp_cache_ttl(3_500), Duration::from_millis(3_500));
        assert_eq!(clamp_cache_ttl(9_000), Duration::from_millis(5_000));
    }
}
