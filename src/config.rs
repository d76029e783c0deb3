//! Configuration management

use anyhow::{Context, Result};

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind address, e.g. `0.0.0.0:8000`.
    pub http_listen_addr: String,

    /// PostgreSQL connection string.
    pub database_url: String,

    /// Nominatim API URL (for geocoding).
    pub nominatim_url: String,

    /// Valhalla routing engine URL (optional, falls back to mock if unavailable).
    pub valhalla_url: Option<String>,

    /// Upstream routing provider key, if the configured backend needs one.
    pub router_api_key: Option<String>,

    /// Comma-separated CORS allowlist.
    pub allowed_origins: Vec<String>,

    /// JWT secret key for access-token signing/validation.
    pub jwt_secret: String,

    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,

    /// Per-request deadline.
    pub request_deadline_seconds: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let http_listen_addr =
            std::env::var("HTTP_LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());

        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

        let nominatim_url = std::env::var("NOMINATIM_URL")
            .unwrap_or_else(|_| "https://nominatim.openstreetmap.org".to_string());

        let valhalla_url = std::env::var("VALHALLA_URL").ok();
        let router_api_key = std::env::var("ROUTER_API_KEY").ok();

        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        let jwt_secret = std::env::var("JWT_SECRET")
            .unwrap_or_else(|_| "dev-secret-change-in-production-min-32-bytes!!".to_string());

        let access_token_ttl_seconds = std::env::var("ACCESS_TOKEN_TTL_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(15 * 60);

        let refresh_token_ttl_seconds = std::env::var("REFRESH_TOKEN_TTL_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30 * 24 * 60 * 60);

        let request_deadline_seconds = std::env::var("REQUEST_DEADLINE_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        Ok(Self {
            http_listen_addr,
            database_url,
            nominatim_url,
            valhalla_url,
            router_api_key,
            allowed_origins,
            jwt_secret,
            access_token_ttl_seconds,
            refresh_token_ttl_seconds,
            request_deadline_seconds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global — serialize these tests so
    // they don't clobber each other (teacher convention for env-based config tests).
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn valhalla_url_none_when_not_set() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("VALHALLA_URL");
        std::env::set_var("DATABASE_URL", "postgres://test");

        let config = Config::from_env().unwrap();
        assert!(config.valhalla_url.is_none());
    }

    #[test]
    fn valhalla_url_some_when_set() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("VALHALLA_URL", "http://localhost:8002");
        std::env::set_var("DATABASE_URL", "postgres://test");

        let config = Config::from_env().unwrap();
        assert_eq!(config.valhalla_url, Some("http://localhost:8002".to_string()));

        std::env::remove_var("VALHALLA_URL");
    }

    #[test]
    fn nominatim_url_defaults_to_public() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("NOMINATIM_URL");
        std::env::set_var("DATABASE_URL", "postgres://test");

        let config = Config::from_env().unwrap();
        assert_eq!(config.nominatim_url, "https://nominatim.openstreetmap.org");
    }

    #[test]
    fn allowed_origins_parses_comma_separated_list() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("ALLOWED_ORIGINS", "https://a.example, https://b.example");
        std::env::set_var("DATABASE_URL", "postgres://test");

        let config = Config::from_env().unwrap();
        assert_eq!(
            config.allowed_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );

        std::env::remove_var("ALLOWED_ORIGINS");
    }

    #[test]
    fn access_token_ttl_defaults_to_15_minutes() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("ACCESS_TOKEN_TTL_SECONDS");
        std::env::set_var("DATABASE_URL", "postgres://test");

        let config = Config::from_env().unwrap();
        assert_eq!(config.access_token_ttl_seconds, 900);
    }
}
