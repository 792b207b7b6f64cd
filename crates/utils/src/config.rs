//! Application configuration read from the process environment.
//!
//! `main` loads `.env` before calling [`AppConfig::from_env`], so local
//! development can keep overrides in a file.

use std::env;

use serde::Serialize;

use crate::assets::database_path;

pub const DEFAULT_APP_NAME: &str = "conferenceApp";
pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 2000;

#[derive(Debug, Clone, Serialize)]
pub struct AppConfig {
    pub host: String,
    /// 0 lets the OS pick a free port.
    pub port: u16,
    pub database_url: String,
    /// Prefix of the `X-<app>-alert` style response headers.
    pub app_name: String,
    pub default_page_size: i64,
    pub max_page_size: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            database_url: format!("sqlite://{}", database_path().to_string_lossy()),
            app_name: DEFAULT_APP_NAME.to_string(),
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = lookup("BACKEND_PORT")
            .or_else(|| lookup("PORT"))
            .and_then(|s| s.trim().parse::<u16>().ok())
            .unwrap_or_else(|| {
                tracing::info!("No PORT environment variable set, using port 0 for auto-assignment");
                0
            });

        let database_url = lookup("DATABASE_URL")
            .unwrap_or_else(|| format!("sqlite://{}", database_path().to_string_lossy()));

        let default_page_size = lookup("DEFAULT_PAGE_SIZE")
            .and_then(|s| s.trim().parse::<i64>().ok())
            .filter(|size| *size > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE);
        let max_page_size = lookup("MAX_PAGE_SIZE")
            .and_then(|s| s.trim().parse::<i64>().ok())
            .filter(|size| *size > 0)
            .unwrap_or(MAX_PAGE_SIZE);

        Self {
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            database_url,
            app_name: lookup("APP_NAME").unwrap_or_else(|| DEFAULT_APP_NAME.to_string()),
            default_page_size,
            max_page_size: max_page_size.max(default_page_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_backend_port_wins_over_port() {
        let config = AppConfig::from_lookup(lookup_from(&[("BACKEND_PORT", "8081"), ("PORT", "9000")]));
        assert_eq!(config.port, 8081);
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = AppConfig::from_lookup(lookup_from(&[("DATABASE_URL", "sqlite::memory:")]));
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 0);
        assert_eq!(config.app_name, DEFAULT_APP_NAME);
        assert_eq!(config.default_page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.database_url, "sqlite::memory:");
    }

    #[test]
    fn test_invalid_page_sizes_fall_back() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("DEFAULT_PAGE_SIZE", "-3"),
            ("MAX_PAGE_SIZE", "five"),
        ]));
        assert_eq!(config.default_page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.max_page_size, MAX_PAGE_SIZE);
    }
}
