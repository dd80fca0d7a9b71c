//! Application configuration management.
//!
//! This module handles loading and saving the client configuration, which
//! includes the backend URL override, the runtime host name and the last
//! used username, and resolves the backend origin the session client talks to.
//!
//! Configuration is stored at `~/.config/streamvault/config.json`.
//! `STREAMVAULT_API_BASE_URL` and `STREAMVAULT_HOST` override the file.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "streamvault";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable selecting the backend origin
pub const API_BASE_URL_ENV: &str = "STREAMVAULT_API_BASE_URL";

/// Environment variable naming the host the client runs under
pub const HOST_ENV: &str = "STREAMVAULT_HOST";

/// Path every backend route lives under
pub const API_PATH_SUFFIX: &str = "/api";

/// Backend used when running against a local development server
pub const LOCAL_API_BASE_URL: &str = "http://localhost:8080/api";

/// Backend used when nothing is configured and the host isn't local
pub const PRODUCTION_API_BASE_URL: &str =
    "https://it093iuwebapplicationdevelopmentproject-production.up.railway.app/api";

const LOCAL_HOSTS: [&str; 2] = ["localhost", "127.0.0.1"];

/// Compute the backend origin.
///
/// A configured URL always wins and is normalized to end with `/api`;
/// otherwise local hosts get the development server and everything else
/// gets the production fallback.
pub fn resolve_api_base_url(configured: Option<&str>, host: &str) -> String {
    if let Some(url) = configured.map(str::trim).filter(|u| !u.is_empty()) {
        let url = url.trim_end_matches('/');
        if url.ends_with(API_PATH_SUFFIX) {
            return url.to_string();
        }
        return format!("{}{}", url, API_PATH_SUFFIX);
    }

    if LOCAL_HOSTS.contains(&host.trim()) {
        return LOCAL_API_BASE_URL.to_string();
    }

    PRODUCTION_API_BASE_URL.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub host: Option<String>,
    pub last_username: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Backend URL override: environment first, then the config file.
    pub fn configured_api_base_url(&self) -> Option<String> {
        std::env::var(API_BASE_URL_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.api_base_url.clone())
    }

    /// Host the client runs under: environment, config file, `HOSTNAME`,
    /// then `localhost`.
    pub fn host(&self) -> String {
        std::env::var(HOST_ENV)
            .ok()
            .or_else(|| self.host.clone())
            .or_else(|| std::env::var("HOSTNAME").ok())
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| "localhost".to_string())
    }

    pub fn api_base_url(&self) -> String {
        resolve_api_base_url(self.configured_api_base_url().as_deref(), &self.host())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_url_gets_api_suffix() {
        for host in ["localhost", "app.example.com", ""] {
            assert_eq!(
                resolve_api_base_url(Some("https://api.example.com"), host),
                "https://api.example.com/api"
            );
        }
        assert_eq!(
            resolve_api_base_url(Some("https://api.example.com/"), "x"),
            "https://api.example.com/api"
        );
        assert_eq!(
            resolve_api_base_url(Some("https://api.example.com/api/"), "x"),
            "https://api.example.com/api"
        );
    }

    #[test]
    fn test_local_hosts_use_dev_server() {
        assert_eq!(resolve_api_base_url(None, "localhost"), LOCAL_API_BASE_URL);
        assert_eq!(resolve_api_base_url(None, "127.0.0.1"), LOCAL_API_BASE_URL);
        assert_eq!(resolve_api_base_url(Some("   "), "localhost"), LOCAL_API_BASE_URL);
    }

    #[test]
    fn test_other_hosts_use_production_fallback() {
        assert_eq!(resolve_api_base_url(None, "app.example.com"), PRODUCTION_API_BASE_URL);
        assert_eq!(resolve_api_base_url(None, ""), PRODUCTION_API_BASE_URL);
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let first = resolve_api_base_url(None, "app.example.com");
        for _ in 0..5 {
            assert_eq!(resolve_api_base_url(None, "app.example.com"), first);
        }
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = Config {
            api_base_url: Some("https://api.example.com".to_string()),
            host: Some("app.example.com".to_string()),
            last_username: Some("alice".to_string()),
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.api_base_url, config.api_base_url);
        assert_eq!(parsed.last_username.as_deref(), Some("alice"));

        let empty: Config = serde_json::from_str("{}").unwrap();
        assert!(empty.api_base_url.is_none());
    }
}
