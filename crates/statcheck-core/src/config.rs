//! Configuration management for the client core.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Default identity provider URL (can be overridden at compile time via
/// STATCHECK_PROVIDER_URL env var).
pub const DEFAULT_PROVIDER_URL: &str = match option_env!("STATCHECK_PROVIDER_URL") {
    Some(url) => url,
    None => "https://auth.statcheck.app",
};

/// Default identity provider publishable key (public, safe to expose; can be
/// overridden at compile time via STATCHECK_PROVIDER_PUBLISHABLE_KEY).
pub const DEFAULT_PROVIDER_PUBLISHABLE_KEY: &str =
    match option_env!("STATCHECK_PROVIDER_PUBLISHABLE_KEY") {
        Some(key) => key,
        None => "statcheck-publishable-key",
    };

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Main client configuration.
///
/// The backend endpoint URL has no default: every data query and mutation is
/// keyed off it, so a missing value is a fatal startup error rather than
/// something to limp along without.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Backend deployment URL. Required; comes from the config file or the
    /// STATCHECK_BACKEND_URL environment variable.
    #[serde(default)]
    pub backend_url: String,
    /// Identity provider URL.
    #[serde(default = "default_provider_url")]
    pub provider_url: String,
    /// Identity provider publishable API key.
    #[serde(default = "default_provider_publishable_key")]
    pub provider_publishable_key: String,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_provider_url() -> String {
    DEFAULT_PROVIDER_URL.to_string()
}

fn default_provider_publishable_key() -> String {
    DEFAULT_PROVIDER_PUBLISHABLE_KEY.to_string()
}

impl Config {
    /// Load configuration from the config file, then apply environment
    /// overrides, then validate.
    ///
    /// Fails with `CoreError::Config` when no backend URL is configured.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self {
                log_level: default_log_level(),
                backend_url: String::new(),
                provider_url: default_provider_url(),
                provider_publishable_key: default_provider_publishable_key(),
            }
        };

        config.load_from_env();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the config file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Override configuration from environment variables.
    fn load_from_env(&mut self) {
        if let Ok(log_level) = std::env::var("STATCHECK_LOG_LEVEL") {
            self.log_level = log_level;
        }
        if let Ok(backend_url) = std::env::var("STATCHECK_BACKEND_URL") {
            self.backend_url = backend_url;
        }
    }

    /// Validate required fields.
    pub fn validate(&self) -> CoreResult<()> {
        if self.backend_url.trim().is_empty() {
            return Err(CoreError::Config(
                "backend URL is not configured; set backend_url in config.json \
                 or the STATCHECK_BACKEND_URL environment variable"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Get the backend URL as a parsed URL.
    pub fn backend_url(&self) -> CoreResult<Url> {
        Url::parse(&self.backend_url).map_err(CoreError::from)
    }

    /// Get the identity provider URL as a parsed URL.
    pub fn provider_url(&self) -> CoreResult<Url> {
        Url::parse(&self.provider_url).map_err(CoreError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_config() -> Config {
        Config {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            backend_url: "https://backend.statcheck.app".to_string(),
            provider_url: DEFAULT_PROVIDER_URL.to_string(),
            provider_publishable_key: DEFAULT_PROVIDER_PUBLISHABLE_KEY.to_string(),
        }
    }

    #[test]
    fn test_config_load_from_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");

        let config_json = r#"{
            "log_level": "debug",
            "backend_url": "https://backend.example.com"
        }"#;

        std::fs::write(&config_path, config_json).unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.backend_url, "https://backend.example.com");
        assert_eq!(config.provider_url, DEFAULT_PROVIDER_URL);
    }

    #[test]
    fn test_config_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let mut config = test_config();
        config.log_level = "trace".to_string();
        config.save(&paths).unwrap();

        let loaded = Config::load(&paths).unwrap();
        assert_eq!(loaded.log_level, "trace");
        assert_eq!(loaded.backend_url, "https://backend.statcheck.app");
    }

    #[test]
    fn test_config_missing_backend_url_is_fatal() {
        std::env::remove_var("STATCHECK_BACKEND_URL");

        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let result = Config::load(&paths);
        assert!(matches!(result, Err(CoreError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_blank_backend_url() {
        let mut config = test_config();
        config.backend_url = "   ".to_string();
        assert!(config.validate().is_err());

        config.backend_url = "https://backend.statcheck.app".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_backend_url_parse() {
        let config = test_config();
        let url = config.backend_url().unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("backend.statcheck.app"));
    }

    #[test]
    fn test_config_invalid_backend_url() {
        let mut config = test_config();
        config.backend_url = "not a valid url".to_string();

        assert!(config.backend_url().is_err());
    }

    #[test]
    fn test_default_constants() {
        assert!(!DEFAULT_LOG_LEVEL.is_empty());
        assert!(DEFAULT_PROVIDER_URL.starts_with("https://"));
        assert!(!DEFAULT_PROVIDER_PUBLISHABLE_KEY.is_empty());
    }
}
