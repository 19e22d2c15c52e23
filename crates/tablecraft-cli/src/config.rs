//! CLI settings file.
//!
//! Lives at `<config dir>/tablecraft/config.toml` unless `--config` or
//! `TABLECRAFT_CONFIG` names another file. `TABLECRAFT_API_URL` and
//! `TABLECRAFT_LANGUAGE` override the file.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tablecraft_client::{ClientConfig, DEFAULT_BASE_URL};
use tablecraft_core::traits::ConfigManager;
use tablecraft_core::{Error, Result};

/// Env var overriding `api.base_url`.
pub const API_URL_ENV: &str = "TABLECRAFT_API_URL";
/// Env var overriding `ui.language`.
pub const LANGUAGE_ENV: &str = "TABLECRAFT_LANGUAGE";
/// Env var naming a local configuration directory.
pub const CONFIG_DIR_ENV: &str = "TABLECRAFT_CONFIG_DIR";

/// Top-level settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TablecraftConfig {
    /// Directory holding `table-config.json` and friends; when set, the
    /// configuration is read from disk instead of the backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_dir: Option<PathBuf>,
    /// Backend connection.
    pub api: ApiConfig,
    /// Presentation.
    pub ui: UiConfig,
}

/// Backend connection settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Backend base URL.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Retries for transient failures.
    pub max_retries: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

impl ApiConfig {
    /// Client settings for these values.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.base_url.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            max_retries: self.max_retries,
            ..ClientConfig::default()
        }
    }
}

/// Presentation settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Message language; the project's default language when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl TablecraftConfig {
    /// Applies environment overrides read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |name: &str| lookup(name).filter(|v| !v.is_empty());
        if let Some(url) = lookup(API_URL_ENV) {
            self.api.base_url = url;
        }
        if let Some(language) = lookup(LANGUAGE_ENV) {
            self.ui.language = Some(language);
        }
        if let Some(dir) = lookup(CONFIG_DIR_ENV) {
            self.config_dir = Some(PathBuf::from(dir));
        }
    }
}

impl ConfigManager for TablecraftConfig {
    fn project_name() -> &'static str {
        "tablecraft"
    }

    fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Self::read_file(config_path)?;
        config.apply_env(|name| std::env::var(name).ok());
        if config.api.base_url.trim().is_empty() {
            return Err(Error::config("api.base_url must not be empty"));
        }
        Ok(config)
    }

    fn to_env_vars(&self) -> Result<Vec<(String, String)>> {
        let mut vars = vec![
            (API_URL_ENV.to_string(), self.api.base_url.clone()),
            (
                "TABLECRAFT_API_TIMEOUT_SECS".to_string(),
                self.api.timeout_secs.to_string(),
            ),
            (
                "TABLECRAFT_API_MAX_RETRIES".to_string(),
                self.api.max_retries.to_string(),
            ),
        ];
        if let Some(language) = &self.ui.language {
            vars.push((LANGUAGE_ENV.to_string(), language.clone()));
        }
        if let Some(dir) = &self.config_dir {
            vars.push((CONFIG_DIR_ENV.to_string(), dir.display().to_string()));
        }
        Ok(vars)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = TablecraftConfig::default();
        assert_eq!(config.api.base_url, DEFAULT_BASE_URL);
        assert!(config.config_dir.is_none());
        assert!(config.ui.language.is_none());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: TablecraftConfig = toml::from_str("[ui]\nlanguage = \"en\"\n").unwrap();
        assert_eq!(config.ui.language.as_deref(), Some("en"));
        assert_eq!(config.api.max_retries, 3);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = TablecraftConfig::default();
        config.apply_env(env(&[
            (API_URL_ENV, "http://backend:9000"),
            (LANGUAGE_ENV, "ja"),
            (CONFIG_DIR_ENV, ""),
        ]));
        assert_eq!(config.api.base_url, "http://backend:9000");
        assert_eq!(config.ui.language.as_deref(), Some("ja"));
        assert!(config.config_dir.is_none());
    }

    #[test]
    fn test_client_config() {
        let mut config = TablecraftConfig::default();
        config.api.timeout_secs = 5;
        let client = config.api.client_config();
        assert_eq!(client.timeout, Duration::from_secs(5));
        assert_eq!(client.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_to_env_vars() {
        let mut config = TablecraftConfig::default();
        config.ui.language = Some("en".into());
        let vars = config.to_env_vars().unwrap();
        assert_eq!(vars[0], (API_URL_ENV.to_string(), DEFAULT_BASE_URL.to_string()));
        assert!(vars.contains(&(LANGUAGE_ENV.to_string(), "en".to_string())));
        assert!(!vars.iter().any(|(k, _)| k == CONFIG_DIR_ENV));
    }

    #[test]
    fn test_toml_round_trip_skips_unset() {
        let text = TablecraftConfig::default().to_toml_string().unwrap();
        assert!(text.contains("[api]"));
        assert!(!text.contains("config_dir"));
        let back: TablecraftConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, TablecraftConfig::default());
    }
}
