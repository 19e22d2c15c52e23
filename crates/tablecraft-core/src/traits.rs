//! Seams between the engine and its collaborators.
//!
//! - [`RecordSource`]: where rows come from and where writes go
//! - [`ConfigSource`]: where the three configuration documents come from
//! - [`ConfigManager`]: the CLI's own TOML settings file

use crate::messages::MessageCatalog;
use crate::model::{TableConfig, ValidationConfig};
use crate::record::{Record, RecordKey};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::PathBuf;

/// Generic row storage behind the dynamic screens.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// All rows of a table.
    async fn find_all(&self, table: &str) -> Result<Vec<Record>>;

    /// One row by its `id`, or `None` when it does not exist.
    async fn find_by_id(&self, table: &str, id: &Value) -> Result<Option<Record>>;

    /// Inserts a row; returns whatever the backend reports.
    async fn create(&self, table: &str, data: Record) -> Result<Value>;

    /// Updates the row identified by `key`.
    async fn update(&self, table: &str, key: &RecordKey, data: Record) -> Result<Value>;

    /// Deletes the row identified by `key`; `false` if nothing was deleted.
    async fn delete(&self, table: &str, key: &RecordKey) -> Result<bool>;
}

/// Provider of the configuration documents.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// The table configuration.
    async fn table_config(&self) -> Result<TableConfig>;

    /// The validation configuration.
    async fn validation_config(&self) -> Result<ValidationConfig>;

    /// The message catalog for a language.
    async fn messages(&self, language: &str) -> Result<MessageCatalog>;
}

/// A TOML-backed settings file with a conventional location.
///
/// Implementors provide [`project_name`](Self::project_name),
/// [`load`](Self::load) and [`to_env_vars`](Self::to_env_vars); path
/// resolution and serialization have defaults.
pub trait ConfigManager: Default + Serialize + DeserializeOwned + Sized {
    /// Short project name used for directories and env vars.
    fn project_name() -> &'static str;

    /// Loads the settings, applying environment overrides.
    fn load(config_path: Option<&str>) -> Result<Self>;

    /// Flattens the settings into `NAME=value` pairs.
    fn to_env_vars(&self) -> Result<Vec<(String, String)>>;

    /// Environment variable naming an explicit config file.
    fn config_env_var() -> String {
        format!("{}_CONFIG", Self::project_name().to_uppercase())
    }

    /// `<platform config dir>/<project>/config.toml`.
    fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(Self::project_name()).join("config.toml"))
    }

    /// Explicit path, then the env var, then the default path.
    fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(PathBuf::from(path));
        }
        if let Ok(path) = std::env::var(Self::config_env_var())
            && !path.is_empty()
        {
            return Some(PathBuf::from(path));
        }
        Self::default_config_path()
    }

    /// Reads the settings file, or defaults when it does not exist.
    fn read_file(config_path: Option<&str>) -> Result<Self> {
        let Some(path) = Self::resolve_config_path(config_path) else {
            return Ok(Self::default());
        };
        if !path.exists() {
            log::debug!("no config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path).map_err(|e| Error::io_with_path(e, &path))?;
        toml::from_str(&content)
            .map_err(|e| Error::config(format!("Failed to parse {}: {e}", path.display())))
    }

    /// Pretty TOML rendering of the settings.
    fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))
    }
}
