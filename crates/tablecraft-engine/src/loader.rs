//! Configuration loading.
//!
//! [`ConfigStore`] fetches the table config, validation config, and message
//! catalog from a [`ConfigSource`] and caches the result. Every table's
//! derivations are checked while loading, so a bad formula or a dependency
//! cycle is reported before any screen opens.
//!
//! [`FileConfigSource`] serves the same documents from a local directory:
//!
//! ```text
//! <dir>/table-config.json
//! <dir>/validation-config.json
//! <dir>/messages_<lang>.properties   (falls back to messages.properties)
//! ```

use crate::derive::DeriveEngine;
use crate::lookup::LookupSet;
use crate::render::RenderContext;
use crate::validate::Validator;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tablecraft_core::model::TableDefinition;
use tablecraft_core::{
    ConfigSource, Error, MessageCatalog, Result, TableConfig, ValidationConfig,
};
use tokio::sync::RwLock;

/// File name of the table configuration.
pub const TABLE_CONFIG_FILE: &str = "table-config.json";
/// File name of the validation configuration.
pub const VALIDATION_CONFIG_FILE: &str = "validation-config.json";

/// Everything a screen needs, loaded once.
#[derive(Debug)]
pub struct LoadedConfig {
    /// Table configuration.
    pub tables: TableConfig,
    /// Validation configuration.
    pub validation: ValidationConfig,
    /// Messages for [`language`](Self::language).
    pub messages: MessageCatalog,
    /// Active language.
    pub language: String,
    engines: BTreeMap<String, Arc<DeriveEngine>>,
}

impl LoadedConfig {
    /// Assembles a loaded config, building every table's derive engine.
    pub fn new(
        tables: TableConfig,
        validation: ValidationConfig,
        messages: MessageCatalog,
        language: impl Into<String>,
    ) -> Result<Self> {
        let engines = tables
            .tables
            .iter()
            .map(|(name, table)| Ok((name.clone(), Arc::new(DeriveEngine::new(table)?))))
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(Self {
            tables,
            validation,
            messages,
            language: language.into(),
            engines,
        })
    }

    /// Fallback language for labels.
    pub fn default_language(&self) -> &str {
        &self.tables.project.default_language
    }

    /// A table definition.
    pub fn table(&self, name: &str) -> Result<&TableDefinition> {
        self.tables.table(name)
    }

    /// The derive engine of a table.
    pub fn engine(&self, name: &str) -> Result<Arc<DeriveEngine>> {
        self.engines
            .get(name)
            .cloned()
            .ok_or_else(|| Error::not_found("table", name))
    }

    /// A validator for a table.
    pub fn validator(&self, name: &str) -> Result<Validator<'_>> {
        let table = self.table(name)?;
        Validator::new(table, self.validation.table(name), &self.messages)
    }

    /// Rendering context over the given lookups.
    pub fn render_context<'a>(&'a self, lookups: &'a LookupSet) -> RenderContext<'a> {
        RenderContext {
            language: &self.language,
            default_language: self.default_language(),
            lookups,
        }
    }
}

/// Caching loader over a [`ConfigSource`].
pub struct ConfigStore {
    source: Arc<dyn ConfigSource>,
    language: Option<String>,
    cached: RwLock<Option<Arc<LoadedConfig>>>,
}

impl ConfigStore {
    /// Creates a store; the language defaults to the project's.
    pub fn new(source: Arc<dyn ConfigSource>) -> Self {
        Self {
            source,
            language: None,
            cached: RwLock::new(None),
        }
    }

    /// Overrides the active language.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Cached config, loading it on first use.
    pub async fn load(&self) -> Result<Arc<LoadedConfig>> {
        if let Some(config) = self.cached.read().await.as_ref() {
            return Ok(Arc::clone(config));
        }
        self.reload().await
    }

    /// Fetches the config again and replaces the cache.
    pub async fn reload(&self) -> Result<Arc<LoadedConfig>> {
        let tables = self.source.table_config().await?;
        let validation = self.source.validation_config().await?;
        let language = self
            .language
            .clone()
            .unwrap_or_else(|| tables.project.default_language.clone());

        let messages = match self.source.messages(&language).await {
            Ok(catalog) => catalog,
            Err(e) => {
                log::warn!("failed to load messages for '{language}': {e}");
                MessageCatalog::new()
            }
        };

        log::info!(
            "loaded configuration: {} tables, language '{language}'",
            tables.tables.len()
        );
        let config = Arc::new(LoadedConfig::new(tables, validation, messages, language)?);
        *self.cached.write().await = Some(Arc::clone(&config));
        Ok(config)
    }
}

/// Reads configuration documents from a directory.
#[derive(Clone, Debug)]
pub struct FileConfigSource {
    dir: PathBuf,
}

impl FileConfigSource {
    /// Serves configuration from `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The configuration directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn read(&self, name: &str) -> Result<String> {
        let path = self.dir.join(name);
        log::debug!("reading {}", path.display());
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| Error::io_with_path(e, &path))
    }
}

#[async_trait]
impl ConfigSource for FileConfigSource {
    async fn table_config(&self) -> Result<TableConfig> {
        TableConfig::from_json(&self.read(TABLE_CONFIG_FILE).await?)
    }

    async fn validation_config(&self) -> Result<ValidationConfig> {
        ValidationConfig::from_json(&self.read(VALIDATION_CONFIG_FILE).await?)
    }

    async fn messages(&self, language: &str) -> Result<MessageCatalog> {
        let localized = format!("messages_{language}.properties");
        let text = match self.read(&localized).await {
            Ok(text) => text,
            Err(_) => self.read("messages.properties").await?,
        };
        Ok(MessageCatalog::from_properties(&text))
    }
}
