//! Backend API client.
//!
//! Speaks the backend's JSON-over-POST protocol. CRUD calls answer with an
//! envelope:
//!
//! ```json
//! { "success": true, "data": ..., "message": "...", "error": "..." }
//! ```
//!
//! Configuration calls answer with the bare document.

use crate::{Error, Result};
use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tablecraft_core::record::{as_record, display_string};
use tablecraft_core::{
    ConfigSource, MessageCatalog, Record, RecordKey, RecordSource, TableConfig, ValidationConfig,
};

/// Default backend address.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8082";

/// Connection settings.
#[derive(Clone, Debug, PartialEq)]
pub struct ClientConfig {
    /// Backend base URL, without a trailing `/api`.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retries after the first attempt for retryable failures.
    pub max_retries: usize,
    /// First retry delay; later delays grow exponentially.
    pub retry_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_delay: Duration::from_millis(200),
        }
    }
}

impl ClientConfig {
    /// Settings for `base_url` with default timeouts.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl Envelope {
    fn failure_message(&self) -> String {
        self.error
            .clone()
            .or_else(|| self.message.clone())
            .unwrap_or_else(|| "API call failed".to_string())
    }

    fn into_data(self) -> Result<Value> {
        if self.success {
            Ok(self.data)
        } else {
            Err(Error::api(self.failure_message()))
        }
    }
}

/// Client for the Tablecraft backend.
#[derive(Clone, Debug)]
pub struct TablecraftClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl TablecraftClient {
    /// Creates a client.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    /// Connection settings.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.config.retry_delay)
            .with_max_times(self.config.max_retries)
    }

    async fn send_once(&self, method: &Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let mut request = self.http.request(method.clone(), self.url(path));
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        tracing::debug!(%method, path, status = status.as_u16(), "response received");

        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| Error::Core(e.into()))
    }

    /// Sends a request, retrying retryable failures with exponential backoff.
    async fn request(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        (|| async { self.send_once(&method, path, body.as_ref()).await })
            .retry(self.backoff())
            .when(Error::is_retryable)
            .notify(|err: &Error, delay: Duration| {
                tracing::warn!(%method, path, error = %err, ?delay, "retrying request");
            })
            .await
    }

    async fn post_envelope(&self, path: &str, body: Value) -> Result<Envelope> {
        let value = self.request(Method::POST, path, Some(body)).await?;
        serde_json::from_value(value).map_err(|e| Error::Core(e.into()))
    }

    /// All rows of a table.
    pub async fn find_all_records(&self, table: &str) -> Result<Vec<Record>> {
        tracing::debug!(table, "fetching records");
        let data = self
            .post_envelope("/api/sql/findAll", json!({ "tableName": table }))
            .await?
            .into_data()?;
        match data {
            Value::Null => Ok(Vec::new()),
            Value::Array(rows) => rows
                .into_iter()
                .map(|row| as_record(row).map_err(Error::from))
                .collect(),
            other => Err(Error::api(format!(
                "expected a list of records for '{table}', got {other}"
            ))),
        }
    }

    /// One row by `id`; `None` when the backend has no such record.
    pub async fn find_record(&self, table: &str, id: &Value) -> Result<Option<Record>> {
        let path = format!("/api/config/data/{table}/{}", display_string(id));
        let value = match self.request(Method::GET, &path, None).await {
            Ok(value) => value,
            Err(Error::Status { status: 404, .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        let envelope: Envelope = serde_json::from_value(value).map_err(|e| Error::Core(e.into()))?;
        if !envelope.success {
            tracing::debug!(table, message = %envelope.failure_message(), "record not found");
            return Ok(None);
        }
        Ok(Some(as_record(envelope.data)?))
    }

    /// Inserts a row; returns the stored record.
    pub async fn create_record(&self, table: &str, data: Record) -> Result<Value> {
        tracing::info!(table, "creating record");
        self.post_envelope(
            "/api/sql/create",
            json!({ "tableName": table, "data": data }),
        )
        .await?
        .into_data()
    }

    /// Updates the row identified by `key`; returns the stored record.
    pub async fn update_record(&self, table: &str, key: &RecordKey, data: Record) -> Result<Value> {
        tracing::info!(table, %key, "updating record");
        let mut body = key_body(table, key);
        body.insert("data".to_string(), Value::Object(data));
        self.post_envelope("/api/sql/update", Value::Object(body))
            .await?
            .into_data()
    }

    /// Deletes the row identified by `key`; `false` when nothing matched.
    pub async fn delete_record(&self, table: &str, key: &RecordKey) -> Result<bool> {
        tracing::info!(table, %key, "deleting record");
        let envelope = self
            .post_envelope("/api/sql/delete", Value::Object(key_body(table, key)))
            .await?;
        if !envelope.success && envelope.error.is_some() {
            return Err(Error::api(envelope.failure_message()));
        }
        Ok(envelope.success)
    }

    /// The table configuration document.
    pub async fn fetch_table_config(&self) -> Result<TableConfig> {
        let value = self
            .request(Method::POST, "/api/sql/config/table-config", Some(json!({})))
            .await?;
        serde_json::from_value(value).map_err(|e| Error::Core(e.into()))
    }

    /// The validation configuration document.
    pub async fn fetch_validation_config(&self) -> Result<ValidationConfig> {
        let value = self
            .request(
                Method::POST,
                "/api/sql/config/validation-config",
                Some(json!({})),
            )
            .await?;
        serde_json::from_value(value).map_err(|e| Error::Core(e.into()))
    }

    /// The message catalog for a language.
    pub async fn fetch_messages(&self, language: &str) -> Result<MessageCatalog> {
        let value = self
            .request(
                Method::POST,
                "/api/sql/config/messages",
                Some(json!({ "language": language })),
            )
            .await?;
        Ok(MessageCatalog::from_json(&value)?)
    }
}

/// `{tableName, id}` for single keys, `{tableName, keyValues}` for composite.
fn key_body(table: &str, key: &RecordKey) -> Record {
    let mut body = Record::new();
    body.insert("tableName".to_string(), Value::String(table.to_string()));
    match key {
        RecordKey::Single { value, .. } => {
            body.insert("id".to_string(), value.clone());
        }
        RecordKey::Composite(values) => {
            body.insert("keyValues".to_string(), Value::Object(values.clone()));
        }
    }
    body
}

#[async_trait]
impl RecordSource for TablecraftClient {
    async fn find_all(&self, table: &str) -> tablecraft_core::Result<Vec<Record>> {
        Ok(self.find_all_records(table).await?)
    }

    async fn find_by_id(&self, table: &str, id: &Value) -> tablecraft_core::Result<Option<Record>> {
        Ok(self.find_record(table, id).await?)
    }

    async fn create(&self, table: &str, data: Record) -> tablecraft_core::Result<Value> {
        Ok(self.create_record(table, data).await?)
    }

    async fn update(
        &self,
        table: &str,
        key: &RecordKey,
        data: Record,
    ) -> tablecraft_core::Result<Value> {
        Ok(self.update_record(table, key, data).await?)
    }

    async fn delete(&self, table: &str, key: &RecordKey) -> tablecraft_core::Result<bool> {
        Ok(self.delete_record(table, key).await?)
    }
}

#[async_trait]
impl ConfigSource for TablecraftClient {
    async fn table_config(&self) -> tablecraft_core::Result<TableConfig> {
        Ok(self.fetch_table_config().await?)
    }

    async fn validation_config(&self) -> tablecraft_core::Result<ValidationConfig> {
        Ok(self.fetch_validation_config().await?)
    }

    async fn messages(&self, language: &str) -> tablecraft_core::Result<MessageCatalog> {
        Ok(self.fetch_messages(language).await?)
    }
}
