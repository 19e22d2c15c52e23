//! In-memory record and config source for tests.
//!
//! Available with the `test-utils` feature.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tablecraft_core::record::{as_number, lookup, number_value, values_match};
use tablecraft_core::{
    ConfigSource, Error, MessageCatalog, Record, RecordKey, RecordSource, Result, TableConfig,
    ValidationConfig,
};
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    tables: BTreeMap<String, Vec<Record>>,
    failing: BTreeSet<String>,
    table_config: TableConfig,
    validation_config: ValidationConfig,
    messages: BTreeMap<String, MessageCatalog>,
}

/// A [`RecordSource`] and [`ConfigSource`] backed by in-memory maps.
#[derive(Default)]
pub struct MemorySource {
    state: RwLock<State>,
}

impl MemorySource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a source serving the given configuration.
    pub fn with_config(table_config: TableConfig, validation_config: ValidationConfig) -> Self {
        Self {
            state: RwLock::new(State {
                table_config,
                validation_config,
                ..State::default()
            }),
        }
    }

    /// Replaces the rows of a table.
    pub async fn insert_rows(&self, table: &str, rows: Vec<Record>) {
        self.state.write().await.tables.insert(table.to_string(), rows);
    }

    /// Sets the message catalog served for a language.
    pub async fn insert_messages(&self, language: &str, catalog: MessageCatalog) {
        self.state
            .write()
            .await
            .messages
            .insert(language.to_string(), catalog);
    }

    /// Makes every read of `table` fail (use `"messages"` for catalogs).
    pub async fn fail_table(&self, table: &str) {
        self.state.write().await.failing.insert(table.to_string());
    }

    /// Current rows of a table.
    pub async fn rows(&self, table: &str) -> Vec<Record> {
        self.state
            .read()
            .await
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }
}

fn check(state: &State, table: &str) -> Result<()> {
    if state.failing.contains(table) {
        Err(Error::source_error(format!("table '{table}' unavailable"), true))
    } else {
        Ok(())
    }
}

fn next_id(rows: &[Record]) -> Value {
    let max = rows
        .iter()
        .filter_map(|r| lookup(r, "id").and_then(as_number))
        .fold(0.0_f64, f64::max);
    number_value(max + 1.0)
}

#[async_trait]
impl RecordSource for MemorySource {
    async fn find_all(&self, table: &str) -> Result<Vec<Record>> {
        let state = self.state.read().await;
        check(&state, table)?;
        Ok(state.tables.get(table).cloned().unwrap_or_default())
    }

    async fn find_by_id(&self, table: &str, id: &Value) -> Result<Option<Record>> {
        let state = self.state.read().await;
        check(&state, table)?;
        Ok(state.tables.get(table).and_then(|rows| {
            rows.iter()
                .find(|r| lookup(r, "id").is_some_and(|v| values_match(v, id)))
                .cloned()
        }))
    }

    async fn create(&self, table: &str, data: Record) -> Result<Value> {
        let mut state = self.state.write().await;
        check(&state, table)?;
        let rows = state.tables.entry(table.to_string()).or_default();
        let mut row = data;
        if lookup(&row, "id").is_none() {
            row.insert("id".to_string(), next_id(rows));
        }
        rows.push(row.clone());
        Ok(Value::Object(row))
    }

    async fn update(&self, table: &str, key: &RecordKey, data: Record) -> Result<Value> {
        let mut state = self.state.write().await;
        check(&state, table)?;
        let row = state
            .tables
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|r| key.matches(r)))
            .ok_or_else(|| Error::not_found("record", key.to_string()))?;
        for (column, value) in data {
            row.insert(column, value);
        }
        Ok(Value::Object(row.clone()))
    }

    async fn delete(&self, table: &str, key: &RecordKey) -> Result<bool> {
        let mut state = self.state.write().await;
        check(&state, table)?;
        let Some(rows) = state.tables.get_mut(table) else {
            return Ok(false);
        };
        let before = rows.len();
        rows.retain(|r| !key.matches(r));
        Ok(rows.len() != before)
    }
}

#[async_trait]
impl ConfigSource for MemorySource {
    async fn table_config(&self) -> Result<TableConfig> {
        Ok(self.state.read().await.table_config.clone())
    }

    async fn validation_config(&self) -> Result<ValidationConfig> {
        Ok(self.state.read().await.validation_config.clone())
    }

    async fn messages(&self, language: &str) -> Result<MessageCatalog> {
        let state = self.state.read().await;
        check(&state, "messages")?;
        Ok(state.messages.get(language).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use tablecraft_core::record::as_record;

    fn record(value: Value) -> Record {
        as_record(value).unwrap()
    }

    #[tokio::test]
    async fn test_create_assigns_next_id() {
        let source = MemorySource::new();
        source.insert_rows("t", vec![record(json!({"id": 4}))]).await;
        let created = source.create("t", record(json!({"name": "x"}))).await.unwrap();
        assert_eq!(created["id"], json!(5));
        assert_eq!(source.rows("t").await.len(), 2);
    }

    #[tokio::test]
    async fn test_update_merges_and_missing_is_not_found() {
        let source = MemorySource::new();
        source.insert_rows("t", vec![record(json!({"id": 1, "a": 1, "b": 2}))]).await;
        source
            .update("t", &RecordKey::id(1), record(json!({"a": 10})))
            .await
            .unwrap();
        assert_eq!(source.rows("t").await[0]["a"], json!(10));
        assert_eq!(source.rows("t").await[0]["b"], json!(2));

        let err = source
            .update("t", &RecordKey::id(9), Record::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_reports_whether_removed() {
        let source = MemorySource::new();
        source.insert_rows("t", vec![record(json!({"id": 1}))]).await;
        assert!(source.delete("t", &RecordKey::id(1)).await.unwrap());
        assert!(!source.delete("t", &RecordKey::id(1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_failing_table() {
        let source = MemorySource::new();
        source.fail_table("t").await;
        let err = source.find_all("t").await.unwrap_err();
        assert!(err.is_retryable());
    }
}
