//! Command implementations.
//!
//! Each command returns its output as text (or a typed result) so `main`
//! decides what goes to stdout and what becomes the exit status.

use crate::config::TablecraftConfig;
use crate::{Error, Result};
use serde_json::Value;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tablecraft_client::TablecraftClient;
use tablecraft_core::record::{as_record, display_string};
use tablecraft_core::{ConfigSource, Record, RecordSource};
use tablecraft_engine::generate::{SchemaMetadata, generate};
use tablecraft_engine::list::SortDirection;
use tablecraft_engine::submit::delete_request;
use tablecraft_engine::{
    ConfigStore, FileConfigSource, FormSession, ListView, LookupSet, ValidationReport, Widget,
    WidgetKind,
};

/// Record and configuration sources for one CLI invocation.
pub struct App {
    records: Arc<dyn RecordSource>,
    store: ConfigStore,
}

impl App {
    /// Builds the app from settings.
    ///
    /// Records always come from the backend; configuration comes from
    /// `config_dir` when it is set.
    pub fn connect(config: &TablecraftConfig) -> Result<Self> {
        let client = Arc::new(TablecraftClient::new(config.api.client_config())?);
        let configs: Arc<dyn ConfigSource> = match &config.config_dir {
            Some(dir) => {
                tracing::debug!(dir = %dir.display(), "reading configuration from disk");
                Arc::new(FileConfigSource::new(dir))
            }
            None => client.clone(),
        };
        Ok(Self::new(client, configs, config.ui.language.as_deref()))
    }

    /// Builds the app over explicit sources.
    pub fn new(
        records: Arc<dyn RecordSource>,
        configs: Arc<dyn ConfigSource>,
        language: Option<&str>,
    ) -> Self {
        let mut store = ConfigStore::new(configs);
        if let Some(language) = language {
            store = store.with_language(language);
        }
        Self { records, store }
    }

    /// Tables with their localized labels, in navigation order.
    pub async fn tables(&self) -> Result<String> {
        let config = self.store.load().await?;
        let (language, fallback) = (config.language.as_str(), config.default_language());
        let rows = config
            .tables
            .tables_in_display_order()
            .into_iter()
            .map(|table| {
                vec![
                    table.name.clone(),
                    table.label(language, fallback),
                    table
                        .description(language, fallback)
                        .unwrap_or_default()
                        .to_string(),
                ]
            })
            .collect::<Vec<_>>();
        Ok(render_table(
            &["TABLE".to_string(), "LABEL".to_string(), "DESCRIPTION".to_string()],
            &rows,
        ))
    }

    /// The list view of a table.
    pub async fn list(
        &self,
        table: &str,
        search: Option<&str>,
        sort: Option<&str>,
        desc: bool,
    ) -> Result<String> {
        let config = self.store.load().await?;
        let definition = config.table(table)?;
        let (records, lookups) = tokio::join!(
            self.records.find_all(table),
            LookupSet::load(self.records.as_ref(), definition)
        );

        let mut view = ListView::new(definition, records?, config.render_context(&lookups));
        if let Some(query) = search {
            view.set_search(query);
        }
        if let Some(column) = sort {
            if !definition.list_column(column).is_some_and(|c| c.sortable) {
                return Err(Error::usage(format!(
                    "column '{column}' of '{table}' is not sortable"
                )));
            }
            view.toggle_sort(column);
            if desc && view.sort().is_some_and(|s| s.direction == SortDirection::Asc) {
                view.toggle_sort(column);
            }
        }

        let headers: Vec<String> = view.headers().into_iter().map(|h| h.title).collect();
        let rows: Vec<Vec<String>> = view.rows().into_iter().map(|r| r.cells).collect();
        let summary = view.summary();

        let mut out = render_table(&headers, &rows);
        if summary.filtered == summary.total {
            let _ = writeln!(out, "{} records", summary.total);
        } else {
            let _ = writeln!(out, "{} of {} records", summary.filtered, summary.total);
        }
        Ok(out)
    }

    async fn open_form(&self, table: &str, record: Option<&Record>) -> Result<FormSession> {
        let config = self.store.load().await?;
        let form = match record {
            Some(record) => {
                FormSession::open_edit(config, self.records.as_ref(), table, record).await?
            }
            None => FormSession::open_create(config, self.records.as_ref(), table).await?,
        };
        Ok(form)
    }

    /// Opens a form and fills it from `record`.
    ///
    /// Edit forms take the record as is. Create forms set each present
    /// field in form order so autofill and auto-calculate run as they
    /// would for a user typing; keys that are not form fields are skipped.
    async fn fill_form(&self, table: &str, record: &Record, edit: bool) -> Result<FormSession> {
        if edit {
            return self.open_form(table, Some(record)).await;
        }

        let mut form = self.open_form(table, None).await?;
        let config = self.store.load().await?;
        let definition = config.table(table)?;
        for (column, _) in record {
            if definition.form_field(column).is_none() {
                tracing::warn!(table, column = %column, "ignoring value for unknown field");
            }
        }
        for field in &definition.form_fields {
            if let Some(value) = record.get(&field.name) {
                form.set_value(&field.name, value.clone())?;
            }
        }
        Ok(form)
    }

    /// The form widgets of a table; an edit form when `record` is given.
    pub async fn form(&self, table: &str, record: Option<&Path>) -> Result<String> {
        let record = record.map(read_record).transpose()?;
        let form = self.open_form(table, record.as_ref()).await?;
        Ok(render_widgets(&form.widgets()))
    }

    /// Validates a record without sending it.
    pub async fn validate(&self, table: &str, file: &Path, edit: bool) -> Result<ValidationReport> {
        let record = read_record(file)?;
        let form = self.fill_form(table, &record, edit).await?;
        Ok(form.validate()?)
    }

    /// Validates and creates or updates a record; returns the stored row.
    pub async fn submit(&self, table: &str, file: &Path, edit: bool) -> Result<Value> {
        let record = read_record(file)?;
        let form = self.fill_form(table, &record, edit).await?;
        let report = form.validate()?;
        if !report.is_valid() {
            for violation in report.violations() {
                tracing::warn!(table, field = %violation.field, "{}", violation.message);
            }
            return Err(Error::Invalid {
                count: report.violations().len(),
            });
        }
        Ok(form.submit()?.execute(self.records.as_ref()).await?)
    }

    /// Deletes the record identified by `COLUMN=VALUE` pairs.
    pub async fn delete(&self, table: &str, keys: &[String]) -> Result<bool> {
        let config = self.store.load().await?;
        let definition = config.table(table)?;
        let request = delete_request(definition, &parse_key_pairs(keys)?)?;
        Ok(request.execute(self.records.as_ref()).await?)
    }
}

/// Generates configuration files from schema metadata; returns the paths written.
pub fn generate_config(metadata: &Path, out: &Path) -> Result<Vec<PathBuf>> {
    let schema = SchemaMetadata::from_file(metadata)?;
    Ok(generate(&schema)?.write_to(out)?)
}

/// Reads a JSON object from a file.
pub fn read_record(path: &Path) -> Result<Record> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| tablecraft_core::Error::io_with_path(e, path))?;
    let value: Value = serde_json::from_str(&text)
        .map_err(|e| Error::usage(format!("{}: {e}", path.display())))?;
    Ok(as_record(value)?)
}

/// Parses `COLUMN=VALUE` pairs; values that parse as JSON keep their type.
pub fn parse_key_pairs(pairs: &[String]) -> Result<Record> {
    pairs
        .iter()
        .map(|pair| {
            let (column, raw) = pair
                .split_once('=')
                .filter(|(column, _)| !column.trim().is_empty())
                .ok_or_else(|| Error::usage(format!("expected COLUMN=VALUE, got '{pair}'")))?;
            let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
            Ok((column.trim().to_string(), value))
        })
        .collect()
}

/// Renders violations one per line.
pub fn render_report(report: &ValidationReport) -> String {
    if report.is_valid() {
        return "OK\n".to_string();
    }
    report
        .violations()
        .iter()
        .map(|v| format!("{}: {}\n", v.field, v.message))
        .collect()
}

fn widget_value(widget: &Widget) -> String {
    match (&widget.kind, &widget.value) {
        (_, Value::Null) => String::new(),
        (WidgetKind::Select { options, .. }, value) => options
            .iter()
            .find(|o| tablecraft_core::record::values_match(&o.value, value))
            .map(|o| o.label.clone())
            .unwrap_or_else(|| display_string(value)),
        (_, value) => display_string(value),
    }
}

fn kind_name(kind: &WidgetKind) -> &str {
    match kind {
        WidgetKind::Text { input_type, .. } => input_type.as_str(),
        WidgetKind::Textarea { .. } => "textarea",
        WidgetKind::Number { .. } => "number",
        WidgetKind::Date => "date",
        WidgetKind::DateTime => "datetime",
        WidgetKind::Checkbox => "checkbox",
        WidgetKind::Select { .. } => "select",
    }
}

/// Renders form widgets as `LABEL | TYPE | VALUE | NOTES` rows.
pub fn render_widgets(widgets: &[Widget]) -> String {
    let rows: Vec<Vec<String>> = widgets
        .iter()
        .map(|w| {
            let label = if w.required {
                format!("{} *", w.label)
            } else {
                w.label.clone()
            };
            let mut notes: Vec<String> = Vec::new();
            if w.disabled {
                notes.push("read-only".to_string());
            }
            if let Some(hint) = &w.hint {
                notes.push(hint.clone());
            }
            if let WidgetKind::Select { options, .. } = &w.kind
                && !options.is_empty()
            {
                let labels: Vec<&str> = options.iter().map(|o| o.label.as_str()).collect();
                notes.push(labels.join(" / "));
            }
            vec![
                label,
                kind_name(&w.kind).to_string(),
                widget_value(w),
                notes.join("; "),
            ]
        })
        .collect();
    render_table(
        &[
            "FIELD".to_string(),
            "TYPE".to_string(),
            "VALUE".to_string(),
            "NOTES".to_string(),
        ],
        &rows,
    )
}

/// Left-aligned text table padded to the widest cell of each column.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: &[String]| -> String {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect();
        format!("{}\n", padded.join("  ").trim_end())
    };

    let mut out = line(headers);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&line(&rule));
    for row in rows {
        out.push_str(&line(row));
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use tablecraft_core::{MessageCatalog, RecordKey, TableConfig, ValidationConfig};
    use tablecraft_engine::memory::MemorySource;

    fn table_config() -> TableConfig {
        serde_json::from_value(json!({
            "project": { "name": "Shop", "defaultLanguage": "en" },
            "tables": {
                "products": {
                    "name": "products",
                    "metadata": { "sortOrder": 2, "labels": { "en": "Products" } },
                    "formFields": [
                        { "name": "name", "type": "text", "required": true },
                        { "name": "price", "type": "number" }
                    ],
                    "listColumns": [
                        { "name": "id", "sortable": true },
                        { "name": "name", "sortable": true, "searchable": true },
                        { "name": "price", "sortable": true, "format": "decimal", "decimalPlaces": 0 }
                    ]
                },
                "order_details": {
                    "name": "order_details",
                    "metadata": { "sortOrder": 1, "labels": { "en": "Order lines" } },
                    "primaryKey": { "type": "composite", "columns": ["order_id", "product_id"] },
                    "formFields": [
                        { "name": "order_id", "type": "number", "required": true },
                        { "name": "product_id", "type": "select",
                          "options": { "type": "foreign_key", "table": "products",
                                       "valueColumn": "id", "displayColumn": "name" },
                          "autofill": { "sourceTable": "products",
                                        "mappings": [ { "source": "price", "target": "unit_price" } ] } },
                        { "name": "unit_price", "type": "number" },
                        { "name": "quantity", "type": "number" },
                        { "name": "subtotal", "type": "number", "readonly": true,
                          "autoCalculate": { "formula": "unit_price * quantity" } }
                    ],
                    "listColumns": [
                        { "name": "order_id" },
                        { "name": "product_id",
                          "foreignKey": { "table": "products", "displayColumn": "name" } },
                        { "name": "subtotal" }
                    ]
                }
            }
        }))
        .unwrap()
    }

    fn validation_config() -> ValidationConfig {
        serde_json::from_value(json!({
            "tables": {
                "order_details": { "fields": {
                    "quantity": { "rules": [
                        { "type": "required", "message": "validation.required" },
                        { "type": "min", "value": 1, "message": "validation.min.value" }
                    ] }
                } }
            }
        }))
        .unwrap()
    }

    async fn app() -> (App, Arc<MemorySource>) {
        let source = Arc::new(MemorySource::with_config(table_config(), validation_config()));
        source
            .insert_rows(
                "products",
                vec![
                    as_record(json!({"id": 1, "name": "Pen", "price": 120})).unwrap(),
                    as_record(json!({"id": 2, "name": "Ink", "price": 450})).unwrap(),
                    as_record(json!({"id": 3, "name": "Pad", "price": null})).unwrap(),
                ],
            )
            .await;
        source
            .insert_rows(
                "order_details",
                vec![as_record(json!({"order_id": 1, "product_id": 2, "subtotal": 900})).unwrap()],
            )
            .await;
        let mut messages = MessageCatalog::new();
        messages.insert("validation.required", "This field is required");
        messages.insert("validation.min.value", "Must be at least {0}");
        source.insert_messages("en", messages).await;

        let app = App::new(source.clone(), source.clone(), None);
        (app, source)
    }

    fn write_json(dir: &tempfile::TempDir, name: &str, value: Value) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, value.to_string()).unwrap();
        path
    }

    #[tokio::test]
    async fn test_tables_in_display_order() {
        let (app, _) = app().await;
        let out = app.tables().await.unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].starts_with("TABLE"));
        assert!(lines[2].starts_with("order_details"));
        assert!(lines[2].contains("Order lines"));
        assert!(lines[3].starts_with("products"));
    }

    #[tokio::test]
    async fn test_list_sorted_desc_with_nulls_last() {
        let (app, _) = app().await;
        let out = app.list("products", None, Some("price"), true).await.unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].contains("price ↓"));
        assert!(lines[2].contains("Ink"));
        assert!(lines[3].contains("Pen"));
        assert!(lines[4].contains("Pad"));
        assert_eq!(lines[5], "3 records");
    }

    #[tokio::test]
    async fn test_list_search_and_foreign_key_display() {
        let (app, _) = app().await;
        let out = app.list("products", Some("  pe "), None, false).await.unwrap();
        assert!(out.contains("Pen"));
        assert!(!out.contains("Ink"));
        assert!(out.ends_with("1 of 3 records\n"));

        let out = app.list("order_details", None, None, false).await.unwrap();
        assert!(out.contains("Ink"));
    }

    #[tokio::test]
    async fn test_list_rejects_unsortable_column() {
        let (app, _) = app().await;
        let err = app
            .list("order_details", None, Some("subtotal"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Usage(_)));
    }

    #[tokio::test]
    async fn test_unknown_table() {
        let (app, _) = app().await;
        let err = app.list("nope", None, None, false).await.unwrap_err();
        assert_eq!(err.to_string(), "table not found: nope");
    }

    #[tokio::test]
    async fn test_form_shows_select_options() {
        let (app, _) = app().await;
        let out = app.form("order_details", None).await.unwrap();
        assert!(out.contains("select"));
        assert!(out.contains("Pen / Ink / Pad"));
        assert!(out.contains("read-only"));
    }

    #[tokio::test]
    async fn test_validate_create_runs_derivations() {
        let (app, _) = app().await;
        let dir = tempfile::TempDir::new().unwrap();

        let ok = write_json(
            &dir,
            "ok.json",
            json!({"order_id": 5, "product_id": 1, "quantity": 2, "note": "x"}),
        );
        assert!(app.validate("order_details", &ok, false).await.unwrap().is_valid());

        let bad = write_json(&dir, "bad.json", json!({"order_id": 5, "quantity": 0}));
        let report = app.validate("order_details", &bad, false).await.unwrap();
        assert_eq!(render_report(&report), "quantity: Must be at least 1\n");
    }

    #[tokio::test]
    async fn test_submit_create_sends_derived_values() {
        let (app, source) = app().await;
        let dir = tempfile::TempDir::new().unwrap();
        let file = write_json(
            &dir,
            "line.json",
            json!({"order_id": 7, "product_id": 2, "quantity": 3}),
        );

        app.submit("order_details", &file, false).await.unwrap();
        let rows = source.rows("order_details").await;
        let created = rows.last().unwrap();
        assert_eq!(created["unit_price"], json!(450));
        assert_eq!(created["subtotal"], json!(1350));
    }

    #[tokio::test]
    async fn test_submit_invalid_is_rejected() {
        let (app, source) = app().await;
        let dir = tempfile::TempDir::new().unwrap();
        let file = write_json(&dir, "line.json", json!({"order_id": 7}));

        let err = app.submit("order_details", &file, false).await.unwrap_err();
        assert!(matches!(err, Error::Invalid { count: 1 }));
        assert_eq!(source.rows("order_details").await.len(), 1);
    }

    #[tokio::test]
    async fn test_submit_edit_updates_by_composite_key() {
        let (app, source) = app().await;
        let dir = tempfile::TempDir::new().unwrap();
        let file = write_json(
            &dir,
            "line.json",
            json!({"order_id": 1, "product_id": 2, "unit_price": 450, "quantity": 4}),
        );

        app.submit("order_details", &file, true).await.unwrap();
        let rows = source.rows("order_details").await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["subtotal"], json!(1800));
    }

    #[tokio::test]
    async fn test_delete_composite_key() {
        let (app, source) = app().await;
        let keys = vec!["order_id=1".to_string(), "product_id=2".to_string()];
        assert!(app.delete("order_details", &keys).await.unwrap());
        assert!(source.rows("order_details").await.is_empty());
        assert!(!app.delete("order_details", &keys).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_missing_key_column() {
        let (app, _) = app().await;
        let err = app
            .delete("order_details", &["order_id=1".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Core(_)));
    }

    #[test]
    fn test_parse_key_pairs() {
        let record =
            parse_key_pairs(&["id=3".to_string(), "code=A-1".to_string()]).unwrap();
        assert_eq!(record["id"], json!(3));
        assert_eq!(record["code"], json!("A-1"));
        assert!(parse_key_pairs(&["=3".to_string()]).is_err());
        assert!(parse_key_pairs(&["id".to_string()]).is_err());

        let key = RecordKey::from_record(&record, &tablecraft_core::PrimaryKey::single("id"));
        assert_eq!(key.unwrap().to_string(), "id=3");
    }

    #[test]
    fn test_read_record_rejects_arrays() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_json(&dir, "rows.json", json!([1, 2]));
        assert!(read_record(&path).is_err());
        assert!(read_record(&dir.path().join("absent.json")).is_err());
    }

    #[test]
    fn test_generate_config_writes_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let metadata = write_json(
            &dir,
            "schema.json",
            json!({
                "project": { "name": "Shop", "defaultLanguage": "en" },
                "tables": { "products": { "columns": {
                    "id": { "type": "INT",
                            "constraints": { "primaryKey": true, "autoIncrement": true, "nullable": false } },
                    "name": { "type": "VARCHAR(100)", "constraints": { "nullable": false } }
                } } }
            }),
        );
        let out = dir.path().join("out");
        let written = generate_config(&metadata, &out).unwrap();
        assert!(written.iter().any(|p| p.ends_with("table-config.json")));
        assert!(out.join("validation-config.json").exists());
    }

    #[test]
    fn test_render_table_pads_columns() {
        let out = render_table(
            &["A".to_string(), "LONG".to_string()],
            &[vec!["xyz".to_string(), "1".to_string()]],
        );
        assert_eq!(out, "A    LONG\n---  ----\nxyz  1\n");
    }
}
