//! Foreign-key resolution.
//!
//! A [`LookupSet`] holds the rows of every table a screen refers to: select
//! option sources, list column display lookups, and autofill sources. Each
//! table is fetched once per screen.

use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tablecraft_core::model::{ColumnForeignKey, FormField, ListColumn, TableDefinition};
use tablecraft_core::record::{display_string, is_blank, lookup, values_match};
use tablecraft_core::{Record, RecordSource};

/// One choice of a select widget.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SelectOption {
    /// Submitted value.
    pub value: Value,
    /// Display label.
    pub label: String,
}

/// Rows of referenced tables, keyed by table name.
#[derive(Clone, Debug, Default)]
pub struct LookupSet {
    rows: BTreeMap<String, Vec<Record>>,
}

impl LookupSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) the rows of a table.
    pub fn insert(&mut self, table: impl Into<String>, rows: Vec<Record>) {
        self.rows.insert(table.into(), rows);
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with_rows(mut self, table: impl Into<String>, rows: Vec<Record>) -> Self {
        self.insert(table, rows);
        self
    }

    /// Every table referenced by a table definition.
    pub fn referenced_tables(definition: &TableDefinition) -> BTreeSet<String> {
        let mut tables = BTreeSet::new();
        for field in &definition.form_fields {
            if let Some(table) = field.options.as_ref().and_then(|o| o.foreign_table()) {
                tables.insert(table.to_string());
            }
            if let Some(autofill) = field.autofill.as_ref().filter(|a| a.enabled) {
                tables.insert(autofill.source_table.clone());
            }
        }
        for column in &definition.list_columns {
            if let Some(fk) = &column.foreign_key {
                tables.insert(fk.table.clone());
            }
        }
        tables
    }

    /// Fetches every referenced table concurrently.
    ///
    /// A table that fails to load is logged and treated as empty.
    pub async fn load(source: &dyn RecordSource, definition: &TableDefinition) -> Self {
        let tables: Vec<String> = Self::referenced_tables(definition).into_iter().collect();
        let results = join_all(tables.iter().map(|t| source.find_all(t))).await;

        let mut set = Self::new();
        for (table, result) in tables.into_iter().zip(results) {
            match result {
                Ok(rows) => {
                    log::debug!("loaded {} lookup rows from '{table}'", rows.len());
                    set.insert(table, rows);
                }
                Err(e) => {
                    log::warn!("failed to load lookup table '{table}': {e}");
                    set.insert(table, Vec::new());
                }
            }
        }
        set
    }

    /// Rows of a table; empty when the table was not loaded.
    pub fn rows(&self, table: &str) -> &[Record] {
        self.rows.get(table).map(Vec::as_slice).unwrap_or_default()
    }

    /// Returns `true` if the table's rows are present.
    pub fn contains(&self, table: &str) -> bool {
        self.rows.contains_key(table)
    }

    /// Options of a select field: static items, or rows of the referenced
    /// table.
    pub fn select_options(
        &self,
        field: &FormField,
        language: &str,
        default_language: &str,
    ) -> Vec<SelectOption> {
        let Some(options) = &field.options else {
            return Vec::new();
        };

        if let Some(table) = options.foreign_table() {
            return self
                .rows(table)
                .iter()
                .filter_map(|row| {
                    let value = option_value(row, &options.value_column)?;
                    let label = match lookup(row, &options.display_column) {
                        Some(v) if !is_blank(Some(v)) => display_string(v),
                        _ => display_string(&value),
                    };
                    Some(SelectOption { value, label })
                })
                .collect();
        }

        options
            .items
            .iter()
            .map(|item| SelectOption {
                label: item
                    .label
                    .resolve(language, default_language)
                    .map(str::to_string)
                    .unwrap_or_else(|| display_string(&item.value)),
                value: item.value.clone(),
            })
            .collect()
    }

    /// Cell text for a list column value.
    ///
    /// Foreign-key columns show the referenced row's display column (`-`
    /// when that is null); unmatched values are shown raw.
    pub fn display_for(&self, column: &ListColumn, value: &Value) -> String {
        let Some(fk) = &column.foreign_key else {
            return display_string(value);
        };
        match self.find(fk, value) {
            Some(row) => match lookup(row, &fk.display_column) {
                Some(v) if !v.is_null() => display_string(v),
                _ => "-".to_string(),
            },
            None => display_string(value),
        }
    }

    /// The row of `table` whose `column` equals `value`.
    pub fn row_for(&self, table: &str, column: &str, value: &Value) -> Option<&Record> {
        self.rows(table).iter().find(|row| {
            lookup(row, column)
                .or_else(|| fallback_id(row, column))
                .is_some_and(|v| values_match(v, value))
        })
    }

    fn find(&self, fk: &ColumnForeignKey, value: &Value) -> Option<&Record> {
        self.row_for(&fk.table, &fk.value_column, value)
    }
}

fn fallback_id<'a>(row: &'a Record, column: &str) -> Option<&'a Value> {
    if column.eq_ignore_ascii_case("id") {
        None
    } else {
        lookup(row, "id")
    }
}

fn option_value(row: &Record, value_column: &str) -> Option<Value> {
    lookup(row, value_column)
        .filter(|v| !v.is_null())
        .or_else(|| fallback_id(row, value_column))
        .cloned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::memory::MemorySource;
    use serde_json::json;
    use tablecraft_core::model::{
        AutofillConfig, FieldMapping, FieldType, LocalizedText, SelectOptions, StaticOption,
    };
    use tablecraft_core::record::as_record;

    fn rows(value: Value) -> Vec<Record> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|v| as_record(v.clone()).unwrap())
            .collect()
    }

    fn category_field() -> FormField {
        let mut field = FormField::new("category_id", FieldType::Select);
        field.options = Some(SelectOptions::foreign_key("categories", "id", "name"));
        field
    }

    fn categories() -> LookupSet {
        LookupSet::new().with_rows(
            "categories",
            rows(json!([
                {"ID": 1, "NAME": "Books"},
                {"ID": 2, "NAME": null},
                {"NAME": "orphan"}
            ])),
        )
    }

    #[test]
    fn test_select_options_from_foreign_rows() {
        let options = categories().select_options(&category_field(), "ja", "ja");
        assert_eq!(
            options,
            vec![
                SelectOption { value: json!(1), label: "Books".into() },
                SelectOption { value: json!(2), label: "2".into() },
            ]
        );
    }

    #[test]
    fn test_select_options_value_column_falls_back_to_id() {
        let mut field = category_field();
        field.options = Some(SelectOptions::foreign_key("categories", "code", "name"));
        let options = categories().select_options(&field, "ja", "ja");
        assert_eq!(options[0].value, json!(1));
    }

    #[test]
    fn test_select_options_static_items() {
        let mut field = FormField::new("status", FieldType::Select);
        field.options = Some(SelectOptions {
            items: vec![
                StaticOption {
                    value: json!("open"),
                    label: LocalizedText::from_pairs([("en", "Open")]),
                },
                StaticOption { value: json!("closed"), label: LocalizedText::default() },
            ],
            ..SelectOptions::default()
        });
        let options = LookupSet::new().select_options(&field, "en", "ja");
        assert_eq!(options[0].label, "Open");
        assert_eq!(options[1].label, "closed");
    }

    #[test]
    fn test_display_for_foreign_column() {
        let mut column = ListColumn::new("category_id");
        column.foreign_key = Some(ColumnForeignKey {
            table: "categories".into(),
            display_column: "name".into(),
            value_column: "id".into(),
        });
        let set = categories();
        assert_eq!(set.display_for(&column, &json!(1)), "Books");
        assert_eq!(set.display_for(&column, &json!("1")), "Books");
        assert_eq!(set.display_for(&column, &json!(2)), "-");
        assert_eq!(set.display_for(&column, &json!(99)), "99");
        assert_eq!(set.display_for(&ListColumn::new("x"), &json!(5)), "5");
    }

    #[test]
    fn test_referenced_tables_dedup() {
        let mut selector = category_field();
        selector.autofill = Some(AutofillConfig {
            enabled: true,
            source_table: "categories".into(),
            source_column: "id".into(),
            mappings: vec![FieldMapping { source: "name".into(), target: "label".into() }],
        });
        let mut column = ListColumn::new("supplier_id");
        column.foreign_key = Some(ColumnForeignKey {
            table: "suppliers".into(),
            display_column: "name".into(),
            value_column: "id".into(),
        });
        let definition = TableDefinition {
            name: "products".into(),
            form_fields: vec![selector],
            list_columns: vec![column],
            ..TableDefinition::default()
        };
        let tables: Vec<String> = LookupSet::referenced_tables(&definition).into_iter().collect();
        assert_eq!(tables, vec!["categories", "suppliers"]);
    }

    #[tokio::test]
    async fn test_load_failure_yields_empty_rows() {
        let source = MemorySource::new();
        source.insert_rows("categories", rows(json!([{"id": 1, "name": "Books"}]))).await;
        source.fail_table("suppliers").await;

        let mut column = ListColumn::new("supplier_id");
        column.foreign_key = Some(ColumnForeignKey {
            table: "suppliers".into(),
            display_column: "name".into(),
            value_column: "id".into(),
        });
        let definition = TableDefinition {
            name: "products".into(),
            form_fields: vec![category_field()],
            list_columns: vec![column],
            ..TableDefinition::default()
        };

        let set = LookupSet::load(&source, &definition).await;
        assert_eq!(set.rows("categories").len(), 1);
        assert!(set.contains("suppliers"));
        assert!(set.rows("suppliers").is_empty());
    }
}
