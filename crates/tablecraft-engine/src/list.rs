//! List view.
//!
//! Filters, sorts, and formats a table's records for display. Cells are
//! plain strings; foreign-key columns show the referenced display value.

use crate::render::RenderContext;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use tablecraft_core::model::{ColumnFormat, ListColumn, TableDefinition};
use tablecraft_core::record::{as_number, display_string, lookup};
use tablecraft_core::{Record, RecordKey};

/// Decimal places when a `decimal` column does not set any.
pub const DEFAULT_DECIMAL_PLACES: u32 = 2;

const DATE_FORMAT: &str = "%Y/%m/%d";
const DATETIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Sort direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Smallest first.
    Asc,
    /// Largest first.
    Desc,
}

/// Current sort column and direction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SortState {
    /// Sorted column.
    pub column: String,
    /// Direction.
    pub direction: SortDirection,
}

/// A column header.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ListHeader {
    /// Column name.
    pub name: String,
    /// Label with sort indicator.
    pub title: String,
    /// Whether clicking sorts.
    pub sortable: bool,
}

/// One formatted row.
#[derive(Clone, Debug, PartialEq)]
pub struct ListRow {
    /// Record key, when the record carries one.
    pub key: Option<RecordKey>,
    /// Formatted cells in column order.
    pub cells: Vec<String>,
}

/// Row counts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ListSummary {
    /// Records matching the search.
    pub filtered: usize,
    /// All records.
    pub total: usize,
}

/// Records of one table as a searchable, sortable list.
#[derive(Debug)]
pub struct ListView<'a> {
    definition: &'a TableDefinition,
    ctx: RenderContext<'a>,
    records: Vec<Record>,
    search: String,
    sort: Option<SortState>,
}

impl<'a> ListView<'a> {
    /// Creates a view over `records`.
    pub fn new(definition: &'a TableDefinition, records: Vec<Record>, ctx: RenderContext<'a>) -> Self {
        Self {
            definition,
            ctx,
            records,
            search: String::new(),
            sort: None,
        }
    }

    /// Sets the search text; empty shows everything.
    pub fn set_search(&mut self, query: &str) {
        self.search = query.trim().to_lowercase();
    }

    /// Current sort.
    pub fn sort(&self) -> Option<&SortState> {
        self.sort.as_ref()
    }

    /// Sorts by `column`, flipping direction when it is already sorted.
    ///
    /// Unknown and non-sortable columns are ignored.
    pub fn toggle_sort(&mut self, column: &str) {
        if !self
            .definition
            .list_column(column)
            .is_some_and(|c| c.sortable)
        {
            log::debug!("'{}.{column}' is not sortable", self.definition.name);
            return;
        }
        self.sort = Some(match self.sort.take() {
            Some(SortState { column: current, direction }) if current == column => SortState {
                column: current,
                direction: match direction {
                    SortDirection::Asc => SortDirection::Desc,
                    SortDirection::Desc => SortDirection::Asc,
                },
            },
            _ => SortState {
                column: column.to_string(),
                direction: SortDirection::Asc,
            },
        });
    }

    fn matches_search(&self, record: &Record) -> bool {
        self.search.is_empty()
            || record
                .values()
                .any(|v| display_string(v).to_lowercase().contains(&self.search))
    }

    fn visible(&self) -> Vec<&Record> {
        let mut records: Vec<&Record> = self
            .records
            .iter()
            .filter(|r| self.matches_search(r))
            .collect();
        if let Some(sort) = &self.sort {
            records.sort_by(|a, b| {
                compare_cells(
                    lookup(a, &sort.column),
                    lookup(b, &sort.column),
                    sort.direction,
                )
            });
        }
        records
    }

    /// Filtered and sorted rows.
    pub fn rows(&self) -> Vec<ListRow> {
        let key = self.definition.primary_key();
        self.visible()
            .into_iter()
            .map(|record| ListRow {
                key: RecordKey::from_record(record, &key).ok(),
                cells: self
                    .definition
                    .list_columns
                    .iter()
                    .map(|column| self.format_cell(column, record))
                    .collect(),
            })
            .collect()
    }

    /// Headers with sort indicators.
    pub fn headers(&self) -> Vec<ListHeader> {
        self.definition
            .list_columns
            .iter()
            .map(|column| {
                let label = column.label_text(self.ctx.language, self.ctx.default_language);
                let indicator = match &self.sort {
                    Some(sort) if sort.column == column.name => match sort.direction {
                        SortDirection::Asc => " ↑",
                        SortDirection::Desc => " ↓",
                    },
                    _ if column.sortable => " ↕",
                    _ => "",
                };
                ListHeader {
                    name: column.name.clone(),
                    title: format!("{label}{indicator}"),
                    sortable: column.sortable,
                }
            })
            .collect()
    }

    /// Drops records carrying `key`; returns how many were removed.
    pub fn remove(&mut self, key: &RecordKey) -> usize {
        let before = self.records.len();
        self.records.retain(|r| !key.matches(r));
        before - self.records.len()
    }

    /// Filtered and total counts.
    pub fn summary(&self) -> ListSummary {
        ListSummary {
            filtered: self.records.iter().filter(|r| self.matches_search(r)).count(),
            total: self.records.len(),
        }
    }

    fn format_cell(&self, column: &ListColumn, record: &Record) -> String {
        let value = match lookup(record, &column.name) {
            None | Some(Value::Null) => return "-".to_string(),
            Some(v) => v,
        };
        if column.foreign_key.is_some() {
            return self.ctx.lookups.display_for(column, value);
        }
        format_value(column, value)
    }
}

/// Formats one non-null cell value.
pub fn format_value(column: &ListColumn, value: &Value) -> String {
    match column.format {
        Some(ColumnFormat::Boolean) => check_mark(is_truthy(value)).to_string(),
        Some(ColumnFormat::Decimal) => match as_number(value) {
            Some(n) => {
                let places = column.decimal_places.unwrap_or(DEFAULT_DECIMAL_PLACES) as usize;
                format!("{n:.places$}")
            }
            None => display_string(value),
        },
        Some(ColumnFormat::Date) => {
            let text = display_string(value);
            parse_date(&text)
                .map(|d| d.format(DATE_FORMAT).to_string())
                .unwrap_or(text)
        }
        Some(ColumnFormat::Datetime) => {
            let text = display_string(value);
            parse_datetime(&text)
                .map(|d| d.format(DATETIME_FORMAT).to_string())
                .unwrap_or(text)
        }
        Some(ColumnFormat::Plain) | None => match value {
            Value::Bool(b) => check_mark(*b).to_string(),
            Value::String(s) if s.contains('T') => parse_datetime(s)
                .map(|d| d.format(DATETIME_FORMAT).to_string())
                .unwrap_or_else(|| s.clone()),
            other => display_string(other),
        },
    }
}

fn check_mark(flag: bool) -> &'static str {
    if flag { "✓" } else { "✗" }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(_) => as_number(value).is_some_and(|n| n != 0.0),
        Value::String(s) => matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes"),
        _ => false,
    }
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_datetime(text).map(|dt| dt.date()))
}

/// Orders two cells; nulls sort last in either direction.
fn compare_cells(a: Option<&Value>, b: Option<&Value>, direction: SortDirection) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => {
            let ordering = compare_values(a, b);
            match direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        }
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Number(_), Value::Number(_)) => {
            let (x, y) = (as_number(a).unwrap_or(0.0), as_number(b).unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => display_string(a).cmp(&display_string(b)),
    }
}
