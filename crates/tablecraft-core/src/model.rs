//! Configuration data model.
//!
//! Typed views of the three JSON documents that drive the dynamic screens:
//!
//! - `table-config.json` → [`TableConfig`]: tables, form fields, list columns
//! - `validation-config.json` → [`ValidationConfig`]: per-field rule lists
//! - message catalogs → [`MessageCatalog`](crate::messages::MessageCatalog)
//!
//! Keys are camelCase on the wire. Unknown keys are ignored so that newer
//! generators can add directives without breaking older readers.
//!
//! # Example
//!
//! ```rust
//! use tablecraft_core::model::TableConfig;
//!
//! let json = r#"{
//!   "project": { "defaultLanguage": "en" },
//!   "tables": {
//!     "users": {
//!       "name": "users",
//!       "metadata": { "labels": { "en": "Users" } },
//!       "formFields": [
//!         { "name": "email", "type": "email", "label": { "en": "Email" }, "required": true }
//!       ],
//!       "listColumns": []
//!     }
//!   }
//! }"#;
//!
//! let config = TableConfig::from_json(json).unwrap();
//! let users = config.table("users").unwrap();
//! assert_eq!(users.label("en", "en"), "Users");
//! assert!(users.form_field("email").unwrap().required);
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

fn default_true() -> bool {
    true
}

fn default_id() -> String {
    "id".to_string()
}

fn default_name_column() -> String {
    "name".to_string()
}

// ============================================================================
// LocalizedText
// ============================================================================

/// Text keyed by language code (`{"ja": "名前", "en": "Name"}`).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalizedText(pub BTreeMap<String, String>);

impl LocalizedText {
    /// Creates localized text from `(language, text)` pairs.
    pub fn from_pairs<I, L, T>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (L, T)>,
        L: Into<String>,
        T: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(l, t)| (l.into(), t.into()))
                .collect(),
        )
    }

    /// Text for `language`, falling back to `default_language`.
    ///
    /// Empty strings count as missing.
    pub fn resolve(&self, language: &str, default_language: &str) -> Option<&str> {
        [language, default_language]
            .iter()
            .filter_map(|lang| self.0.get(*lang))
            .map(String::as_str)
            .find(|text| !text.is_empty())
    }

    /// Sets the text for a language.
    pub fn insert(&mut self, language: impl Into<String>, text: impl Into<String>) {
        self.0.insert(language.into(), text.into());
    }

    /// Returns `true` if the given language has an entry.
    pub fn contains(&self, language: &str) -> bool {
        self.0.contains_key(language)
    }

    /// Returns `true` if no language has an entry.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ============================================================================
// Project & table config
// ============================================================================

/// Project-wide settings shared by all tables.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectSettings {
    /// Display name of the project.
    pub name: String,
    /// Language used when the caller does not choose one.
    pub default_language: String,
    /// Languages labels are expected in.
    pub supported_languages: Vec<String>,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            name: String::new(),
            default_language: "ja".to_string(),
            supported_languages: vec!["ja".to_string(), "en".to_string()],
        }
    }
}

/// The `table-config.json` document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TableConfig {
    /// Schema version of the document.
    pub version: String,
    /// Generation timestamp, if produced by the generator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated: Option<String>,
    /// Project settings.
    pub project: ProjectSettings,
    /// Table definitions keyed by table name.
    pub tables: BTreeMap<String, TableDefinition>,
}

impl TableConfig {
    /// Parses a `table-config.json` document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Looks up a table definition by name.
    pub fn table(&self, name: &str) -> Result<&TableDefinition> {
        self.tables
            .get(name)
            .ok_or_else(|| Error::not_found("table", name))
    }

    /// Tables ordered by `metadata.sortOrder`, then by name.
    pub fn tables_in_display_order(&self) -> Vec<&TableDefinition> {
        let mut tables: Vec<&TableDefinition> = self.tables.values().collect();
        tables.sort_by(|a, b| {
            a.metadata
                .sort_order
                .cmp(&b.metadata.sort_order)
                .then_with(|| a.name.cmp(&b.name))
        });
        tables
    }
}

/// Display metadata for a table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TableMetadata {
    /// Icon shown next to the table name.
    pub icon: String,
    /// Accent colour.
    pub color: String,
    /// Position in navigation.
    pub sort_order: i64,
    /// Navigation group.
    pub category: String,
    /// Table display name.
    pub labels: LocalizedText,
    /// Table description.
    pub description: LocalizedText,
}

impl Default for TableMetadata {
    fn default() -> Self {
        Self {
            icon: "🗄️".to_string(),
            color: "#4A90E2".to_string(),
            sort_order: 0,
            category: "general".to_string(),
            labels: LocalizedText::default(),
            description: LocalizedText::default(),
        }
    }
}

/// Raw column directives carried through from the schema metadata.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ColumnConfig {
    /// Column name.
    pub name: String,
    /// SQL data type.
    #[serde(rename = "type")]
    pub sql_type: String,
    /// Constraint directives (nullable, primaryKey, unique, ...).
    pub constraints: Value,
    /// Column labels.
    pub labels: LocalizedText,
    /// UI directives.
    pub ui: Value,
    /// Validation directives.
    pub validation: Value,
    /// Foreign-key directive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<Value>,
}

/// One table's screen configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TableDefinition {
    /// Table name (also the backend table name).
    pub name: String,
    /// Display metadata.
    pub metadata: TableMetadata,
    /// Primary key; absent means a single `id` column.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<PrimaryKey>,
    /// Column directives.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<ColumnConfig>,
    /// Form fields, in display order.
    pub form_fields: Vec<FormField>,
    /// List columns, in display order.
    pub list_columns: Vec<ListColumn>,
    /// Columns that take part in search.
    pub searchable_columns: Vec<String>,
    /// Columns that can be sorted.
    pub sortable_columns: Vec<String>,
}

impl TableDefinition {
    /// The primary key, defaulting to a single `id` column.
    pub fn primary_key(&self) -> PrimaryKey {
        self.primary_key.clone().unwrap_or_default()
    }

    /// Looks up a form field by name.
    pub fn form_field(&self, name: &str) -> Option<&FormField> {
        self.form_fields.iter().find(|f| f.name == name)
    }

    /// Looks up a list column by name.
    pub fn list_column(&self, name: &str) -> Option<&ListColumn> {
        self.list_columns.iter().find(|c| c.name == name)
    }

    /// Localized table label, falling back to the table name.
    pub fn label(&self, language: &str, default_language: &str) -> String {
        self.metadata
            .labels
            .resolve(language, default_language)
            .unwrap_or(&self.name)
            .to_string()
    }

    /// Localized description, if any.
    pub fn description(&self, language: &str, default_language: &str) -> Option<&str> {
        self.metadata.description.resolve(language, default_language)
    }
}

// ============================================================================
// Primary key
// ============================================================================

/// Whether a primary key spans one or several columns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyKind {
    /// One key column.
    #[default]
    Single,
    /// Several key columns.
    Composite,
}

/// Primary key description.
///
/// Generators emit `column` for single keys and `columns` for composite ones;
/// both spellings are accepted for either kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrimaryKey {
    /// Single or composite.
    #[serde(rename = "type")]
    pub kind: KeyKind,
    /// Key column for single keys.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    /// Key columns for composite keys.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,
}

impl Default for PrimaryKey {
    fn default() -> Self {
        Self::single("id")
    }
}

impl PrimaryKey {
    /// A single-column key.
    pub fn single(column: impl Into<String>) -> Self {
        Self {
            kind: KeyKind::Single,
            column: Some(column.into()),
            columns: Vec::new(),
        }
    }

    /// A composite key over the given columns.
    pub fn composite<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: KeyKind::Composite,
            column: None,
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Key columns in order.
    pub fn columns(&self) -> Vec<&str> {
        if !self.columns.is_empty() {
            self.columns.iter().map(String::as_str).collect()
        } else {
            vec![self.column.as_deref().unwrap_or("id")]
        }
    }

    /// Returns `true` when records are addressed by several columns.
    pub fn is_composite(&self) -> bool {
        self.kind == KeyKind::Composite && !self.columns.is_empty()
    }
}

// ============================================================================
// Form fields
// ============================================================================

/// Input type of a form field.
///
/// Unknown type names are preserved and rendered as text inputs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    /// Single-line text.
    #[default]
    Text,
    /// Email address.
    Email,
    /// Telephone number.
    Tel,
    /// Multi-line text.
    Textarea,
    /// Numeric input.
    Number,
    /// Calendar date.
    Date,
    /// Date and time.
    DateTimeLocal,
    /// Boolean checkbox.
    Checkbox,
    /// Choice from a list.
    Select,
    /// Not shown.
    Hidden,
    /// Unrecognised type name.
    Other(String),
}

impl FieldType {
    /// Wire name of the type.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text => "text",
            Self::Email => "email",
            Self::Tel => "tel",
            Self::Textarea => "textarea",
            Self::Number => "number",
            Self::Date => "date",
            Self::DateTimeLocal => "datetime-local",
            Self::Checkbox => "checkbox",
            Self::Select => "select",
            Self::Hidden => "hidden",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for FieldType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "text" => Self::Text,
            "email" => Self::Email,
            "tel" => Self::Tel,
            "textarea" => Self::Textarea,
            "number" => Self::Number,
            "date" => Self::Date,
            "datetime-local" | "datetime" => Self::DateTimeLocal,
            "checkbox" => Self::Checkbox,
            "select" => Self::Select,
            "hidden" => Self::Hidden,
            _ => Self::Other(s),
        }
    }
}

impl From<FieldType> for String {
    fn from(t: FieldType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// UI directives nested under `ui`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UiHints {
    /// Field is not rendered and not validated.
    pub hidden: bool,
    /// Field is read-only.
    pub readonly: bool,
    /// Overrides the input type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
}

/// One entry of a static option list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StaticOption {
    /// Submitted value.
    pub value: Value,
    /// Display label.
    #[serde(default)]
    pub label: LocalizedText,
}

/// Option source of a `select` field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SelectOptions {
    /// `foreign_key` for table-backed options; absent for static lists.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Referenced table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    /// Column submitted as the value.
    pub value_column: String,
    /// Column shown as the label.
    pub display_column: String,
    /// Whether an empty choice is offered.
    pub allow_null: bool,
    /// Label of the empty choice.
    pub null_label: LocalizedText,
    /// Static choices.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<StaticOption>,
}

impl Default for SelectOptions {
    fn default() -> Self {
        Self {
            kind: None,
            table: None,
            value_column: default_id(),
            display_column: default_name_column(),
            allow_null: false,
            null_label: LocalizedText::default(),
            items: Vec::new(),
        }
    }
}

impl SelectOptions {
    /// Options loaded from another table.
    pub fn foreign_key(
        table: impl Into<String>,
        value_column: impl Into<String>,
        display_column: impl Into<String>,
    ) -> Self {
        Self {
            kind: Some("foreign_key".to_string()),
            table: Some(table.into()),
            value_column: value_column.into(),
            display_column: display_column.into(),
            ..Self::default()
        }
    }

    /// Referenced table when options come from a foreign key.
    pub fn foreign_table(&self) -> Option<&str> {
        match (self.kind.as_deref(), self.table.as_deref()) {
            (Some("foreign_key"), Some(table)) => Some(table),
            _ => None,
        }
    }
}

/// A `{source, target}` pair copied by autofill.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Column of the looked-up source row.
    #[serde(alias = "from", alias = "sourceColumn")]
    pub source: String,
    /// Form field receiving the value.
    #[serde(alias = "to", alias = "targetField")]
    pub target: String,
}

/// Copies columns of a selected foreign row into other fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutofillConfig {
    /// Whether autofill runs.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Table holding the source rows.
    pub source_table: String,
    /// Column of the source table matched against the selected value.
    #[serde(default = "default_id")]
    pub source_column: String,
    /// Columns to copy.
    #[serde(default)]
    pub mappings: Vec<FieldMapping>,
}

/// Recomputes a field from a formula when its inputs change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoCalculateConfig {
    /// Whether the calculation runs.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Arithmetic formula over field names.
    pub formula: String,
    /// Field receiving the result; defaults to the carrying field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_field: Option<String>,
    /// Fields whose changes trigger the calculation; defaults to the
    /// fields referenced by the formula.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trigger_fields: Vec<String>,
}

/// A form field descriptor.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormField {
    /// Field (column) name.
    pub name: String,
    /// Input type.
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Field label.
    pub label: LocalizedText,
    /// Placeholder text.
    pub placeholder: LocalizedText,
    /// Marked as required in the UI.
    pub required: bool,
    /// Rendered read-only.
    pub readonly: bool,
    /// Rendered disabled.
    pub disabled: bool,
    /// Not rendered.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,
    /// Minimum numeric value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Maximum numeric value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Numeric step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    /// Minimum text length.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    /// Maximum text length.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    /// Textarea rows.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<u32>,
    /// Initial value for new records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    /// Select option source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<SelectOptions>,
    /// Validation directives copied from the schema (informational).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<Value>,
    /// Nested UI directives.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui: Option<UiHints>,
    /// Autofill directive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autofill: Option<AutofillConfig>,
    /// Auto-calculate directive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_calculate: Option<AutoCalculateConfig>,
}

impl FormField {
    /// Creates a field with the given name and type.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            ..Self::default()
        }
    }

    /// Returns `true` for the conventional surrogate key field.
    pub fn is_id(&self) -> bool {
        is_id_column(&self.name)
    }

    /// Hidden either directly or through `ui.hidden`.
    pub fn is_hidden(&self) -> bool {
        self.hidden
            || self.field_type == FieldType::Hidden
            || self.ui.as_ref().is_some_and(|ui| ui.hidden)
    }

    /// Read-only through `ui.readonly`.
    pub fn is_ui_readonly(&self) -> bool {
        self.ui.as_ref().is_some_and(|ui| ui.readonly)
    }

    /// Localized label, falling back to the field name.
    pub fn label_text(&self, language: &str, default_language: &str) -> String {
        self.label
            .resolve(language, default_language)
            .unwrap_or(&self.name)
            .to_string()
    }
}

/// Returns `true` for the conventional surrogate key column (`id`/`ID`).
pub fn is_id_column(name: &str) -> bool {
    name.eq_ignore_ascii_case("id")
}

// ============================================================================
// List columns
// ============================================================================

/// How list cells are formatted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnFormat {
    /// `✓` / `✗`.
    Boolean,
    /// Fixed decimal places.
    Decimal,
    /// Calendar date.
    Date,
    /// Date and time.
    Datetime,
    /// Unrecognised format; values are shown as-is.
    #[serde(other)]
    Plain,
}

/// Foreign-key display directive of a list column.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnForeignKey {
    /// Referenced table.
    pub table: String,
    /// Column shown instead of the raw value.
    #[serde(default = "default_name_column")]
    pub display_column: String,
    /// Column of the referenced table matched against the cell value.
    #[serde(default = "default_id")]
    pub value_column: String,
}

/// A list column descriptor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListColumn {
    /// Column name.
    pub name: String,
    /// Column header.
    pub label: LocalizedText,
    /// SQL data type.
    #[serde(rename = "type")]
    pub column_type: String,
    /// Header can be clicked to sort.
    pub sortable: bool,
    /// Included in search.
    pub searchable: bool,
    /// CSS width.
    pub width: String,
    /// Cell alignment.
    pub align: String,
    /// Cell format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<ColumnFormat>,
    /// Decimal places for `decimal` format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decimal_places: Option<u32>,
    /// Foreign-key display directive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ColumnForeignKey>,
}

impl Default for ListColumn {
    fn default() -> Self {
        Self {
            name: String::new(),
            label: LocalizedText::default(),
            column_type: String::new(),
            sortable: false,
            searchable: false,
            width: "auto".to_string(),
            align: "left".to_string(),
            format: None,
            decimal_places: None,
            foreign_key: None,
        }
    }
}

impl ListColumn {
    /// Creates a column with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Localized header, falling back to the column name.
    pub fn label_text(&self, language: &str, default_language: &str) -> String {
        self.label
            .resolve(language, default_language)
            .unwrap_or(&self.name)
            .to_string()
    }
}

// ============================================================================
// Validation config
// ============================================================================

/// The `validation-config.json` document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationConfig {
    /// Schema version of the document.
    pub version: String,
    /// Generation timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated: Option<String>,
    /// Per-table rules.
    pub tables: BTreeMap<String, TableValidation>,
}

impl ValidationConfig {
    /// Parses a `validation-config.json` document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Rules for a table, if it has any.
    pub fn table(&self, name: &str) -> Option<&TableValidation> {
        self.tables.get(name)
    }
}

/// Validation rules of one table.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableValidation {
    /// Table name.
    pub name: String,
    /// Rules keyed by field name.
    pub fields: BTreeMap<String, FieldValidation>,
    /// Cross-field rules (not interpreted client-side).
    pub rules: Vec<Value>,
}

/// Rule list of one field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldValidation {
    /// Field name.
    pub name: String,
    /// Rules, checked in order.
    pub rules: Vec<ValidationRule>,
    /// Validate while typing.
    pub realtime: bool,
}

impl Default for FieldValidation {
    fn default() -> Self {
        Self {
            name: String::new(),
            rules: Vec::new(),
            realtime: true,
        }
    }
}

/// Kind of a validation rule.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RuleKind {
    /// Value must not be empty.
    Required,
    /// Minimum character count.
    MinLength,
    /// Maximum character count.
    MaxLength,
    /// Minimum numeric value.
    Min,
    /// Maximum numeric value.
    Max,
    /// Regular expression.
    Pattern,
    /// Uniqueness, enforced by the backend.
    Unique,
    /// Unrecognised rule name.
    Other(String),
}

impl RuleKind {
    /// Wire name of the rule.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Required => "required",
            Self::MinLength => "minLength",
            Self::MaxLength => "maxLength",
            Self::Min => "min",
            Self::Max => "max",
            Self::Pattern => "pattern",
            Self::Unique => "unique",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for RuleKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "required" => Self::Required,
            "minLength" => Self::MinLength,
            "maxLength" => Self::MaxLength,
            "min" => Self::Min,
            "max" => Self::Max,
            "pattern" => Self::Pattern,
            "unique" => Self::Unique,
            _ => Self::Other(s),
        }
    }
}

impl From<RuleKind> for String {
    fn from(k: RuleKind) -> Self {
        k.as_str().to_string()
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One validation rule.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    /// Rule kind.
    #[serde(rename = "type")]
    pub kind: RuleKind,
    /// Rule parameter (length, bound, pattern).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Message key or literal message.
    #[serde(default)]
    pub message: String,
}

impl ValidationRule {
    /// Creates a rule.
    pub fn new(kind: RuleKind, value: Option<Value>, message: impl Into<String>) -> Self {
        Self {
            kind,
            value,
            message: message.into(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> TableConfig {
        serde_json::from_value(json!({
            "version": "1.0.0",
            "project": { "name": "Shop", "defaultLanguage": "ja" },
            "tables": {
                "products": {
                    "name": "products",
                    "metadata": { "labels": { "ja": "商品", "en": "Products" }, "sortOrder": 2 },
                    "formFields": [
                        { "name": "id", "type": "number", "label": { "ja": "ID" }, "readonly": true },
                        { "name": "category_id", "type": "select",
                          "options": { "type": "foreign_key", "table": "categories",
                                       "valueColumn": "id", "displayColumn": "name", "allowNull": true } },
                        { "name": "note", "type": "rich-text", "ui": { "hidden": true } }
                    ],
                    "listColumns": [
                        { "name": "price", "type": "DECIMAL", "format": "decimal", "decimalPlaces": 1 },
                        { "name": "odd", "format": "sparkline" }
                    ]
                },
                "order_details": {
                    "name": "order_details",
                    "metadata": { "sortOrder": 1 },
                    "primaryKey": { "type": "composite", "columns": ["order_id", "product_id"] }
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_localized_text_fallback() {
        let text = LocalizedText::from_pairs([("ja", "名前"), ("en", "")]);
        assert_eq!(text.resolve("en", "ja"), Some("名前"));
        assert_eq!(text.resolve("ja", "en"), Some("名前"));
        assert_eq!(text.resolve("fr", "de"), None);
    }

    #[test]
    fn test_table_lookup_and_not_found() {
        let config = sample();
        assert!(config.table("products").is_ok());
        let err = config.table("missing").unwrap_err();
        assert_eq!(err.to_string(), "table not found: missing");
    }

    #[test]
    fn test_display_order_uses_sort_order() {
        let config = sample();
        let names: Vec<&str> = config
            .tables_in_display_order()
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(names, vec!["order_details", "products"]);
    }

    #[test]
    fn test_field_types_and_unknown_type() {
        let config = sample();
        let products = config.table("products").unwrap();
        assert_eq!(products.form_fields[0].field_type, FieldType::Number);
        assert_eq!(
            products.form_fields[2].field_type,
            FieldType::Other("rich-text".into())
        );
        assert!(products.form_fields[2].is_hidden());
        assert!(products.form_fields[0].is_id());
    }

    #[test]
    fn test_select_options_foreign_table() {
        let config = sample();
        let field = config.table("products").unwrap().form_field("category_id").unwrap();
        let options = field.options.as_ref().unwrap();
        assert_eq!(options.foreign_table(), Some("categories"));
        assert!(options.allow_null);
        assert_eq!(SelectOptions::default().foreign_table(), None);
    }

    #[test]
    fn test_list_column_defaults_and_unknown_format() {
        let config = sample();
        let products = config.table("products").unwrap();
        let price = products.list_column("price").unwrap();
        assert_eq!(price.format, Some(ColumnFormat::Decimal));
        assert_eq!(price.decimal_places, Some(1));
        assert_eq!(price.width, "auto");
        assert_eq!(
            products.list_column("odd").unwrap().format,
            Some(ColumnFormat::Plain)
        );
    }

    #[test]
    fn test_primary_key_defaults_and_composite() {
        let config = sample();
        let products = config.table("products").unwrap();
        assert_eq!(products.primary_key().columns(), vec!["id"]);
        assert!(!products.primary_key().is_composite());

        let details = config.table("order_details").unwrap();
        let key = details.primary_key();
        assert!(key.is_composite());
        assert_eq!(key.columns(), vec!["order_id", "product_id"]);
    }

    #[test]
    fn test_table_label_fallback() {
        let config = sample();
        assert_eq!(config.table("products").unwrap().label("en", "ja"), "Products");
        assert_eq!(
            config.table("order_details").unwrap().label("en", "ja"),
            "order_details"
        );
    }

    #[test]
    fn test_autofill_mapping_aliases() {
        let autofill: AutofillConfig = serde_json::from_value(json!({
            "sourceTable": "products",
            "mappings": [ { "from": "price", "to": "unit_price" } ]
        }))
        .unwrap();
        assert!(autofill.enabled);
        assert_eq!(autofill.source_column, "id");
        assert_eq!(autofill.mappings[0].source, "price");
        assert_eq!(autofill.mappings[0].target, "unit_price");
    }

    #[test]
    fn test_validation_rule_kinds() {
        let config: ValidationConfig = serde_json::from_value(json!({
            "tables": { "users": { "name": "users", "fields": {
                "email": { "name": "email", "rules": [
                    { "type": "required", "message": "validation.required" },
                    { "type": "maxLength", "value": 100, "message": "validation.max.length" },
                    { "type": "luhn", "message": "x" }
                ] }
            } } }
        }))
        .unwrap();
        let rules = &config.table("users").unwrap().fields["email"].rules;
        assert_eq!(rules[0].kind, RuleKind::Required);
        assert_eq!(rules[1].kind, RuleKind::MaxLength);
        assert_eq!(rules[1].value, Some(json!(100)));
        assert_eq!(rules[2].kind, RuleKind::Other("luhn".into()));
        assert!(config.table("users").unwrap().fields["email"].realtime);
        assert!(config.table("orders").is_none());
    }

    #[test]
    fn test_field_type_serializes_wire_name() {
        let field = FormField::new("when", FieldType::DateTimeLocal);
        let value = serde_json::to_value(&field).unwrap();
        assert_eq!(value["type"], "datetime-local");
    }
}
