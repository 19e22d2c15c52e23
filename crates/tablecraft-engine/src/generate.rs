//! Config generation from schema metadata.
//!
//! Turns a schema metadata document (project settings plus per-table column
//! definitions with constraints, labels, UI and validation directives) into
//! the `table-config.json`, `validation-config.json`, and message catalog
//! files read by [`FileConfigSource`](crate::loader::FileConfigSource).
//!
//! Metadata is enriched before generation: missing labels become the
//! title-cased name, input types are inferred from column names and SQL
//! types, and non-nullable columns become required.

use crate::derive::DeriveEngine;
use crate::loader::{TABLE_CONFIG_FILE, VALIDATION_CONFIG_FILE};
use crate::validate::expand_pattern;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tablecraft_core::model::{
    AutoCalculateConfig, AutofillConfig, ColumnConfig, ColumnForeignKey, ColumnFormat,
    FieldType, FieldValidation, FormField, ListColumn, LocalizedText, PrimaryKey,
    ProjectSettings, RuleKind, SelectOptions, TableDefinition, TableMetadata, TableValidation,
    UiHints, ValidationRule,
};
use tablecraft_core::util::names::title_case;
use tablecraft_core::{Error, MessageCatalog, Result, TableConfig, ValidationConfig};

/// Version stamped into generated documents.
pub const CONFIG_VERSION: &str = "1.0.0";

/// Default project name for metadata without one.
pub const DEFAULT_PROJECT_NAME: &str = "Generated CRUD System";

// ============================================================================
// Metadata document
// ============================================================================

/// Project section of the metadata document.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectMetadata {
    /// Project name.
    pub name: String,
    /// Default language.
    pub default_language: String,
    /// Supported languages.
    pub supported_languages: Vec<String>,
}

impl Default for ProjectMetadata {
    fn default() -> Self {
        Self {
            name: DEFAULT_PROJECT_NAME.to_string(),
            default_language: "ja".to_string(),
            supported_languages: vec!["ja".to_string(), "en".to_string()],
        }
    }
}

/// Schema metadata document.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct SchemaMetadata {
    /// Project settings.
    pub project: ProjectMetadata,
    /// Tables in declaration order.
    pub tables: Map<String, Value>,
}

impl SchemaMetadata {
    /// Parses a metadata document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a metadata document from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::io_with_path(e, path))?;
        Self::from_json(&text)
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct TableSchema {
    metadata: TableMetadataSchema,
    columns: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct TableMetadataSchema {
    icon: String,
    color: String,
    sort_order: i64,
    category: String,
    labels: LocalizedText,
    description: LocalizedText,
}

impl Default for TableMetadataSchema {
    fn default() -> Self {
        let defaults = TableMetadata::default();
        Self {
            icon: defaults.icon,
            color: defaults.color,
            sort_order: defaults.sort_order,
            category: defaults.category,
            labels: LocalizedText::default(),
            description: LocalizedText::default(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ColumnSchema {
    #[serde(rename = "type")]
    sql_type: String,
    constraints: Constraints,
    labels: LocalizedText,
    ui: UiSchema,
    validation: ValidationSchema,
    foreign_key: Option<ForeignKeySchema>,
    autofill: Option<AutofillConfig>,
    auto_calculate: Option<AutoCalculateConfig>,
    scale: Option<u32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Constraints {
    nullable: bool,
    primary_key: bool,
    unique: bool,
    auto_increment: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    default: Option<Value>,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            nullable: true,
            primary_key: false,
            unique: false,
            auto_increment: false,
            default: None,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct UiSchema {
    hidden: bool,
    readonly: bool,
    disabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    input_type: Option<String>,
    #[serde(skip_serializing_if = "LocalizedText::is_empty")]
    placeholder: LocalizedText,
    #[serde(skip_serializing_if = "Option::is_none")]
    step: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rows: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    allow_null: Option<bool>,
    #[serde(skip_serializing_if = "LocalizedText::is_empty")]
    null_label: LocalizedText,
    #[serde(skip_serializing_if = "Option::is_none")]
    width: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    align: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ValidationSchema {
    #[serde(skip_serializing_if = "Option::is_none")]
    required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    min_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    realtime: Option<bool>,
}

impl ValidationSchema {
    fn is_empty(&self) -> bool {
        self.required.is_none()
            && self.min_length.is_none()
            && self.max_length.is_none()
            && self.min.is_none()
            && self.max.is_none()
            && self.pattern.is_none()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForeignKeySchema {
    table: String,
    #[serde(default = "default_id")]
    column: String,
    #[serde(default = "default_name")]
    display_column: String,
}

fn default_id() -> String {
    "id".to_string()
}

fn default_name() -> String {
    "name".to_string()
}

// ============================================================================
// Generation
// ============================================================================

/// Generated configuration documents.
#[derive(Clone, Debug)]
pub struct GeneratedConfig {
    /// `table-config.json` contents.
    pub tables: TableConfig,
    /// `validation-config.json` contents.
    pub validation: ValidationConfig,
    /// Message catalogs keyed by language.
    pub messages: BTreeMap<String, MessageCatalog>,
}

impl GeneratedConfig {
    /// Writes every document into `dir`, creating it if needed.
    ///
    /// Returns the written paths.
    pub fn write_to(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| Error::io_with_path(e, dir))?;

        let mut written = Vec::new();
        let mut write = |name: &str, content: String| -> Result<()> {
            let path = dir.join(name);
            std::fs::write(&path, content).map_err(|e| Error::io_with_path(e, &path))?;
            log::info!("wrote {}", path.display());
            written.push(path);
            Ok(())
        };

        write(TABLE_CONFIG_FILE, serde_json::to_string_pretty(&self.tables)?)?;
        write(
            VALIDATION_CONFIG_FILE,
            serde_json::to_string_pretty(&self.validation)?,
        )?;
        let default_language = &self.tables.project.default_language;
        for (language, catalog) in &self.messages {
            let text = to_properties(&self.tables.project.name, language, catalog);
            if language == default_language {
                write("messages.properties", text.clone())?;
            }
            write(&format!("messages_{language}.properties"), text)?;
        }
        Ok(written)
    }
}

/// Generates configuration from schema metadata.
///
/// Every generated table is checked by the derive engine.
pub fn generate(metadata: &SchemaMetadata) -> Result<GeneratedConfig> {
    let generated = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let project = ProjectSettings {
        name: metadata.project.name.clone(),
        default_language: metadata.project.default_language.clone(),
        supported_languages: metadata.project.supported_languages.clone(),
    };
    let default_language = project.default_language.clone();

    let mut tables = BTreeMap::new();
    let mut validation = BTreeMap::new();

    for (name, raw) in &metadata.tables {
        let schema: TableSchema = serde_json::from_value(raw.clone())
            .map_err(|e| Error::config(format!("invalid metadata for table '{name}': {e}")))?;
        let columns = parse_columns(name, &schema, &default_language)?;

        let definition = table_definition(name, &schema, &columns, &default_language);
        DeriveEngine::new(&definition)?;
        validation.insert(name.clone(), table_validation(name, &columns));
        tables.insert(name.clone(), definition);
    }

    let messages = project
        .supported_languages
        .iter()
        .map(|language| {
            (
                language.clone(),
                message_catalog(language, &default_language, &tables),
            )
        })
        .collect();

    log::info!("generated configuration for {} tables", tables.len());
    Ok(GeneratedConfig {
        tables: TableConfig {
            version: CONFIG_VERSION.to_string(),
            generated: Some(generated.clone()),
            project,
            tables,
        },
        validation: ValidationConfig {
            version: CONFIG_VERSION.to_string(),
            generated: Some(generated),
            tables: validation,
        },
        messages,
    })
}

fn parse_columns(
    table: &str,
    schema: &TableSchema,
    default_language: &str,
) -> Result<Vec<(String, ColumnSchema)>> {
    schema
        .columns
        .iter()
        .map(|(name, raw)| {
            let mut column: ColumnSchema = serde_json::from_value(raw.clone()).map_err(|e| {
                Error::config(format!("invalid metadata for column '{table}.{name}': {e}"))
            })?;
            enrich_column(name, &mut column, default_language);
            Ok((name.clone(), column))
        })
        .collect()
}

fn enrich_column(name: &str, column: &mut ColumnSchema, default_language: &str) {
    if column.sql_type.is_empty() {
        column.sql_type = "VARCHAR".to_string();
    }
    if !column.labels.contains(default_language) {
        column.labels.insert(default_language, title_case(name));
    }
    if column.ui.input_type.is_none() {
        column.ui.input_type = Some(infer_input_type(name, column));
    }
    if !column.constraints.nullable {
        column.validation.required = Some(true);
    }
}

/// Input type from the column name, then the SQL type.
fn infer_input_type(name: &str, column: &ColumnSchema) -> String {
    let lower = name.to_lowercase();
    let by_name = [
        ("email", "email"),
        ("phone", "tel"),
        ("tel", "tel"),
        ("url", "url"),
        ("website", "url"),
        ("password", "password"),
        ("date", "date"),
        ("time", "datetime-local"),
    ];
    if let Some((_, input)) = by_name.iter().find(|(part, _)| lower.contains(part)) {
        return input.to_string();
    }
    if column.foreign_key.is_some() {
        return "select".to_string();
    }

    let sql = column.sql_type.to_uppercase();
    let input = if sql.contains("DATETIME") || sql.contains("TIMESTAMP") {
        "datetime-local"
    } else if sql.contains("INT") || sql.contains("DECIMAL") || sql.contains("FLOAT") {
        "number"
    } else if sql.contains("BOOL") {
        "checkbox"
    } else if sql.contains("TEXT") {
        "textarea"
    } else if sql.contains("DATE") {
        "date"
    } else {
        "text"
    };
    input.to_string()
}

fn is_searchable(sql_type: &str) -> bool {
    let sql = sql_type.to_uppercase();
    ["VARCHAR", "TEXT", "CHAR", "INT", "DECIMAL", "FLOAT"]
        .iter()
        .any(|t| sql.contains(t))
}

fn is_sortable(sql_type: &str) -> bool {
    let sql = sql_type.to_uppercase();
    !(sql.contains("TEXT") || sql.contains("BLOB"))
}

fn table_definition(
    name: &str,
    schema: &TableSchema,
    columns: &[(String, ColumnSchema)],
    default_language: &str,
) -> TableDefinition {
    let meta = &schema.metadata;
    let mut labels = meta.labels.clone();
    if !labels.contains(default_language) {
        labels.insert(default_language, title_case(name));
    }

    let key_columns: Vec<&str> = columns
        .iter()
        .filter(|(_, c)| c.constraints.primary_key)
        .map(|(n, _)| n.as_str())
        .collect();
    let primary_key = match key_columns.as_slice() {
        [] => None,
        [single] => Some(PrimaryKey::single(*single)),
        many => Some(PrimaryKey::composite(many.iter().copied())),
    };

    let visible = || columns.iter().filter(|(_, c)| !c.ui.hidden);
    TableDefinition {
        name: name.to_string(),
        metadata: TableMetadata {
            icon: meta.icon.clone(),
            color: meta.color.clone(),
            sort_order: meta.sort_order,
            category: meta.category.clone(),
            labels,
            description: meta.description.clone(),
        },
        primary_key,
        columns: columns.iter().map(|(n, c)| column_config(n, c)).collect(),
        form_fields: visible().map(|(n, c)| form_field(n, c)).collect(),
        list_columns: visible().map(|(n, c)| list_column(n, c)).collect(),
        searchable_columns: columns
            .iter()
            .filter(|(_, c)| is_searchable(&c.sql_type))
            .map(|(n, _)| n.clone())
            .collect(),
        sortable_columns: columns
            .iter()
            .filter(|(_, c)| is_sortable(&c.sql_type))
            .map(|(n, _)| n.clone())
            .collect(),
    }
}

fn to_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn column_config(name: &str, column: &ColumnSchema) -> ColumnConfig {
    ColumnConfig {
        name: name.to_string(),
        sql_type: column.sql_type.clone(),
        constraints: to_value(&column.constraints),
        labels: column.labels.clone(),
        ui: to_value(&column.ui),
        validation: to_value(&column.validation),
        foreign_key: column.foreign_key.as_ref().map(to_value),
    }
}

fn form_field(name: &str, column: &ColumnSchema) -> FormField {
    let ui = &column.ui;
    let validation = &column.validation;
    let constraints = &column.constraints;
    let field_type = FieldType::from(ui.input_type.clone().unwrap_or_else(|| "text".into()));

    let mut field = FormField {
        name: name.to_string(),
        label: column.labels.clone(),
        placeholder: ui.placeholder.clone(),
        required: validation.required.unwrap_or(!constraints.nullable),
        readonly: ui.readonly || constraints.auto_increment,
        disabled: ui.disabled,
        ..FormField::new(name, field_type.clone())
    };
    if ui.readonly {
        field.ui = Some(UiHints {
            readonly: true,
            ..UiHints::default()
        });
    }

    match &field_type {
        FieldType::Number => {
            field.min = validation.min;
            field.max = validation.max;
            field.step = ui.step;
        }
        FieldType::Text | FieldType::Textarea => {
            field.min_length = validation.min_length;
            field.max_length = validation.max_length;
            if field_type == FieldType::Textarea {
                field.rows = ui.rows;
            }
        }
        FieldType::Select => {
            if let Some(fk) = &column.foreign_key {
                let mut options =
                    SelectOptions::foreign_key(&fk.table, &fk.column, &fk.display_column);
                options.allow_null = ui.allow_null.unwrap_or(constraints.nullable);
                options.null_label = ui.null_label.clone();
                field.options = Some(options);
            }
        }
        FieldType::Checkbox => {
            field.default_value = Some(constraints.default.clone().unwrap_or(Value::Bool(false)));
        }
        _ => {}
    }

    if !validation.is_empty() {
        field.validation = Some(to_value(validation));
    }
    field.autofill = column.autofill.clone();
    field.auto_calculate = column.auto_calculate.clone();
    field
}

fn list_column(name: &str, column: &ColumnSchema) -> ListColumn {
    let sql = column.sql_type.to_uppercase();
    let format = if sql.contains("DATETIME") || sql.contains("TIMESTAMP") {
        Some(ColumnFormat::Datetime)
    } else if sql.contains("DATE") {
        Some(ColumnFormat::Date)
    } else if sql.contains("DECIMAL") || sql.contains("FLOAT") {
        Some(ColumnFormat::Decimal)
    } else if sql.contains("BOOLEAN") {
        Some(ColumnFormat::Boolean)
    } else {
        None
    };

    ListColumn {
        name: name.to_string(),
        label: column.labels.clone(),
        column_type: column.sql_type.clone(),
        sortable: is_sortable(&column.sql_type),
        searchable: is_searchable(&column.sql_type),
        width: column.ui.width.clone().unwrap_or_else(|| "auto".into()),
        align: column.ui.align.clone().unwrap_or_else(|| "left".into()),
        decimal_places: if format == Some(ColumnFormat::Decimal) {
            column.scale
        } else {
            None
        },
        format,
        foreign_key: column.foreign_key.as_ref().map(|fk| ColumnForeignKey {
            table: fk.table.clone(),
            display_column: fk.display_column.clone(),
            value_column: fk.column.clone(),
        }),
    }
}

fn table_validation(name: &str, columns: &[(String, ColumnSchema)]) -> TableValidation {
    let fields = columns
        .iter()
        .filter(|(_, c)| !c.ui.hidden)
        .filter_map(|(column_name, column)| {
            let rules = field_rules(column);
            (!rules.is_empty()).then(|| {
                (
                    column_name.clone(),
                    FieldValidation {
                        name: column_name.clone(),
                        rules,
                        realtime: column.validation.realtime.unwrap_or(true),
                    },
                )
            })
        })
        .collect();
    TableValidation {
        name: name.to_string(),
        fields,
        rules: Vec::new(),
    }
}

fn field_rules(column: &ColumnSchema) -> Vec<ValidationRule> {
    let v = &column.validation;
    let mut rules = Vec::new();
    if v.required == Some(true) || !column.constraints.nullable {
        rules.push(ValidationRule::new(RuleKind::Required, None, "validation.required"));
    }
    if let Some(n) = v.min_length {
        rules.push(ValidationRule::new(
            RuleKind::MinLength,
            Some(Value::from(n)),
            "validation.min.length",
        ));
    }
    if let Some(n) = v.max_length {
        rules.push(ValidationRule::new(
            RuleKind::MaxLength,
            Some(Value::from(n)),
            "validation.max.length",
        ));
    }
    if let Some(n) = v.min {
        rules.push(ValidationRule::new(
            RuleKind::Min,
            Some(to_value(&n)),
            "validation.min.value",
        ));
    }
    if let Some(n) = v.max {
        rules.push(ValidationRule::new(
            RuleKind::Max,
            Some(to_value(&n)),
            "validation.max.value",
        ));
    }
    if let Some(pattern) = &v.pattern {
        let key = match pattern.as_str() {
            alias @ ("email" | "phone" | "url") => format!("validation.pattern.{alias}"),
            _ => "validation.pattern.invalid".to_string(),
        };
        rules.push(ValidationRule::new(
            RuleKind::Pattern,
            Some(Value::String(expand_pattern(pattern).to_string())),
            key,
        ));
    }
    if column.constraints.unique {
        rules.push(ValidationRule::new(RuleKind::Unique, None, "validation.unique"));
    }
    rules
}

// ============================================================================
// Message catalogs
// ============================================================================

const VALIDATION_MESSAGES_JA: &[(&str, &str)] = &[
    ("validation.required", "この項目は必須です"),
    ("validation.min.length", "最低{0}文字以上入力してください"),
    ("validation.max.length", "{0}文字以内で入力してください"),
    ("validation.min.value", "{0}以上の値を入力してください"),
    ("validation.max.value", "{0}以下の値を入力してください"),
    ("validation.pattern.email", "有効なメールアドレスを入力してください"),
    ("validation.pattern.phone", "有効な電話番号を入力してください"),
    ("validation.pattern.url", "有効なURLを入力してください"),
    ("validation.pattern.invalid", "入力形式が正しくありません"),
    ("validation.unique", "この値は既に使用されています"),
];

const VALIDATION_MESSAGES_EN: &[(&str, &str)] = &[
    ("validation.required", "This field is required"),
    ("validation.min.length", "Please enter at least {0} characters"),
    ("validation.max.length", "Please enter no more than {0} characters"),
    ("validation.min.value", "Please enter a value of {0} or greater"),
    ("validation.max.value", "Please enter a value of {0} or less"),
    ("validation.pattern.email", "Please enter a valid email address"),
    ("validation.pattern.phone", "Please enter a valid phone number"),
    ("validation.pattern.url", "Please enter a valid URL"),
    ("validation.pattern.invalid", "Please enter a value in the correct format"),
    ("validation.unique", "This value is already in use"),
];

fn message_catalog(
    language: &str,
    default_language: &str,
    tables: &BTreeMap<String, TableDefinition>,
) -> MessageCatalog {
    let mut catalog = MessageCatalog::new();
    let builtin = if language == "ja" {
        VALIDATION_MESSAGES_JA
    } else {
        VALIDATION_MESSAGES_EN
    };
    for (key, text) in builtin {
        catalog.insert(*key, *text);
    }
    for (name, table) in tables {
        catalog.insert(
            format!("table.{name}.label"),
            table.label(language, default_language),
        );
        if let Some(description) = table.description(language, default_language) {
            catalog.insert(format!("table.{name}.description"), description);
        }
        for column in &table.columns {
            let label = column
                .labels
                .resolve(language, default_language)
                .map(str::to_string)
                .unwrap_or_else(|| title_case(&column.name));
            catalog.insert(format!("table.{name}.column.{}.label", column.name), label);
        }
    }
    catalog
}

fn to_properties(project: &str, language: &str, catalog: &MessageCatalog) -> String {
    let mut lines = vec![
        format!("# {project} - {} Messages", language.to_uppercase()),
        String::new(),
    ];
    for (key, text) in catalog.iter() {
        lines.push(format!("{key}={}", escape_property(text)));
    }
    lines.push(String::new());
    lines.join("\n")
}

fn escape_property(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}
