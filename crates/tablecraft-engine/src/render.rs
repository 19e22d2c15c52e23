//! Field rendering.
//!
//! Turns a [`FormField`] plus the current values into a [`Widget`]: a
//! presentation-neutral description of an input that a terminal, web, or
//! GUI front end can draw.

use crate::lookup::{LookupSet, SelectOption};
use serde::Serialize;
use serde_json::{Number, Value};
use tablecraft_core::model::{FieldType, FormField};
use tablecraft_core::record::{display_string, lookup};
use tablecraft_core::{Error, Result};

/// Label of the empty select choice when none is configured.
pub const DEFAULT_NULL_LABEL: &str = "選択してください";

/// Default height of textarea widgets.
pub const DEFAULT_TEXTAREA_ROWS: u32 = 4;

/// Whether a form creates a new record or edits an existing one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FormMode {
    /// New record.
    Create,
    /// Existing record.
    Edit,
}

/// Language choice and lookups available while rendering.
#[derive(Clone, Copy, Debug)]
pub struct RenderContext<'a> {
    /// Preferred language.
    pub language: &'a str,
    /// Fallback language.
    pub default_language: &'a str,
    /// Foreign rows for select options.
    pub lookups: &'a LookupSet,
}

/// Input-specific widget settings.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WidgetKind {
    /// Single-line input (`text`, `email`, `tel`).
    Text {
        /// HTML-style input type.
        input_type: String,
        /// Character limit.
        max_length: Option<u64>,
    },
    /// Multi-line input.
    Textarea {
        /// Visible rows.
        rows: u32,
        /// Character limit.
        max_length: Option<u64>,
    },
    /// Numeric input.
    Number {
        /// Lower bound.
        min: Option<f64>,
        /// Upper bound.
        max: Option<f64>,
        /// Increment.
        step: Option<f64>,
    },
    /// Calendar date.
    Date,
    /// Date and time.
    DateTime,
    /// Boolean checkbox.
    Checkbox,
    /// Choice from a list.
    Select {
        /// Available choices.
        options: Vec<SelectOption>,
        /// Label of the empty choice, when one is offered.
        null_option: Option<String>,
    },
}

/// A rendered form field.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Widget {
    /// Field name.
    pub name: String,
    /// Localized label.
    pub label: String,
    /// Localized placeholder.
    pub placeholder: Option<String>,
    /// Current value.
    pub value: Value,
    /// Marked as required.
    pub required: bool,
    /// Not editable.
    pub disabled: bool,
    /// Short type and range description.
    pub hint: Option<String>,
    /// Input settings.
    pub kind: WidgetKind,
}

/// Renders a field, or `None` when it is not shown in this mode.
pub fn render_field(
    field: &FormField,
    values: &tablecraft_core::Record,
    mode: FormMode,
    ctx: &RenderContext<'_>,
) -> Option<Widget> {
    if (mode == FormMode::Create && field.is_id()) || field.is_hidden() {
        return None;
    }

    let value = match lookup(values, &field.name) {
        Some(v) => v.clone(),
        None if field.field_type == FieldType::Checkbox => Value::Bool(false),
        None => Value::String(String::new()),
    };

    Some(Widget {
        name: field.name.clone(),
        label: field.label_text(ctx.language, ctx.default_language),
        placeholder: field
            .placeholder
            .resolve(ctx.language, ctx.default_language)
            .map(str::to_string),
        value,
        required: field.required,
        disabled: field.disabled || field.readonly || field.is_ui_readonly(),
        hint: hint(field),
        kind: widget_kind(field, ctx),
    })
}

fn widget_kind(field: &FormField, ctx: &RenderContext<'_>) -> WidgetKind {
    match &field.field_type {
        FieldType::Textarea => WidgetKind::Textarea {
            rows: field.rows.unwrap_or(DEFAULT_TEXTAREA_ROWS),
            max_length: field.max_length,
        },
        FieldType::Number => WidgetKind::Number {
            min: field.min,
            max: field.max,
            step: field.step,
        },
        FieldType::Date => WidgetKind::Date,
        FieldType::DateTimeLocal => WidgetKind::DateTime,
        FieldType::Checkbox => WidgetKind::Checkbox,
        FieldType::Select => {
            let null_option = field
                .options
                .as_ref()
                .filter(|o| o.allow_null)
                .map(|o| {
                    o.null_label
                        .resolve(ctx.language, ctx.default_language)
                        .unwrap_or(DEFAULT_NULL_LABEL)
                        .to_string()
                });
            WidgetKind::Select {
                options: ctx
                    .lookups
                    .select_options(field, ctx.language, ctx.default_language),
                null_option,
            }
        }
        FieldType::Email | FieldType::Tel => WidgetKind::Text {
            input_type: field.field_type.as_str().to_string(),
            max_length: field.max_length,
        },
        FieldType::Text | FieldType::Hidden | FieldType::Other(_) => WidgetKind::Text {
            input_type: "text".to_string(),
            max_length: field.max_length,
        },
    }
}

/// Type name with `(max N)` and `(min–max)` decorations.
///
/// Only fields carrying validation metadata get a hint.
pub fn hint(field: &FormField) -> Option<String> {
    if field.validation.is_none() {
        return None;
    }
    let mut text = field.field_type.as_str().to_string();
    if let Some(max) = field.max_length {
        text.push_str(&format!(" (max {max})"));
    }
    if let (Some(min), Some(max)) = (field.min, field.max) {
        text.push_str(&format!(
            " ({}–{})",
            display_string(&json_number(min)),
            display_string(&json_number(max))
        ));
    }
    Some(text)
}

fn json_number(n: f64) -> Value {
    Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
}

/// Converts raw text input into the field's JSON value.
///
/// - number: blank → null, otherwise a JSON number
/// - checkbox: `true`/`1`/`on`/`yes` (any case) → true
/// - select: coerced to the JSON type of the matching option value
/// - anything else: the string as typed
pub fn parse_input(field: &FormField, raw: &str, ctx: &RenderContext<'_>) -> Result<Value> {
    match field.field_type {
        FieldType::Number => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(Value::Null);
            }
            if let Ok(i) = trimmed.parse::<i64>() {
                return Ok(Value::from(i));
            }
            trimmed
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| {
                    Error::validation_field(&field.name, format!("'{raw}' is not a number"))
                })
        }
        FieldType::Checkbox => Ok(Value::Bool(matches!(
            raw.trim().to_lowercase().as_str(),
            "true" | "1" | "on" | "yes"
        ))),
        FieldType::Select => {
            if raw.is_empty() {
                return Ok(Value::Null);
            }
            let options = ctx
                .lookups
                .select_options(field, ctx.language, ctx.default_language);
            Ok(options
                .into_iter()
                .map(|o| o.value)
                .find(|v| display_string(v) == raw)
                .unwrap_or_else(|| Value::String(raw.to_string())))
        }
        _ => Ok(Value::String(raw.to_string())),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use tablecraft_core::Record;
    use tablecraft_core::model::{LocalizedText, SelectOptions, UiHints};
    use tablecraft_core::record::as_record;

    fn ctx(lookups: &LookupSet) -> RenderContext<'_> {
        RenderContext {
            language: "en",
            default_language: "ja",
            lookups,
        }
    }

    fn record(value: Value) -> Record {
        as_record(value).unwrap()
    }

    fn category_select() -> FormField {
        let mut field = FormField::new("category_id", FieldType::Select);
        let mut options = SelectOptions::foreign_key("categories", "id", "name");
        options.allow_null = true;
        field.options = Some(options);
        field
    }

    fn lookups() -> LookupSet {
        LookupSet::new().with_rows(
            "categories",
            vec![
                record(json!({"ID": 1, "NAME": "Books"})),
                record(json!({"ID": 2, "NAME": "Music"})),
            ],
        )
    }

    #[test]
    fn test_id_hidden_on_create_only() {
        let set = LookupSet::new();
        let field = FormField::new("id", FieldType::Number);
        let values = record(json!({"ID": 5}));
        assert!(render_field(&field, &values, FormMode::Create, &ctx(&set)).is_none());
        let widget = render_field(&field, &values, FormMode::Edit, &ctx(&set)).unwrap();
        assert_eq!(widget.value, json!(5));
    }

    #[test]
    fn test_ui_hidden_skipped() {
        let set = LookupSet::new();
        let mut field = FormField::new("secret", FieldType::Text);
        field.ui = Some(UiHints {
            hidden: true,
            ..UiHints::default()
        });
        assert!(render_field(&field, &Record::new(), FormMode::Edit, &ctx(&set)).is_none());
    }

    #[test]
    fn test_default_values_by_type() {
        let set = LookupSet::new();
        let check = FormField::new("active", FieldType::Checkbox);
        let text = FormField::new("name", FieldType::Text);
        let empty = Record::new();
        assert_eq!(
            render_field(&check, &empty, FormMode::Create, &ctx(&set)).unwrap().value,
            json!(false)
        );
        assert_eq!(
            render_field(&text, &empty, FormMode::Create, &ctx(&set)).unwrap().value,
            json!("")
        );
    }

    #[test]
    fn test_label_fallback_and_disabled() {
        let set = LookupSet::new();
        let mut field = FormField::new("name", FieldType::Text);
        field.label = LocalizedText::from_pairs([("ja", "名前")]);
        field.ui = Some(UiHints {
            readonly: true,
            ..UiHints::default()
        });
        let widget = render_field(&field, &Record::new(), FormMode::Edit, &ctx(&set)).unwrap();
        assert_eq!(widget.label, "名前");
        assert!(widget.disabled);

        let bare = FormField::new("code", FieldType::Text);
        let widget = render_field(&bare, &Record::new(), FormMode::Edit, &ctx(&set)).unwrap();
        assert_eq!(widget.label, "code");
        assert!(!widget.disabled);
    }

    #[test]
    fn test_textarea_default_rows() {
        let set = LookupSet::new();
        let field = FormField::new("note", FieldType::Textarea);
        let widget = render_field(&field, &Record::new(), FormMode::Create, &ctx(&set)).unwrap();
        assert_eq!(
            widget.kind,
            WidgetKind::Textarea {
                rows: 4,
                max_length: None
            }
        );
    }

    #[test]
    fn test_select_with_null_option() {
        let set = lookups();
        let widget =
            render_field(&category_select(), &Record::new(), FormMode::Create, &ctx(&set)).unwrap();
        let WidgetKind::Select {
            options,
            null_option,
        } = widget.kind
        else {
            unreachable!("Expected select widget");
        };
        assert_eq!(options.len(), 2);
        assert_eq!(null_option.as_deref(), Some(DEFAULT_NULL_LABEL));
    }

    #[test]
    fn test_unknown_type_renders_text() {
        let set = LookupSet::new();
        let field = FormField::new("color", FieldType::Other("color".into()));
        let widget = render_field(&field, &Record::new(), FormMode::Create, &ctx(&set)).unwrap();
        assert_eq!(
            widget.kind,
            WidgetKind::Text {
                input_type: "text".into(),
                max_length: None
            }
        );
    }

    #[test]
    fn test_hint_decorations() {
        let mut field = FormField::new("qty", FieldType::Number);
        assert_eq!(hint(&field), None);
        field.validation = Some(json!({"min": 1, "max": 99}));
        field.min = Some(1.0);
        field.max = Some(99.0);
        assert_eq!(hint(&field).as_deref(), Some("number (1–99)"));

        let mut name = FormField::new("name", FieldType::Text);
        name.validation = Some(json!({"maxLength": 50}));
        name.max_length = Some(50);
        assert_eq!(hint(&name).as_deref(), Some("text (max 50)"));
    }

    #[test]
    fn test_parse_number_input() {
        let set = LookupSet::new();
        let field = FormField::new("qty", FieldType::Number);
        assert_eq!(parse_input(&field, " ", &ctx(&set)).unwrap(), Value::Null);
        assert_eq!(parse_input(&field, "12", &ctx(&set)).unwrap(), json!(12));
        assert_eq!(parse_input(&field, "1.25", &ctx(&set)).unwrap(), json!(1.25));
        assert!(parse_input(&field, "twelve", &ctx(&set)).is_err());
    }

    #[test]
    fn test_parse_checkbox_input() {
        let set = LookupSet::new();
        let field = FormField::new("active", FieldType::Checkbox);
        for raw in ["true", "1", "ON", "yes"] {
            assert_eq!(parse_input(&field, raw, &ctx(&set)).unwrap(), json!(true));
        }
        assert_eq!(parse_input(&field, "no", &ctx(&set)).unwrap(), json!(false));
    }

    #[test]
    fn test_parse_select_input_coerces_to_option_type() {
        let set = lookups();
        let field = category_select();
        assert_eq!(parse_input(&field, "2", &ctx(&set)).unwrap(), json!(2));
        assert_eq!(parse_input(&field, "", &ctx(&set)).unwrap(), Value::Null);
        assert_eq!(parse_input(&field, "9", &ctx(&set)).unwrap(), json!("9"));
    }
}
