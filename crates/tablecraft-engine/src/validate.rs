//! Validation runner.
//!
//! Applies the rule lists of `validation-config.json` to form values and
//! collects every violation, with messages resolved through the message
//! catalog.

use crate::render::FormMode;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use tablecraft_core::model::{
    RuleKind, TableDefinition, TableValidation, ValidationRule, is_id_column,
};
use tablecraft_core::record::{as_number, display_string, is_blank, lookup};
use tablecraft_core::{Error, MessageCatalog, Record, Result};

/// Built-in pattern for `pattern: email`.
pub const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";
/// Built-in pattern for `pattern: phone`.
pub const PHONE_PATTERN: &str = r"^[\d\-\(\)\+\s]+$";
/// Built-in pattern for `pattern: url`.
pub const URL_PATTERN: &str = r"^https?://[^\s]+$";

/// Expands the `email`, `phone`, and `url` aliases.
pub fn expand_pattern(pattern: &str) -> &str {
    match pattern {
        "email" => EMAIL_PATTERN,
        "phone" => PHONE_PATTERN,
        "url" => URL_PATTERN,
        other => other,
    }
}

/// One failed rule.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Violation {
    /// Field that failed.
    pub field: String,
    /// Rule that failed.
    pub rule: RuleKind,
    /// Resolved message.
    pub message: String,
}

/// Every violation found in a record.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    violations: Vec<Violation>,
}

impl ValidationReport {
    /// Returns `true` if nothing failed.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// All violations in evaluation order.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Violations of one field.
    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a Violation> + 'a {
        self.violations.iter().filter(move |v| v.field == field)
    }

    /// `"<field>: <message>"` for the first violation.
    pub fn first_error(&self) -> Option<String> {
        self.violations
            .first()
            .map(|v| format!("{}: {}", v.field, v.message))
    }

    /// Converts a failed report into a validation error.
    pub fn into_result(self) -> Result<()> {
        match self.violations.first() {
            None => Ok(()),
            Some(first) => Err(Error::validation_field(
                first.field.clone(),
                format!("{}: {}", first.field, first.message),
            )),
        }
    }
}

/// Rule checker for one table.
///
/// Pattern rules are compiled when the validator is built, so an invalid
/// regular expression surfaces as a configuration error up front.
pub struct Validator<'a> {
    table: &'a TableDefinition,
    rules: Option<&'a TableValidation>,
    messages: &'a MessageCatalog,
    patterns: HashMap<String, Regex>,
}

impl<'a> Validator<'a> {
    /// Builds a validator; `rules` is `None` for tables without validation.
    pub fn new(
        table: &'a TableDefinition,
        rules: Option<&'a TableValidation>,
        messages: &'a MessageCatalog,
    ) -> Result<Self> {
        let mut patterns = HashMap::new();
        for (field, validation) in rules.iter().flat_map(|r| &r.fields) {
            for rule in validation.rules.iter().filter(|r| r.kind == RuleKind::Pattern) {
                let Some(pattern) = rule.value.as_ref().and_then(Value::as_str) else {
                    continue;
                };
                let expanded = expand_pattern(pattern);
                let regex = Regex::new(expanded).map_err(|e| {
                    Error::config(format!(
                        "invalid pattern for '{}.{field}': {e}",
                        table.name
                    ))
                })?;
                patterns.insert(pattern.to_string(), regex);
            }
        }
        Ok(Self {
            table,
            rules,
            messages,
            patterns,
        })
    }

    /// Validates every field: form order first, then the remaining
    /// validated fields by name.
    pub fn validate_record(&self, values: &Record, mode: FormMode) -> ValidationReport {
        let Some(rules) = self.rules else {
            return ValidationReport::default();
        };

        let mut order: Vec<&str> = self
            .table
            .form_fields
            .iter()
            .map(|f| f.name.as_str())
            .filter(|name| rules.fields.contains_key(*name))
            .collect();
        for name in rules.fields.keys() {
            if !order.contains(&name.as_str()) {
                order.push(name);
            }
        }

        let violations = order
            .into_iter()
            .flat_map(|name| self.validate_field(name, values, mode))
            .collect();
        ValidationReport { violations }
    }

    /// Validates one field against its rules.
    pub fn validate_field(&self, name: &str, values: &Record, mode: FormMode) -> Vec<Violation> {
        let Some(validation) = self.rules.and_then(|r| r.fields.get(name)) else {
            return Vec::new();
        };
        if self.skipped(name, mode) {
            return Vec::new();
        }

        let value = lookup(values, name);
        validation
            .rules
            .iter()
            .filter(|rule| !self.passes(rule, value))
            .map(|rule| Violation {
                field: name.to_string(),
                rule: rule.kind.clone(),
                message: self.message(rule),
            })
            .collect()
    }

    fn skipped(&self, name: &str, mode: FormMode) -> bool {
        if mode == FormMode::Create && is_id_column(name) {
            return true;
        }
        match self.table.form_field(name) {
            Some(field) if field.is_hidden() => true,
            Some(field) => mode == FormMode::Create && (field.readonly || field.is_ui_readonly()),
            None => false,
        }
    }

    fn passes(&self, rule: &ValidationRule, value: Option<&Value>) -> bool {
        let blank = is_blank(value);
        if rule.kind == RuleKind::Required {
            return !blank;
        }
        let Some(value) = value.filter(|_| !blank) else {
            return true;
        };
        let bound = rule.value.as_ref().and_then(as_number);

        match &rule.kind {
            RuleKind::MinLength => bound.is_none_or(|min| char_count(value) as f64 >= min),
            RuleKind::MaxLength => bound.is_none_or(|max| char_count(value) as f64 <= max),
            RuleKind::Min => bound.is_none_or(|min| as_number(value).is_some_and(|n| n >= min)),
            RuleKind::Max => bound.is_none_or(|max| as_number(value).is_some_and(|n| n <= max)),
            RuleKind::Pattern => rule
                .value
                .as_ref()
                .and_then(Value::as_str)
                .and_then(|p| self.patterns.get(p))
                .is_none_or(|re| re.is_match(&display_string(value))),
            RuleKind::Required | RuleKind::Unique | RuleKind::Other(_) => true,
        }
    }

    fn message(&self, rule: &ValidationRule) -> String {
        let key = if rule.message.is_empty() {
            default_message_key(rule)
        } else {
            rule.message.clone()
        };
        let params: Vec<String> = rule.value.iter().map(display_string).collect();
        self.messages.resolve(&key, &params)
    }
}

fn char_count(value: &Value) -> usize {
    display_string(value).chars().count()
}

/// Message key used when a rule names none.
pub fn default_message_key(rule: &ValidationRule) -> String {
    match &rule.kind {
        RuleKind::Required => "validation.required".to_string(),
        RuleKind::MinLength => "validation.min.length".to_string(),
        RuleKind::MaxLength => "validation.max.length".to_string(),
        RuleKind::Min => "validation.min.value".to_string(),
        RuleKind::Max => "validation.max.value".to_string(),
        RuleKind::Unique => "validation.unique".to_string(),
        RuleKind::Pattern => match rule.value.as_ref().and_then(Value::as_str) {
            Some(alias @ ("email" | "phone" | "url")) => format!("validation.pattern.{alias}"),
            _ => "validation.pattern.invalid".to_string(),
        },
        RuleKind::Other(name) => format!("validation.{name}"),
    }
}
