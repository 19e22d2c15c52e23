//! Form sessions.
//!
//! A [`FormSession`] holds the values of one create or edit form. Every
//! change goes through the table's [`DeriveEngine`], so autofill and
//! auto-calculated fields stay current, and [`FormSession::submit`] turns
//! the validated values into a [`Submission`].
//!
//! # Example
//!
//! ```rust,ignore
//! let config = store.load().await?;
//! let mut form = FormSession::open_create(config, source.as_ref(), "order_details").await?;
//! form.set_input("product_id", "3")?;   // autofills unit_price
//! form.set_input("quantity", "2")?;     // recomputes subtotal
//! form.submit()?.execute(source.as_ref()).await?;
//! ```

use crate::derive::{ChangeSet, DeriveEngine};
use crate::loader::LoadedConfig;
use crate::lookup::LookupSet;
use crate::render::{FormMode, Widget, parse_input, render_field};
use crate::submit::{Submission, build_payload};
use crate::validate::{ValidationReport, Violation};
use serde_json::Value;
use std::sync::Arc;
use tablecraft_core::model::{FieldType, FormField, TableDefinition};
use tablecraft_core::record::normalize_for_edit;
use tablecraft_core::{Error, Record, RecordKey, RecordSource, Result};

/// Values of one open form.
#[derive(Debug)]
pub struct FormSession {
    config: Arc<LoadedConfig>,
    definition: TableDefinition,
    engine: Arc<DeriveEngine>,
    lookups: LookupSet,
    mode: FormMode,
    key: Option<RecordKey>,
    values: Record,
}

impl FormSession {
    /// A create form; checkbox defaults are seeded.
    pub fn create(config: Arc<LoadedConfig>, table: &str, lookups: LookupSet) -> Result<Self> {
        let definition = config.table(table)?.clone();
        let engine = config.engine(table)?;
        let values = definition
            .form_fields
            .iter()
            .filter(|f| f.field_type == FieldType::Checkbox)
            .filter_map(|f| f.default_value.clone().map(|v| (f.name.clone(), v)))
            .collect();

        log::debug!("opened create form for '{table}'");
        Ok(Self {
            config,
            definition,
            engine,
            lookups,
            mode: FormMode::Create,
            key: None,
            values,
        })
    }

    /// An edit form over an existing record.
    ///
    /// The record's key is captured before editing starts, and every
    /// formula is re-evaluated.
    pub fn edit(
        config: Arc<LoadedConfig>,
        table: &str,
        record: &Record,
        lookups: LookupSet,
    ) -> Result<Self> {
        let definition = config.table(table)?.clone();
        let engine = config.engine(table)?;
        let key = RecordKey::from_record(record, &definition.primary_key())?;
        let mut values = normalize_for_edit(record);

        let recomputed = engine.recompute_all(&values);
        recomputed.apply_to(&mut values);
        for error in &recomputed.errors {
            log::warn!("'{table}.{}': {}", error.field, error.message);
        }

        log::debug!("opened edit form for '{table}' record {key}");
        Ok(Self {
            config,
            definition,
            engine,
            lookups,
            mode: FormMode::Edit,
            key: Some(key),
            values,
        })
    }

    /// [`create`](Self::create) with lookups fetched from `source`.
    pub async fn open_create(
        config: Arc<LoadedConfig>,
        source: &dyn RecordSource,
        table: &str,
    ) -> Result<Self> {
        let lookups = LookupSet::load(source, config.table(table)?).await;
        Self::create(config, table, lookups)
    }

    /// [`edit`](Self::edit) with lookups fetched from `source`.
    pub async fn open_edit(
        config: Arc<LoadedConfig>,
        source: &dyn RecordSource,
        table: &str,
        record: &Record,
    ) -> Result<Self> {
        let lookups = LookupSet::load(source, config.table(table)?).await;
        Self::edit(config, table, record, lookups)
    }

    /// Table being edited.
    pub fn table(&self) -> &str {
        &self.definition.name
    }

    /// Create or edit.
    pub fn mode(&self) -> FormMode {
        self.mode
    }

    /// Key of the edited record.
    pub fn key(&self) -> Option<&RecordKey> {
        self.key.as_ref()
    }

    /// Current values.
    pub fn values(&self) -> &Record {
        &self.values
    }

    /// Foreign rows available to the form.
    pub fn lookups(&self) -> &LookupSet {
        &self.lookups
    }

    /// Visible widgets in form order.
    pub fn widgets(&self) -> Vec<Widget> {
        let ctx = self.config.render_context(&self.lookups);
        self.definition
            .form_fields
            .iter()
            .filter_map(|field| render_field(field, &self.values, self.mode, &ctx))
            .collect()
    }

    fn field(&self, name: &str) -> Result<&FormField> {
        self.definition
            .form_field(name)
            .ok_or_else(|| Error::not_found("field", format!("{}.{name}", self.table())))
    }

    /// Sets a field and propagates derived values.
    pub fn set_value(&mut self, field: &str, value: Value) -> Result<ChangeSet> {
        let name = self.field(field)?.name.clone();
        self.values.insert(name.clone(), value);

        let changes = self.engine.apply_change(&self.values, &name, &self.lookups);
        changes.apply_to(&mut self.values);
        if !changes.is_empty() {
            log::debug!("'{}.{name}' changed: derived {:?}", self.table(), changes.fields());
        }
        Ok(changes)
    }

    /// Parses raw input for a field, then [`set_value`](Self::set_value).
    pub fn set_input(&mut self, field: &str, raw: &str) -> Result<ChangeSet> {
        let value = {
            let ctx = self.config.render_context(&self.lookups);
            parse_input(self.field(field)?, raw, &ctx)?
        };
        self.set_value(field, value)
    }

    /// Checks every rule against the current values.
    pub fn validate(&self) -> Result<ValidationReport> {
        let validator = self.config.validator(self.table())?;
        Ok(validator.validate_record(&self.values, self.mode))
    }

    /// Checks one field's rules.
    pub fn validate_field(&self, field: &str) -> Result<Vec<Violation>> {
        let validator = self.config.validator(self.table())?;
        Ok(validator.validate_field(field, &self.values, self.mode))
    }

    /// Validates and shapes the submission.
    ///
    /// Fails with [`Error::Validation`] naming the first violation.
    pub fn submit(&self) -> Result<Submission> {
        self.validate()?.into_result()?;

        let table = self.table().to_string();
        let data = build_payload(&self.definition, &self.values);
        Ok(match &self.key {
            Some(key) if self.mode == FormMode::Edit => Submission::Update {
                table,
                key: key.clone(),
                data,
            },
            _ => Submission::Create { table, data },
        })
    }
}
