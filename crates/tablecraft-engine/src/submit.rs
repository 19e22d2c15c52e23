//! Submission payload shaping.
//!
//! A validated form becomes a [`Submission`]: the payload restricted to
//! configured form fields, plus the record key for updates. Deletes are
//! shaped the same way through [`delete_request`].

use serde_json::Value;
use tablecraft_core::model::TableDefinition;
use tablecraft_core::record::lookup;
use tablecraft_core::{Record, RecordKey, RecordSource, Result};

/// A create or update ready to send.
#[derive(Clone, Debug, PartialEq)]
pub enum Submission {
    /// Insert a new record.
    Create {
        /// Target table.
        table: String,
        /// Column values.
        data: Record,
    },
    /// Modify an existing record.
    Update {
        /// Target table.
        table: String,
        /// Key of the record being edited.
        key: RecordKey,
        /// Column values.
        data: Record,
    },
}

impl Submission {
    /// Target table.
    pub fn table(&self) -> &str {
        match self {
            Self::Create { table, .. } | Self::Update { table, .. } => table,
        }
    }

    /// Payload columns.
    pub fn data(&self) -> &Record {
        match self {
            Self::Create { data, .. } | Self::Update { data, .. } => data,
        }
    }

    /// Sends the submission; returns what the backend reports.
    pub async fn execute(&self, source: &dyn RecordSource) -> Result<Value> {
        match self {
            Self::Create { table, data } => {
                log::info!("creating record in '{table}'");
                source.create(table, data.clone()).await
            }
            Self::Update { table, key, data } => {
                log::info!("updating '{table}' record {key}");
                source.update(table, key, data.clone()).await
            }
        }
    }
}

/// Form values restricted to the table's form fields.
///
/// Fields absent from `values` are left out, and so is the `id` column.
pub fn build_payload(definition: &TableDefinition, values: &Record) -> Record {
    definition
        .form_fields
        .iter()
        .filter(|field| !field.is_id())
        .filter_map(|field| {
            lookup(values, &field.name).map(|value| (field.name.clone(), value.clone()))
        })
        .collect()
}

/// A delete ready to send.
#[derive(Clone, Debug, PartialEq)]
pub struct DeleteRequest {
    /// Target table.
    pub table: String,
    /// Key of the record to delete.
    pub key: RecordKey,
}

impl DeleteRequest {
    /// Sends the delete; returns whether a record was removed.
    pub async fn execute(&self, source: &dyn RecordSource) -> Result<bool> {
        log::info!("deleting '{}' record {}", self.table, self.key);
        source.delete(&self.table, &self.key).await
    }
}

/// Delete request for a listed record.
pub fn delete_request(definition: &TableDefinition, record: &Record) -> Result<DeleteRequest> {
    Ok(DeleteRequest {
        table: definition.name.clone(),
        key: RecordKey::from_record(record, &definition.primary_key())?,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::memory::MemorySource;
    use serde_json::json;
    use tablecraft_core::Error;
    use tablecraft_core::record::as_record;

    fn products() -> TableDefinition {
        serde_json::from_value(json!({
            "name": "products",
            "formFields": [
                { "name": "id", "type": "number" },
                { "name": "name" },
                { "name": "price", "type": "number" }
            ]
        }))
        .unwrap()
    }

    fn order_details() -> TableDefinition {
        serde_json::from_value(json!({
            "name": "order_details",
            "primaryKey": { "type": "composite", "columns": ["order_id", "product_id"] },
            "formFields": [
                { "name": "order_id", "type": "number" },
                { "name": "product_id", "type": "number" },
                { "name": "quantity", "type": "number" }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_payload_keeps_only_form_fields_without_id() {
        let values = as_record(json!({
            "id": 3, "NAME": "Pen", "price": 120, "created_at": "2024-01-01"
        }))
        .unwrap();
        let payload = build_payload(&products(), &values);
        assert_eq!(payload, as_record(json!({"name": "Pen", "price": 120})).unwrap());
    }

    #[test]
    fn test_payload_skips_absent_fields() {
        let values = as_record(json!({"name": "Pen"})).unwrap();
        let payload = build_payload(&products(), &values);
        assert_eq!(payload.len(), 1);
    }

    #[test]
    fn test_delete_request_composite_key() {
        let record = as_record(json!({"ORDER_ID": 1, "PRODUCT_ID": 7, "QUANTITY": 2})).unwrap();
        let request = delete_request(&order_details(), &record).unwrap();
        assert_eq!(
            request.key,
            RecordKey::Composite(as_record(json!({"order_id": 1, "product_id": 7})).unwrap())
        );
    }

    #[test]
    fn test_delete_request_missing_key() {
        let record = as_record(json!({"name": "Pen"})).unwrap();
        let err = delete_request(&products(), &record).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[tokio::test]
    async fn test_execute_against_memory_source() {
        let source = MemorySource::new();
        source
            .insert_rows("products", vec![as_record(json!({"id": 1, "name": "Pen"})).unwrap()])
            .await;

        let create = Submission::Create {
            table: "products".into(),
            data: as_record(json!({"name": "Ink"})).unwrap(),
        };
        assert_eq!(create.table(), "products");
        let created = create.execute(&source).await.unwrap();
        assert_eq!(created["id"], json!(2));

        let update = Submission::Update {
            table: "products".into(),
            key: RecordKey::id(1),
            data: as_record(json!({"name": "Pencil"})).unwrap(),
        };
        update.execute(&source).await.unwrap();
        let rows = source.rows("products").await;
        assert_eq!(rows[0]["name"], json!("Pencil"));

        let delete = delete_request(&products(), &rows[1]).unwrap();
        assert!(delete.execute(&source).await.unwrap());
        assert_eq!(source.rows("products").await.len(), 1);
    }
}
