//! Tablecraft Core: configuration model, records, errors, and source traits.
//!
//! This crate provides the foundational types shared by every Tablecraft
//! crate. It has no internal Tablecraft dependencies.
//!
//! # Modules
//!
//! - [`error`]: Error types and Result alias
//! - [`model`]: Table, form, list, and validation configuration
//! - [`messages`]: Localized message catalogs
//! - [`record`]: Row access helpers and record keys
//! - [`traits`]: Record, config, and settings sources
//! - [`util`]: Name helpers

pub mod error;
pub mod messages;
pub mod model;
pub mod record;
pub mod traits;
pub mod util;

mod proptests;

// Re-export key types at crate root for convenience
pub use error::{Error, Result};
pub use messages::MessageCatalog;
pub use model::{
    FieldType, FormField, ListColumn, LocalizedText, PrimaryKey, TableConfig, TableDefinition,
    ValidationConfig,
};
pub use record::{Record, RecordKey};
pub use traits::{ConfigManager, ConfigSource, RecordSource};
