//! Tablecraft Engine: the config interpreter behind dynamic CRUD screens.
//!
//! Reads table, validation, and message configuration and drives forms and
//! lists from it without any table-specific code.
//!
//! # Modules
//!
//! - [`loader`]: Cached configuration loading, directory-backed source
//! - [`render`]: Form field → widget descriptors, raw input parsing
//! - [`lookup`]: Foreign-key rows, select options, display values
//! - [`derive`]: Formula language, autofill and auto-calculate propagation
//! - [`validate`]: Rule evaluation with localized messages
//! - [`form`]: Create/edit form sessions
//! - [`submit`]: Submission and delete payload shaping
//! - [`list`]: Search, sort, and cell formatting
//! - [`generate`]: Configuration generation from schema metadata

pub mod derive;
pub mod form;
pub mod generate;
pub mod list;
pub mod loader;
pub mod lookup;
pub mod render;
pub mod submit;
pub mod validate;

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;

mod proptests;

pub use derive::{ChangeSet, DeriveEngine, Formula};
pub use form::FormSession;
pub use list::ListView;
pub use loader::{ConfigStore, FileConfigSource, LoadedConfig};
pub use lookup::LookupSet;
pub use render::{FormMode, RenderContext, Widget, WidgetKind};
pub use submit::{DeleteRequest, Submission};
pub use validate::{ValidationReport, Validator, Violation};
