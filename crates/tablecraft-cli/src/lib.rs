//! # tablecraft-cli
//!
//! Operator CLI for Tablecraft configuration-driven CRUD screens.
//!
//! - Browse tables and their list views
//! - Render create/edit forms
//! - Validate, submit, and delete records
//! - Generate configuration from schema metadata
//! - Manage the CLI settings file

#![warn(clippy::all)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod config_handlers;
pub mod error;

pub use commands::App;
pub use config::TablecraftConfig;
pub use error::{Error, Result};
