//! Tablecraft Client: async HTTP access to the Tablecraft backend.
//!
//! [`TablecraftClient`] implements both [`RecordSource`](tablecraft_core::RecordSource)
//! and [`ConfigSource`](tablecraft_core::ConfigSource), so the engine can
//! run against a live backend unchanged.
//!
//! # Example
//!
//! ```rust,no_run
//! use tablecraft_client::{ClientConfig, TablecraftClient};
//!
//! # async fn example() -> tablecraft_client::Result<()> {
//! let client = TablecraftClient::new(ClientConfig::new("http://localhost:8082"))?;
//! let rows = client.find_all_records("products").await?;
//! println!("{} products", rows.len());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;

pub use client::{ClientConfig, DEFAULT_BASE_URL, TablecraftClient};
pub use error::{Error, Result};
