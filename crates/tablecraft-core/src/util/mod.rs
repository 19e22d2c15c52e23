//! Utility modules.
//!
//! - [`names`]: table and column name conversions

pub mod names;
