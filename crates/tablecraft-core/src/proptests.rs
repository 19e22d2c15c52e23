//! Property-based tests for record helpers and message catalogs.
