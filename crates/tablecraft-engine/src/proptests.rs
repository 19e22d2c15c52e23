//! Property-based tests for formulas, list ordering, and the memory source.
