//! SQL utilities for the PostgreSQL table operations
//!
//! Provides clause generation and identifier sanitization.

pub mod condition;
pub mod sanitize;

pub use condition::{SqlParam, build_limit_clause, build_order_by_clause, build_where_clause};
pub use sanitize::{POSTGRES_RESERVED_WORDS, quote_identifier, validate_identifier};
