//! # feature-query
//!
//! Table-config driven CRUD query generation.
//!
//! A [`TableConfig`] describes how one table may be used: which columns are
//! accepted on create and update, which columns identify a record, which
//! column names its owner and which columns queries return. From it,
//! [`StandardQueryBuilder`] derives the standard CRUD queries and
//! [`FeatureQueryBuilder`] composes them with custom queries into a
//! [`QueryMap`] of named async functions.
//!
//! ## Features
//!
//! - **Typestate table configs**: by-id queries only exist for configs with an identifier set
//! - **Ownership scoping**: the owner column is injected on create and required on every lookup
//! - **Soft delete**: removal flips an activity column unless the store is configured for hard delete
//! - **Default filters and paging**: per-feature default filters, ordering and page size
//! - **Error labelling**: custom query failures carry their operation label and database errors are classified
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use feature_query::{
//!     ColumnDefinition, ColumnType, FeatureQueryBuilder, PgTableOperations, StandardQueryConfig,
//!     StoreConfig, TableConfig, TableDefinition,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let table = TableDefinition::new(
//!         "tag",
//!         vec![
//!             ColumnDefinition::new("id", ColumnType::Uuid).primary_key().default_uuid(),
//!             ColumnDefinition::new("user_id", ColumnType::String).not_null(),
//!             ColumnDefinition::new("name", ColumnType::String).not_null(),
//!             ColumnDefinition::new("is_active", ColumnType::Boolean).not_null().default_value(true),
//!         ],
//!     )?;
//!
//!     let config = TableConfig::builder(table.clone())
//!         .set_ids(&["id"])?
//!         .set_user_id("user_id")?
//!         .restrict_update_fields(&["name"])?
//!         .enable_pagination()
//!         .build();
//!
//!     let store = StoreConfig::builder("postgres://localhost/mydb").build();
//!     let operations = Arc::new(PgTableOperations::connect(&store, table).await?);
//!
//!     let queries = FeatureQueryBuilder::new("tag", config, operations)
//!         .register_all_standard(StandardQueryConfig::builder().active_only().build())?
//!         .into_queries();
//!
//!     let tag = queries
//!         .call("create", serde_json::json!({"data": {"name": "urgent"}, "userId": "u1"}))
//!         .await?;
//!     let page = queries
//!         .call("getMany", serde_json::json!({"userId": "u1", "pagination": {"page": 1, "pageSize": 10}}))
//!         .await?;
//!     println!("{tag} {page}");
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! Backend behavior is configured using `StoreConfig`:
//!
//! ```rust
//! use feature_query::StoreConfig;
//!
//! let config = StoreConfig::builder("postgres://localhost/mydb")
//!     .max_connections(10)
//!     .soft_delete_column("is_active") // Default removal column
//!     .touch_updated_at(true)          // Refresh updated_at on update (default)
//!     .build();
//! ```

pub mod config;
pub mod error;
pub mod identifier;
pub mod operations;
pub mod query;
pub mod shape;
pub mod sql;
pub mod table;
pub mod types;

// Re-export main types for convenience
pub use config::{
    DEFAULT_PAGE_SIZE, GetManyConfig, RemovalPolicy, StandardQueryConfig,
    StandardQueryConfigBuilder, StoreConfig, StoreConfigBuilder,
};
pub use error::{QueryError, Result, ValidationIssue};
pub use identifier::{IdSource, Identifier, build_identifiers};
pub use operations::{
    CreateManyRecords, CreateRecord, Filter, FilterOp, GetFirstRecord, GetManyRecords,
    MemoryTableOperations, OrderBy, Pagination, PgTableOperations, RemoveRecord, SortDirection,
    TableOperations, UpdateRecord,
};
pub use query::{
    FeatureQueryBuilder, OperationSchema, QueryContext, QueryDefinition, QueryFn, QueryFuture,
    QueryMap, StandardQueryBuilder,
};
pub use shape::{FieldRule, Shape};
pub use table::{KeyState, Keyed, TableConfig, TableConfigBuilder, Unkeyed};
pub use types::{ColumnDefault, ColumnDefinition, ColumnType, Row, TableDefinition};

// Re-export SQL utilities for advanced users
pub use sql::condition::{build_order_by_clause, build_where_clause};
pub use sql::sanitize::{quote_identifier, validate_identifier};
