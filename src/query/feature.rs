//! Feature query builder
//!
//! Composes the query set of one feature: standard CRUD queries, custom
//! queries and the operation schemas those custom queries may consult.
//!
//! ```
//! use std::sync::Arc;
//!
//! use feature_query::{
//!     ColumnDefinition, ColumnType, FeatureQueryBuilder, MemoryTableOperations,
//!     StandardQueryConfig, TableConfig, TableDefinition,
//! };
//!
//! # fn main() -> feature_query::Result<()> {
//! let table = TableDefinition::new(
//!     "tag",
//!     vec![
//!         ColumnDefinition::new("id", ColumnType::Uuid).primary_key().default_uuid(),
//!         ColumnDefinition::new("user_id", ColumnType::String).not_null(),
//!         ColumnDefinition::new("name", ColumnType::String).not_null(),
//!     ],
//! )?;
//! let config = TableConfig::builder(table.clone())
//!     .set_ids(&["id"])?
//!     .set_user_id("user_id")?
//!     .build();
//!
//! let feature = FeatureQueryBuilder::new("tag", config, Arc::new(MemoryTableOperations::new(table)))
//!     .register_all_standard(StandardQueryConfig::default())?
//!     .add_query("countHint", |_: serde_json::Value| async { Ok(42) })
//!     .pick(&["create", "getById", "countHint"])?;
//!
//! assert_eq!(feature.queries().keys(), vec!["countHint", "create", "getById"]);
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::handler::wrap_query;
use super::standard::StandardQueryBuilder;
use super::{QueryFn, QueryFuture, QueryMap, parse_input};
use crate::config::StandardQueryConfig;
use crate::error::{QueryError, Result};
use crate::operations::TableOperations;
use crate::shape::Shape;
use crate::table::{KeyState, TableConfig, Unkeyed};

/// Shapes describing one operation's input at different layers
///
/// Registered schemas have no effect on query execution; custom queries can
/// read them from their [`QueryContext`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OperationSchema {
    /// Input accepted by the query function
    pub query: Option<Shape>,
    /// Input accepted by the service layer calling the query
    pub service: Option<Shape>,
}

impl OperationSchema {
    pub fn query(shape: Shape) -> Self {
        Self {
            query: Some(shape),
            service: None,
        }
    }

    pub fn with_service(mut self, shape: Shape) -> Self {
        self.service = Some(shape);
        self
    }
}

/// What a custom query can reach when it is defined
pub struct QueryContext<K = Unkeyed> {
    pub operations: Arc<dyn TableOperations>,
    pub table_config: Arc<TableConfig<K>>,
    pub schemas: Arc<BTreeMap<String, OperationSchema>>,
}

/// A custom query and its optional operation label
pub struct QueryDefinition {
    query: QueryFn,
    operation: Option<String>,
}

impl QueryDefinition {
    /// Define a query from a typed async function
    ///
    /// Input that does not deserialize into `I` is reported as a validation
    /// error before `f` runs.
    pub fn new<I, O, F, Fut>(f: F) -> Self
    where
        I: DeserializeOwned + Send + 'static,
        O: Serialize + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O>> + Send + 'static,
    {
        let f = Arc::new(f);
        let query: QueryFn = Arc::new(move |input: Value| -> QueryFuture {
            let f = f.clone();
            Box::pin(async move {
                let input: I = parse_input("custom query", input)?;
                let output = f(input).await?;
                Ok(serde_json::to_value(output)?)
            })
        });
        Self {
            query,
            operation: None,
        }
    }

    /// Use an untyped query function as is
    pub fn raw(query: QueryFn) -> Self {
        Self {
            query,
            operation: None,
        }
    }

    /// Label used when reporting failures (default: `"<key> operation"`)
    pub fn operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }
}

/// Builder for the queries of one feature
///
/// Every method consumes the builder and returns the extended one.
pub struct FeatureQueryBuilder<K = Unkeyed> {
    name: String,
    config: Arc<TableConfig<K>>,
    operations: Arc<dyn TableOperations>,
    schemas: BTreeMap<String, OperationSchema>,
    queries: QueryMap,
}

impl<K: KeyState> std::fmt::Debug for FeatureQueryBuilder<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureQueryBuilder")
            .field("name", &self.name)
            .field("table", &self.config.table_name())
            .field("schemas", &self.schemas.keys().collect::<Vec<_>>())
            .field("queries", &self.queries)
            .finish()
    }
}

impl<K: KeyState> FeatureQueryBuilder<K> {
    pub fn new(
        name: impl Into<String>,
        config: TableConfig<K>,
        operations: Arc<dyn TableOperations>,
    ) -> Self {
        Self {
            name: name.into(),
            config: Arc::new(config),
            operations,
            schemas: BTreeMap::new(),
            queries: QueryMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table_config(&self) -> &Arc<TableConfig<K>> {
        &self.config
    }

    pub fn schemas(&self) -> &BTreeMap<String, OperationSchema> {
        &self.schemas
    }

    /// Merge operation schemas; later registrations replace earlier ones
    pub fn register_schema<S>(mut self, schemas: impl IntoIterator<Item = (S, OperationSchema)>) -> Self
    where
        S: Into<String>,
    {
        self.schemas
            .extend(schemas.into_iter().map(|(k, v)| (k.into(), v)));
        self
    }

    /// Add a custom query from a typed async function
    ///
    /// Failures are labelled `"<key> operation"`.
    pub fn add_query<I, O, F, Fut>(self, key: impl Into<String>, f: F) -> Self
    where
        I: DeserializeOwned + Send + 'static,
        O: Serialize + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O>> + Send + 'static,
    {
        self.insert_custom(key.into(), QueryDefinition::new(f))
    }

    /// Add a custom query defined with access to the table operations,
    /// the table config and the registered schemas
    pub fn add_query_with<F>(self, key: impl Into<String>, define: F) -> Self
    where
        F: FnOnce(QueryContext<K>) -> QueryDefinition,
    {
        let definition = define(QueryContext {
            operations: self.operations.clone(),
            table_config: self.config.clone(),
            schemas: Arc::new(self.schemas.clone()),
        });
        self.insert_custom(key.into(), definition)
    }

    fn insert_custom(mut self, key: String, definition: QueryDefinition) -> Self {
        let operation = definition
            .operation
            .unwrap_or_else(|| format!("{} operation", key));
        debug!(feature = %self.name, query = %key, operation = %operation, "Registered custom query");
        self.queries.insert(key, wrap_query(operation, definition.query));
        self
    }

    /// Add standard queries chosen by `select`, using the default query config
    pub fn with_standard<F>(self, select: F) -> Result<Self>
    where
        F: FnOnce(StandardQueryBuilder<K>) -> StandardQueryBuilder<K>,
    {
        self.with_standard_config(StandardQueryConfig::default(), select)
    }

    /// Add standard queries chosen by `select`
    pub fn with_standard_config<F>(mut self, query_config: StandardQueryConfig, select: F) -> Result<Self>
    where
        F: FnOnce(StandardQueryBuilder<K>) -> StandardQueryBuilder<K>,
    {
        let builder =
            StandardQueryBuilder::new(self.config.clone(), self.operations.clone(), query_config)?;
        let standard = select(builder).done();
        debug!(feature = %self.name, queries = ?standard.keys(), "Registered standard queries");
        self.queries.extend(standard);
        Ok(self)
    }

    /// Add every standard query the table config supports
    pub fn register_all_standard(self, query_config: StandardQueryConfig) -> Result<Self> {
        self.with_standard_config(query_config, StandardQueryBuilder::all)
    }

    /// Keep only the named queries
    pub fn pick(mut self, keys: &[&str]) -> Result<Self> {
        let mut picked = QueryMap::new();
        for key in keys {
            let query = self.queries.get(key).ok_or_else(|| {
                QueryError::config(format!(
                    "Cannot pick unknown query '{}' from feature '{}'",
                    key, self.name
                ))
            })?;
            picked.insert(*key, query.clone());
        }
        self.queries = picked;
        Ok(self)
    }

    pub fn queries(&self) -> &QueryMap {
        &self.queries
    }

    pub fn into_queries(self) -> QueryMap {
        self.queries
    }
}
