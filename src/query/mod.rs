//! Query functions and the builders that produce them
//!
//! A feature exposes its queries as a [`QueryMap`]: operation name to an
//! async function taking and returning JSON. Standard CRUD queries come from
//! [`StandardQueryBuilder`], bespoke ones are added through
//! [`FeatureQueryBuilder`].

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{QueryError, Result, ValidationIssue};
use crate::operations::{OrderBy, Pagination};

pub mod feature;
pub mod handler;
pub mod standard;

pub use feature::{FeatureQueryBuilder, OperationSchema, QueryContext, QueryDefinition};
pub use standard::StandardQueryBuilder;

/// Future returned by a query function
pub type QueryFuture = BoxFuture<'static, Result<Value>>;

/// A registered query: JSON input to JSON output
pub type QueryFn = Arc<dyn Fn(Value) -> QueryFuture + Send + Sync>;

/// Named query functions of one feature
#[derive(Clone, Default)]
pub struct QueryMap {
    queries: BTreeMap<String, QueryFn>,
}

impl std::fmt::Debug for QueryMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryMap")
            .field("queries", &self.keys())
            .finish()
    }
}

impl QueryMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a query, replacing any existing one with the same name
    pub fn insert(&mut self, name: impl Into<String>, query: QueryFn) {
        self.queries.insert(name.into(), query);
    }

    pub fn get(&self, name: &str) -> Option<&QueryFn> {
        self.queries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.queries.contains_key(name)
    }

    /// Registered names in sorted order
    pub fn keys(&self) -> Vec<&str> {
        self.queries.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// Copy every query of `other` into this map; `other` wins on conflicts
    pub fn extend(&mut self, other: QueryMap) {
        self.queries.extend(other.queries);
    }

    /// Run a query by name
    pub async fn call(&self, name: &str, input: Value) -> Result<Value> {
        let query = self
            .get(name)
            .ok_or_else(|| QueryError::config(format!("Unknown query '{}'", name)))?;
        query(input).await
    }
}

// ============================================================================
// Standard Query Inputs
// ============================================================================

/// Deserialize query input, reporting failures as validation errors
///
/// A null input is read as an empty object.
pub(crate) fn parse_input<T: DeserializeOwned>(operation: &str, input: Value) -> Result<T> {
    let input = if input.is_null() {
        Value::Object(Default::default())
    } else {
        input
    };
    serde_json::from_value(input).map_err(|e| {
        QueryError::validation(
            format!("{} input", operation),
            vec![ValidationIssue::new("", e.to_string())],
        )
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct CreateInput {
    pub data: Value,
    #[serde(default)]
    pub user_id: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct ByIdInput {
    #[serde(default)]
    pub ids: Option<Value>,
    #[serde(default)]
    pub user_id: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct UpdateByIdInput {
    #[serde(default)]
    pub ids: Option<Value>,
    pub data: Value,
    #[serde(default)]
    pub user_id: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct GetManyInput {
    #[serde(default)]
    pub user_id: Option<Value>,
    #[serde(default)]
    pub filters: Option<Value>,
    #[serde(default)]
    pub order_by: Option<Vec<OrderBy>>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo() -> QueryFn {
        Arc::new(|input: Value| -> QueryFuture { Box::pin(async move { Ok(input) }) })
    }

    #[tokio::test]
    async fn test_call_by_name() {
        let mut map = QueryMap::new();
        map.insert("echo", echo());
        assert_eq!(map.call("echo", json!({"a": 1})).await.unwrap(), json!({"a": 1}));

        let err = map.call("missing", Value::Null).await.unwrap_err();
        assert!(matches!(err, QueryError::Config(_)));
    }

    #[test]
    fn test_keys_and_extend() {
        let mut a = QueryMap::new();
        a.insert("getById", echo());
        let mut b = QueryMap::new();
        b.insert("create", echo());
        b.insert("getById", echo());
        a.extend(b);
        assert_eq!(a.keys(), vec!["create", "getById"]);
        assert_eq!(a.len(), 2);
        assert!(format!("{:?}", a).contains("getById"));
    }

    #[test]
    fn test_parse_input_camel_case() {
        let input: GetManyInput = parse_input(
            "getMany",
            json!({"userId": "u1", "orderBy": [{"field": "name"}], "pagination": {"page": 2, "pageSize": 5}}),
        )
        .unwrap();
        assert_eq!(input.user_id, Some(json!("u1")));
        assert_eq!(input.order_by.unwrap(), vec![OrderBy::asc("name")]);
        assert_eq!(input.pagination, Some(Pagination::new(2, 5)));
    }

    #[test]
    fn test_parse_input_errors_are_validation() {
        let err = parse_input::<CreateInput>("create", json!({"userId": "u1"})).unwrap_err();
        assert!(matches!(err, QueryError::Validation { ref context, .. } if context == "create input"));

        let err = parse_input::<ByIdInput>("getById", json!({"ids": {}, "user": 1})).unwrap_err();
        assert!(err.to_string().contains("unknown field"));
    }

    #[test]
    fn test_parse_null_input_as_empty() {
        let input: GetManyInput = parse_input("getMany", Value::Null).unwrap();
        assert!(input.user_id.is_none());
        assert!(input.filters.is_none());
    }
}
