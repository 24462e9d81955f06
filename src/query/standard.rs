//! Standard CRUD queries
//!
//! [`StandardQueryBuilder`] registers up to six queries for a table config:
//! `create`, `createMany`, `getById`, `getMany`, `updateById` and `removeById`.
//! The by-id queries are only available on a [`Keyed`] config.
//!
//! Every query follows the same flow: parse and validate the input, build
//! the identifier list, then make exactly one call to the table operations.
//! Errors from the table operations are returned as they are.

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use super::{
    ByIdInput, CreateInput, GetManyInput, QueryFuture, QueryMap, UpdateByIdInput, parse_input,
};
use crate::config::StandardQueryConfig;
use crate::error::Result;
use crate::identifier::{IdSource, Identifier, build_identifiers};
use crate::operations::{
    CreateManyRecords, CreateRecord, GetFirstRecord, GetManyRecords, Pagination, RemoveRecord,
    TableOperations, UpdateRecord,
};
use crate::table::{KeyState, Keyed, TableConfig, Unkeyed};
use crate::types::Row;

/// Shared state captured by every generated query
struct Standard<K> {
    config: Arc<TableConfig<K>>,
    operations: Arc<dyn TableOperations>,
    default_filters: Vec<Identifier>,
    query_config: StandardQueryConfig,
}

/// Builder that generates the standard queries for one table
pub struct StandardQueryBuilder<K = Unkeyed> {
    standard: Arc<Standard<K>>,
    queries: QueryMap,
}

impl<K: KeyState> std::fmt::Debug for StandardQueryBuilder<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StandardQueryBuilder")
            .field("table", &self.standard.config.table_name())
            .field("queries", &self.queries)
            .finish()
    }
}

impl<K: KeyState> StandardQueryBuilder<K> {
    /// Create a builder
    ///
    /// Fails when the query config refers to columns the table does not have.
    pub fn new(
        config: Arc<TableConfig<K>>,
        operations: Arc<dyn TableOperations>,
        query_config: StandardQueryConfig,
    ) -> Result<Self> {
        query_config.validate(config.table())?;
        let default_filters = query_config.default_identifiers(config.table())?;
        Ok(Self {
            standard: Arc::new(Standard {
                config,
                operations,
                default_filters,
                query_config,
            }),
            queries: QueryMap::new(),
        })
    }

    fn register<F, Fut>(mut self, name: &'static str, run: F) -> Self
    where
        F: Fn(Arc<Standard<K>>, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let standard = self.standard.clone();
        self.queries.insert(
            name,
            Arc::new(move |input| -> QueryFuture { Box::pin(run(standard.clone(), input)) }),
        );
        self
    }

    pub fn create(self) -> Self {
        self.register("create", |s, input| async move { s.create(input).await })
    }

    pub fn create_many(self) -> Self {
        self.register("createMany", |s, input| async move { s.create_many(input).await })
    }

    pub fn get_many(self) -> Self {
        self.register("getMany", |s, input| async move { s.get_many(input).await })
    }

    fn register_get_by_id(self) -> Self {
        self.register("getById", |s, input| async move { s.get_by_id(input).await })
    }

    fn register_update_by_id(self) -> Self {
        self.register("updateById", |s, input| async move { s.update_by_id(input).await })
    }

    fn register_remove_by_id(self) -> Self {
        self.register("removeById", |s, input| async move { s.remove_by_id(input).await })
    }

    /// Register every query the config supports
    ///
    /// All six for a keyed config; `create`, `createMany` and `getMany`
    /// otherwise.
    pub fn all(self) -> Self {
        let builder = self.create().create_many().get_many();
        if K::KEYED {
            builder
                .register_get_by_id()
                .register_update_by_id()
                .register_remove_by_id()
        } else {
            builder
        }
    }

    /// Names registered so far
    pub fn registered(&self) -> Vec<&str> {
        self.queries.keys()
    }

    /// Finish and return the registered queries
    pub fn done(self) -> QueryMap {
        self.queries
    }
}

impl StandardQueryBuilder<Keyed> {
    pub fn get_by_id(self) -> Self {
        self.register_get_by_id()
    }

    pub fn update_by_id(self) -> Self {
        self.register_update_by_id()
    }

    pub fn remove_by_id(self) -> Self {
        self.register_remove_by_id()
    }
}

// ============================================================================
// Query Execution
// ============================================================================

fn row_value(row: Row) -> Value {
    Value::Object(row)
}

impl<K> Standard<K> {
    fn table(&self) -> &str {
        self.config.table_name()
    }

    /// The ownership column and value for new rows, if an owner is configured
    fn owner(&self, operation: &str, user_id: Option<&Value>) -> Result<Option<Identifier>> {
        let identifiers = build_identifiers(operation, &self.config, &[], IdSource::Unused, user_id)?;
        Ok(identifiers.into_iter().next())
    }

    async fn create(&self, input: Value) -> Result<Value> {
        const OP: &str = "create";
        let context = format!("{} input", OP);
        let input: CreateInput = parse_input(OP, input)?;

        let mut data = self.config.validate_create(&context, &input.data)?;
        if let Some(owner) = self.owner(OP, input.user_id.as_ref())? {
            data.insert(owner.field, owner.value);
        }
        self.config.validate_insert_row(&context, "data", &data)?;

        debug!(operation = OP, table = %self.table(), "Executing standard query");
        let row = self
            .operations
            .create_record(CreateRecord {
                data,
                return_columns: self.config.return_columns().to_vec(),
            })
            .await?;
        Ok(row_value(row))
    }

    async fn create_many(&self, input: Value) -> Result<Value> {
        const OP: &str = "createMany";
        let context = format!("{} input", OP);
        let input: CreateInput = parse_input(OP, input)?;

        let mut rows = self.config.validate_create_many(&context, &input.data)?;
        let owner = self.owner(OP, input.user_id.as_ref())?;
        for (i, row) in rows.iter_mut().enumerate() {
            if let Some(owner) = &owner {
                row.insert(owner.field.clone(), owner.value.clone());
            }
            self.config
                .validate_insert_row(&context, &format!("data[{}]", i), row)?;
        }

        debug!(operation = OP, table = %self.table(), count = rows.len(), "Executing standard query");
        let created = self
            .operations
            .create_many_records(CreateManyRecords {
                data: rows,
                return_columns: self.config.return_columns().to_vec(),
            })
            .await?;
        Ok(Value::Array(created.into_iter().map(row_value).collect()))
    }

    async fn get_by_id(&self, input: Value) -> Result<Value> {
        const OP: &str = "getById";
        let input: ByIdInput = parse_input(OP, input)?;
        let identifiers = build_identifiers(
            OP,
            &self.config,
            &self.default_filters,
            IdSource::Input(input.ids.as_ref()),
            input.user_id.as_ref(),
        )?;

        debug!(operation = OP, table = %self.table(), identifiers = identifiers.len(), "Executing standard query");
        let row = self
            .operations
            .get_first_record(GetFirstRecord {
                columns: self.config.return_columns().to_vec(),
                identifiers,
            })
            .await?;
        Ok(row.map(row_value).unwrap_or(Value::Null))
    }

    async fn get_many(&self, input: Value) -> Result<Value> {
        const OP: &str = "getMany";
        let context = format!("{} input", OP);
        let input: GetManyInput = parse_input(OP, input)?;

        let identifiers = build_identifiers(
            OP,
            &self.config,
            &self.default_filters,
            IdSource::Unused,
            input.user_id.as_ref(),
        )?;
        let filters = self.config.parse_filters(&context, input.filters.as_ref())?;

        let order_by = match input.order_by {
            Some(order_by) if !order_by.is_empty() => {
                self.config.validate_order_by(&context, &order_by)?;
                order_by
            }
            _ => self.query_config.get_many.default_ordering.clone(),
        };

        let pagination = match input.pagination {
            Some(pagination) => {
                self.config.validate_pagination(&context, &pagination)?;
                pagination
            }
            None => Pagination::new(1, self.query_config.get_many.default_page_size),
        };

        debug!(
            operation = OP,
            table = %self.table(),
            identifiers = identifiers.len(),
            filters = filters.len(),
            page = pagination.page,
            "Executing standard query"
        );
        let rows = self
            .operations
            .get_many_records(GetManyRecords {
                columns: self.config.return_columns().to_vec(),
                identifiers,
                filters,
                order_by,
                pagination: Some(pagination),
            })
            .await?;
        Ok(Value::Array(rows.into_iter().map(row_value).collect()))
    }

    async fn update_by_id(&self, input: Value) -> Result<Value> {
        const OP: &str = "updateById";
        let context = format!("{} input", OP);
        let input: UpdateByIdInput = parse_input(OP, input)?;

        let identifiers = build_identifiers(
            OP,
            &self.config,
            &self.default_filters,
            IdSource::Input(input.ids.as_ref()),
            input.user_id.as_ref(),
        )?;
        let data = self.config.validate_update(&context, &input.data)?;

        debug!(operation = OP, table = %self.table(), identifiers = identifiers.len(), "Executing standard query");
        let row = self
            .operations
            .update_record(UpdateRecord {
                identifiers,
                data,
                return_columns: self.config.return_columns().to_vec(),
            })
            .await?;
        Ok(row.map(row_value).unwrap_or(Value::Null))
    }

    async fn remove_by_id(&self, input: Value) -> Result<Value> {
        const OP: &str = "removeById";
        let input: ByIdInput = parse_input(OP, input)?;
        let identifiers = build_identifiers(
            OP,
            &self.config,
            &self.default_filters,
            IdSource::Input(input.ids.as_ref()),
            input.user_id.as_ref(),
        )?;

        debug!(operation = OP, table = %self.table(), identifiers = identifiers.len(), "Executing standard query");
        self.operations
            .remove_record(RemoveRecord { identifiers })
            .await?;
        Ok(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryError;
    use crate::operations::{MemoryTableOperations, OrderBy};
    use crate::types::{ColumnDefinition, ColumnType, TableDefinition};
    use serde_json::json;

    fn tag_table() -> TableDefinition {
        TableDefinition::new(
            "tag",
            vec![
                ColumnDefinition::new("id", ColumnType::Uuid).primary_key().default_uuid(),
                ColumnDefinition::new("user_id", ColumnType::String).not_null(),
                ColumnDefinition::new("name", ColumnType::String).not_null(),
                ColumnDefinition::new("color", ColumnType::String)
                    .not_null()
                    .default_value("#ffffff"),
                ColumnDefinition::new("description", ColumnType::String),
                ColumnDefinition::new("is_active", ColumnType::Boolean)
                    .not_null()
                    .default_value(true),
                ColumnDefinition::new("created_at", ColumnType::Timestamp).default_now(),
                ColumnDefinition::new("updated_at", ColumnType::Timestamp).default_now(),
            ],
        )
        .unwrap()
    }

    fn tag_config() -> Arc<TableConfig<Keyed>> {
        Arc::new(
            TableConfig::builder(tag_table())
                .set_ids(&["id"])
                .unwrap()
                .set_user_id("user_id")
                .unwrap()
                .restrict_upsert_fields(&["name", "color", "description"])
                .unwrap()
                .restrict_return_columns(&["id", "name", "color", "description"])
                .unwrap()
                .enable_filtering(&["name", "color"])
                .unwrap()
                .enable_ordering(&["name", "created_at"])
                .unwrap()
                .enable_pagination()
                .build(),
        )
    }

    fn setup() -> (Arc<MemoryTableOperations>, QueryMap) {
        let ops = Arc::new(MemoryTableOperations::new(tag_table()));
        let queries = StandardQueryBuilder::new(
            tag_config(),
            ops.clone(),
            StandardQueryConfig::builder().active_only().build(),
        )
        .unwrap()
        .all()
        .done();
        (ops, queries)
    }

    async fn create_tag(queries: &QueryMap, user: &str, name: &str) -> Value {
        queries
            .call("create", json!({"data": {"name": name}, "userId": user}))
            .await
            .unwrap()
    }

    fn id_of(row: &Value) -> Value {
        row["id"].clone()
    }

    // =========================================================================
    // Registration Tests
    // =========================================================================

    #[test]
    fn test_all_registers_six_for_keyed() {
        let (_, queries) = setup();
        assert_eq!(
            queries.keys(),
            vec!["create", "createMany", "getById", "getMany", "removeById", "updateById"]
        );
    }

    #[test]
    fn test_all_registers_three_for_unkeyed() {
        let config = Arc::new(TableConfig::builder(tag_table()).build());
        let ops = Arc::new(MemoryTableOperations::new(tag_table()));
        let builder = StandardQueryBuilder::new(config, ops, StandardQueryConfig::default())
            .unwrap()
            .all();
        assert_eq!(builder.registered(), vec!["create", "createMany", "getMany"]);
    }

    #[test]
    fn test_selective_registration() {
        let ops = Arc::new(MemoryTableOperations::new(tag_table()));
        let queries = StandardQueryBuilder::new(tag_config(), ops, StandardQueryConfig::default())
            .unwrap()
            .create()
            .get_by_id()
            .create()
            .done();
        assert_eq!(queries.keys(), vec!["create", "getById"]);
    }

    #[test]
    fn test_invalid_query_config_rejected() {
        let ops = Arc::new(MemoryTableOperations::new(tag_table()));
        let result = StandardQueryBuilder::new(
            tag_config(),
            ops,
            StandardQueryConfig::builder().default_filter("archived", false).build(),
        );
        assert!(matches!(result, Err(QueryError::Config(_))));
    }

    // =========================================================================
    // create / createMany
    // =========================================================================

    #[tokio::test]
    async fn test_create_returns_only_return_columns() {
        let (ops, queries) = setup();
        let created = create_tag(&queries, "u1", "Food").await;

        let keys: Vec<_> = created.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys.len(), 4);
        for key in ["id", "name", "color", "description"] {
            assert!(created.get(key).is_some(), "{}", key);
        }
        assert_eq!(created["color"], json!("#ffffff"));

        let stored = ops.snapshot().await;
        assert_eq!(stored[0]["user_id"], json!("u1"));
    }

    fn sorted_keys(row: &Value) -> Vec<String> {
        let mut keys: Vec<_> = row.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    #[tokio::test]
    async fn test_every_result_has_exactly_return_columns() {
        let (_, queries) = setup();
        let expected = vec!["color", "description", "id", "name"];

        let created = create_tag(&queries, "u1", "Food").await;
        assert_eq!(sorted_keys(&created), expected);
        let ids = json!({"id": id_of(&created)});

        let updated = queries
            .call("updateById", json!({"ids": ids, "data": {"color": "#000"}, "userId": "u1"}))
            .await
            .unwrap();
        assert_eq!(sorted_keys(&updated), expected);

        let got = queries
            .call("getById", json!({"ids": ids, "userId": "u1"}))
            .await
            .unwrap();
        assert_eq!(sorted_keys(&got), expected);

        let many = queries.call("getMany", json!({"userId": "u1"})).await.unwrap();
        let rows = many.as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(sorted_keys(&rows[0]), expected);

        let batch = queries
            .call("createMany", json!({"data": [{"name": "a"}, {"name": "b"}], "userId": "u1"}))
            .await
            .unwrap();
        for row in batch.as_array().unwrap() {
            assert_eq!(sorted_keys(row), expected);
        }
    }

    #[tokio::test]
    async fn test_create_rejects_owner_in_data() {
        let (ops, queries) = setup();
        let err = queries
            .call("create", json!({"data": {"name": "x", "user_id": "u2"}, "userId": "u1"}))
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Validation { .. }));
        assert!(ops.is_empty().await);
    }

    #[tokio::test]
    async fn test_create_requires_user_id() {
        let (ops, queries) = setup();
        let err = queries
            .call("create", json!({"data": {"name": "x"}}))
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::MissingIdentifier { .. }));
        assert!(ops.is_empty().await);
    }

    #[tokio::test]
    async fn test_create_many_injects_owner_into_every_row() {
        let (ops, queries) = setup();
        let created = queries
            .call(
                "createMany",
                json!({"data": [{"name": "a"}, {"name": "b", "color": "#000"}], "userId": "u1"}),
            )
            .await
            .unwrap();
        assert_eq!(created.as_array().unwrap().len(), 2);
        assert!(ops.snapshot().await.iter().all(|r| r["user_id"] == json!("u1")));
    }

    #[tokio::test]
    async fn test_create_many_validates_every_record() {
        let (ops, queries) = setup();
        let err = queries
            .call("createMany", json!({"data": [{"name": "a"}, {"color": "#000"}], "userId": "u1"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("data[1].name"));
        assert!(ops.is_empty().await);
    }

    // =========================================================================
    // Ownership Scoping
    // =========================================================================

    #[tokio::test]
    async fn test_other_user_cannot_touch_row() {
        let (ops, queries) = setup();
        let created = create_tag(&queries, "alice", "Private").await;
        let ids = json!({"id": id_of(&created)});

        let got = queries
            .call("getById", json!({"ids": ids, "userId": "bob"}))
            .await
            .unwrap();
        assert!(got.is_null());

        let updated = queries
            .call("updateById", json!({"ids": ids, "data": {"name": "Hacked"}, "userId": "bob"}))
            .await
            .unwrap();
        assert!(updated.is_null());

        queries
            .call("removeById", json!({"ids": ids, "userId": "bob"}))
            .await
            .unwrap();

        let row = ops.snapshot().await.remove(0);
        assert_eq!(row["name"], json!("Private"));
        assert_eq!(row["is_active"], json!(true));

        let many = queries.call("getMany", json!({"userId": "bob"})).await.unwrap();
        assert!(many.as_array().unwrap().is_empty());
    }

    // =========================================================================
    // Missing Identifiers
    // =========================================================================

    #[tokio::test]
    async fn test_missing_identifiers_fail_before_io() {
        let (ops, queries) = setup();
        create_tag(&queries, "u1", "Keep").await;

        for (name, input) in [
            ("getById", json!({"userId": "u1"})),
            ("getById", json!({"ids": {}, "userId": "u1"})),
            ("updateById", json!({"data": {"name": "x"}, "userId": "u1"})),
            ("removeById", json!({"userId": "u1"})),
            ("getMany", json!({})),
        ] {
            let err = queries.call(name, input).await.unwrap_err();
            assert!(
                matches!(err, QueryError::MissingIdentifier { .. }),
                "{}: {:?}",
                name,
                err
            );
        }

        let rows = ops.snapshot().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], json!("Keep"));
        assert_eq!(rows[0]["is_active"], json!(true));
    }

    // =========================================================================
    // updateById / removeById
    // =========================================================================

    #[tokio::test]
    async fn test_partial_update_leaves_other_fields() {
        let (_, queries) = setup();
        let created = queries
            .call(
                "create",
                json!({"data": {"name": "Food", "color": "#111", "description": "meals"}, "userId": "u1"}),
            )
            .await
            .unwrap();
        let ids = json!({"id": id_of(&created)});

        let updated = queries
            .call("updateById", json!({"ids": ids, "data": {"color": "#222"}, "userId": "u1"}))
            .await
            .unwrap();
        assert_eq!(updated["color"], json!("#222"));
        assert_eq!(updated["name"], json!("Food"));
        assert_eq!(updated["description"], json!("meals"));
    }

    #[tokio::test]
    async fn test_update_rejects_fields_outside_update_shape() {
        let (_, queries) = setup();
        let created = create_tag(&queries, "u1", "Food").await;
        let err = queries
            .call(
                "updateById",
                json!({"ids": {"id": id_of(&created)}, "data": {"is_active": false}, "userId": "u1"}),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("data.is_active"));
    }

    #[tokio::test]
    async fn test_soft_delete_hides_row_but_keeps_it() {
        let (ops, queries) = setup();
        let created = create_tag(&queries, "u1", "Temp").await;
        let ids = json!({"id": id_of(&created)});

        queries
            .call("removeById", json!({"ids": ids, "userId": "u1"}))
            .await
            .unwrap();

        let got = queries
            .call("getById", json!({"ids": ids, "userId": "u1"}))
            .await
            .unwrap();
        assert!(got.is_null());
        let many = queries.call("getMany", json!({"userId": "u1"})).await.unwrap();
        assert!(many.as_array().unwrap().is_empty());

        let rows = ops.snapshot().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["is_active"], json!(false));
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let (_, queries) = setup();
        let created = create_tag(&queries, "u1", "Temp").await;
        let input = json!({"ids": {"id": id_of(&created)}, "userId": "u1"});

        assert!(queries.call("removeById", input.clone()).await.unwrap().is_null());
        assert!(queries.call("removeById", input).await.unwrap().is_null());
    }

    // =========================================================================
    // getMany
    // =========================================================================

    #[tokio::test]
    async fn test_get_many_filters_order_and_pagination() {
        let (_, queries) = setup();
        for name in ["delta", "alpha", "charlie", "bravo"] {
            create_tag(&queries, "u1", name).await;
        }
        create_tag(&queries, "u2", "alpha-other").await;

        let page = queries
            .call(
                "getMany",
                json!({
                    "userId": "u1",
                    "orderBy": [{"field": "name", "direction": "asc"}],
                    "pagination": {"page": 2, "pageSize": 2}
                }),
            )
            .await
            .unwrap();
        let names: Vec<_> = page
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["charlie", "delta"]);

        let filtered = queries
            .call(
                "getMany",
                json!({"userId": "u1", "filters": {"name": {"op": "like", "value": "ph"}}}),
            )
            .await
            .unwrap();
        assert_eq!(filtered.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_get_many_rejects_disabled_extensions() {
        let ops = Arc::new(MemoryTableOperations::new(tag_table()));
        let config = Arc::new(
            TableConfig::builder(tag_table())
                .set_user_id("user_id")
                .unwrap()
                .build(),
        );
        let queries = StandardQueryBuilder::new(config, ops, StandardQueryConfig::default())
            .unwrap()
            .get_many()
            .done();

        for input in [
            json!({"userId": "u1", "filters": {"name": "a"}}),
            json!({"userId": "u1", "orderBy": [{"field": "name"}]}),
            json!({"userId": "u1", "pagination": {"page": 1, "pageSize": 5}}),
        ] {
            let err = queries.call("getMany", input).await.unwrap_err();
            assert!(matches!(err, QueryError::Validation { .. }));
        }
    }

    #[tokio::test]
    async fn test_get_many_default_ordering_and_page_size() {
        let ops = Arc::new(MemoryTableOperations::new(tag_table()));
        let queries = StandardQueryBuilder::new(
            tag_config(),
            ops,
            StandardQueryConfig::builder()
                .order_by(OrderBy::desc("name"))
                .default_page_size(2)
                .build(),
        )
        .unwrap()
        .all()
        .done();

        for name in ["a", "b", "c"] {
            create_tag(&queries, "u1", name).await;
        }
        let rows = queries.call("getMany", json!({"userId": "u1"})).await.unwrap();
        let names: Vec<_> = rows
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["c", "b"]);
    }

    // =========================================================================
    // End-to-end
    // =========================================================================

    #[tokio::test]
    async fn test_end_to_end_lifecycle() {
        let (_, queries) = setup();

        let created = create_tag(&queries, "u1", "Groceries").await;
        let ids = json!({"id": id_of(&created)});

        let got = queries
            .call("getById", json!({"ids": ids, "userId": "u1"}))
            .await
            .unwrap();
        assert_eq!(got, created);

        let updated = queries
            .call("updateById", json!({"ids": ids, "data": {"name": "Food"}, "userId": "u1"}))
            .await
            .unwrap();
        assert_eq!(updated["name"], json!("Food"));

        let many = queries.call("getMany", json!({"userId": "u1"})).await.unwrap();
        assert_eq!(many.as_array().unwrap().len(), 1);
        assert_eq!(many[0]["name"], json!("Food"));

        queries
            .call("removeById", json!({"ids": ids, "userId": "u1"}))
            .await
            .unwrap();
        let gone = queries
            .call("getById", json!({"ids": ids, "userId": "u1"}))
            .await
            .unwrap();
        assert!(gone.is_null());
    }
}
