//! PostgreSQL table operations
//!
//! Generates parameterized SQL for a single table. Identifiers are quoted,
//! values are bound with the declared column type, and result rows are read
//! back column by column into JSON.

use async_trait::async_trait;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row as _};
use tracing::{debug, trace};

use super::{
    CreateManyRecords, CreateRecord, GetFirstRecord, GetManyRecords, RemoveRecord,
    TableOperations, UpdateRecord,
};
use crate::config::{RemovalPolicy, StoreConfig};
use crate::error::{QueryError, Result};
use crate::sql::condition::{
    SqlParam, build_limit_clause, build_order_by_clause, build_where_clause,
};
use crate::sql::sanitize::quote_identifier;
use crate::types::{ColumnDefinition, ColumnType, Row, TableDefinition};

type PgQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

/// Table operations backed by a PostgreSQL table
///
/// The table is expected to exist; this type never issues DDL.
#[derive(Debug, Clone)]
pub struct PgTableOperations {
    /// Database connection pool
    pool: PgPool,
    table: TableDefinition,
    removal: RemovalPolicy,
    touch_updated_at: bool,
}

impl PgTableOperations {
    /// Connect using the store configuration
    pub async fn connect(config: &StoreConfig, table: TableDefinition) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await
            .map_err(|e| QueryError::Connection {
                operation: None,
                message: format!("Database connection failed: {}", e),
            })?;
        Ok(Self::from_pool(pool, table, config))
    }

    /// Create from an existing pool
    ///
    /// Use this to share one pool between the operations of several tables.
    pub fn from_pool(pool: PgPool, table: TableDefinition, config: &StoreConfig) -> Self {
        let removal = config.removal.resolve(&table);
        let touch_updated_at = config.touch_updated_at && table.has_column("updated_at");
        Self {
            pool,
            table,
            removal,
            touch_updated_at,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn table_name(&self) -> String {
        quote_identifier(&self.table.name)
    }

    fn column(&self, name: &str) -> Result<&ColumnDefinition> {
        self.table.column(name).ok_or_else(|| {
            QueryError::store(format!(
                "Column '{}' does not exist in table '{}'",
                name, self.table.name
            ))
        })
    }

    /// Quoted select list; `1` when no columns are requested
    fn select_list(&self, columns: &[String]) -> Result<String> {
        if columns.is_empty() {
            return Ok("1".to_string());
        }
        columns
            .iter()
            .map(|c| self.column(c).map(|col| quote_identifier(&col.name)))
            .collect::<Result<Vec<_>>>()
            .map(|cols| cols.join(", "))
    }

    fn bind_params<'q>(&self, mut query: PgQuery<'q>, params: &[SqlParam]) -> Result<PgQuery<'q>> {
        for param in params {
            query = match param {
                SqlParam::Column { column, value } => bind_value(query, self.column(column)?, value)?,
                SqlParam::Text(text) => query.bind(text.clone()),
            };
        }
        Ok(query)
    }

    fn read_row(&self, row: &PgRow, columns: &[String]) -> Result<Row> {
        let mut result = Row::new();
        for name in columns {
            let column = self.column(name)?;
            result.insert(name.clone(), extract_column_value(row, column)?);
        }
        Ok(result)
    }

    /// Columns of `data` in table order, rejecting unknown keys
    fn data_columns<'a>(&'a self, data: &[&Row]) -> Result<Vec<&'a ColumnDefinition>> {
        for row in data {
            if let Some(unknown) = row.keys().find(|k| !self.table.has_column(k)) {
                return Err(QueryError::store(format!(
                    "Column '{}' does not exist in table '{}'",
                    unknown, self.table.name
                )));
            }
        }
        Ok(self
            .table
            .columns
            .iter()
            .filter(|c| data.iter().any(|r| r.contains_key(&c.name)))
            .collect())
    }

    /// INSERT statement for `data`; columns a row leaves out take their DEFAULT
    fn insert_sql(&self, data: &[Row], columns: &[&ColumnDefinition], returning: &str) -> String {
        if columns.is_empty() && data.len() == 1 {
            return format!(
                "INSERT INTO {} DEFAULT VALUES RETURNING {}",
                self.table_name(),
                returning
            );
        }

        // Several all-default rows still need one column to spell out DEFAULT
        let columns: Vec<&ColumnDefinition> = if columns.is_empty() {
            self.table.columns.iter().take(1).collect()
        } else {
            columns.to_vec()
        };

        let mut param_idx = 1;
        let tuples: Vec<String> = data
            .iter()
            .map(|row| {
                let values: Vec<String> = columns
                    .iter()
                    .map(|c| {
                        if row.contains_key(&c.name) {
                            let placeholder = format!("${}", param_idx);
                            param_idx += 1;
                            placeholder
                        } else {
                            "DEFAULT".to_string()
                        }
                    })
                    .collect();
                format!("({})", values.join(", "))
            })
            .collect();
        let names: Vec<String> = columns.iter().map(|c| quote_identifier(&c.name)).collect();
        format!(
            "INSERT INTO {} ({}) VALUES {} RETURNING {}",
            self.table_name(),
            names.join(", "),
            tuples.join(", "),
            returning
        )
    }

    async fn insert(&self, data: Vec<Row>, return_columns: &[String]) -> Result<Vec<Row>> {
        let refs: Vec<&Row> = data.iter().collect();
        let columns = self.data_columns(&refs)?;
        let returning = self.select_list(return_columns)?;
        let sql = self.insert_sql(&data, &columns, &returning);
        trace!(sql = %sql, "Executing insert");

        let mut query = sqlx::query(&sql);
        for row in &data {
            for column in &columns {
                if let Some(value) = row.get(&column.name) {
                    query = bind_value(query, column, value)?;
                }
            }
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter()
            .map(|r| self.read_row(r, return_columns))
            .collect()
    }
}

#[async_trait]
impl TableOperations for PgTableOperations {
    fn table(&self) -> &TableDefinition {
        &self.table
    }

    async fn create_record(&self, request: CreateRecord) -> Result<Row> {
        let mut rows = self.insert(vec![request.data], &request.return_columns).await?;
        debug!(table = %self.table.name, "Created record");
        rows.pop()
            .ok_or_else(|| QueryError::store("INSERT returned no row"))
    }

    async fn create_many_records(&self, request: CreateManyRecords) -> Result<Vec<Row>> {
        if request.data.is_empty() {
            return Ok(Vec::new());
        }
        let count = request.data.len();
        let rows = self.insert(request.data, &request.return_columns).await?;
        debug!(table = %self.table.name, count, "Created records");
        Ok(rows)
    }

    async fn get_first_record(&self, request: GetFirstRecord) -> Result<Option<Row>> {
        let mut param_idx = 1;
        let (where_clause, params) = build_where_clause(&request.identifiers, &[], &mut param_idx)
            .map_err(QueryError::store)?;
        let sql = format!(
            "SELECT {} FROM {} WHERE {} LIMIT 1",
            self.select_list(&request.columns)?,
            self.table_name(),
            where_clause
        );
        trace!(sql = %sql, "Executing select");

        let query = self.bind_params(sqlx::query(&sql), &params)?;
        query
            .fetch_optional(&self.pool)
            .await?
            .map(|r| self.read_row(&r, &request.columns))
            .transpose()
    }

    async fn get_many_records(&self, request: GetManyRecords) -> Result<Vec<Row>> {
        let mut param_idx = 1;
        let (where_clause, params) =
            build_where_clause(&request.identifiers, &request.filters, &mut param_idx)
                .map_err(QueryError::store)?;

        for term in &request.order_by {
            self.column(&term.field)?;
        }

        let mut sql = format!(
            "SELECT {} FROM {} WHERE {}",
            self.select_list(&request.columns)?,
            self.table_name(),
            where_clause
        );
        if !request.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&build_order_by_clause(&request.order_by));
        }
        if let Some(pagination) = &request.pagination {
            sql.push(' ');
            sql.push_str(&build_limit_clause(pagination));
        }
        trace!(sql = %sql, "Executing select");

        let query = self.bind_params(sqlx::query(&sql), &params)?;
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter()
            .map(|r| self.read_row(r, &request.columns))
            .collect()
    }

    async fn update_record(&self, request: UpdateRecord) -> Result<Option<Row>> {
        let columns = self.data_columns(&[&request.data])?;

        let mut param_idx = 1;
        let mut set_clauses: Vec<String> = columns
            .iter()
            .map(|c| {
                let clause = format!("{} = ${}", quote_identifier(&c.name), param_idx);
                param_idx += 1;
                clause
            })
            .collect();
        if self.touch_updated_at && !request.data.contains_key("updated_at") {
            set_clauses.push(format!("{} = NOW()", quote_identifier("updated_at")));
        }

        if set_clauses.is_empty() {
            // Nothing to write; report the current row like an empty update would
            return self
                .get_first_record(GetFirstRecord {
                    columns: request.return_columns,
                    identifiers: request.identifiers,
                })
                .await;
        }

        let (where_clause, params) = build_where_clause(&request.identifiers, &[], &mut param_idx)
            .map_err(QueryError::store)?;
        let sql = format!(
            "UPDATE {} SET {} WHERE {} RETURNING {}",
            self.table_name(),
            set_clauses.join(", "),
            where_clause,
            self.select_list(&request.return_columns)?
        );
        trace!(sql = %sql, "Executing update");

        let mut query = sqlx::query(&sql);
        for column in &columns {
            if let Some(value) = request.data.get(&column.name) {
                query = bind_value(query, column, value)?;
            }
        }
        let query = self.bind_params(query, &params)?;

        let rows = query.fetch_all(&self.pool).await?;
        debug!(table = %self.table.name, affected = rows.len(), "Updated records");
        rows.first()
            .map(|r| self.read_row(r, &request.return_columns))
            .transpose()
    }

    async fn remove_record(&self, request: RemoveRecord) -> Result<()> {
        let result = match &self.removal {
            RemovalPolicy::Hard => {
                let mut param_idx = 1;
                let (where_clause, params) =
                    build_where_clause(&request.identifiers, &[], &mut param_idx)
                        .map_err(QueryError::store)?;
                let sql = format!("DELETE FROM {} WHERE {}", self.table_name(), where_clause);
                trace!(sql = %sql, "Executing delete");

                self.bind_params(sqlx::query(&sql), &params)?
                    .execute(&self.pool)
                    .await?
            }
            RemovalPolicy::Soft {
                column,
                removed_value,
            } => {
                let flag = self.column(column)?;
                let mut set_clauses = vec![format!("{} = $1", quote_identifier(&flag.name))];
                if self.touch_updated_at {
                    set_clauses.push(format!("{} = NOW()", quote_identifier("updated_at")));
                }

                let mut param_idx = 2;
                let (where_clause, params) =
                    build_where_clause(&request.identifiers, &[], &mut param_idx)
                        .map_err(QueryError::store)?;
                let sql = format!(
                    "UPDATE {} SET {} WHERE {}",
                    self.table_name(),
                    set_clauses.join(", "),
                    where_clause
                );
                trace!(sql = %sql, "Executing soft delete");

                let query = bind_value(sqlx::query(&sql), flag, removed_value)?;
                self.bind_params(query, &params)?
                    .execute(&self.pool)
                    .await?
            }
        };

        debug!(table = %self.table.name, affected = result.rows_affected(), "Removed records");
        Ok(())
    }
}

// ============================================================================
// Value Conversion
// ============================================================================

fn bind_error(column: &ColumnDefinition, expected: &str) -> QueryError {
    QueryError::invalid(
        "column value",
        column.name.clone(),
        format!("expected {}", expected),
    )
}

/// Bind a JSON value with the column's declared type
fn bind_value<'q>(query: PgQuery<'q>, column: &ColumnDefinition, value: &Value) -> Result<PgQuery<'q>> {
    Ok(match &column.column_type {
        ColumnType::String | ColumnType::Enum { .. } => {
            if value.is_null() {
                query.bind(None::<String>)
            } else {
                let text = value.as_str().ok_or_else(|| bind_error(column, "string"))?;
                query.bind(text.to_string())
            }
        }
        ColumnType::Uuid => {
            if value.is_null() {
                query.bind(None::<uuid::Uuid>)
            } else {
                let id = value
                    .as_str()
                    .and_then(|s| uuid::Uuid::parse_str(s).ok())
                    .ok_or_else(|| bind_error(column, "uuid"))?;
                query.bind(id)
            }
        }
        ColumnType::Integer => {
            if value.is_null() {
                query.bind(None::<i64>)
            } else {
                let int_val = value
                    .as_i64()
                    .or_else(|| value.as_str().and_then(|s| s.parse::<i64>().ok()))
                    .ok_or_else(|| bind_error(column, "integer"))?;
                query.bind(int_val)
            }
        }
        ColumnType::Decimal { .. } => {
            if value.is_null() {
                query.bind(None::<rust_decimal::Decimal>)
            } else {
                let dec_val = match value {
                    Value::Number(n) => n
                        .as_i64()
                        .map(rust_decimal::Decimal::from)
                        .or_else(|| n.as_f64().and_then(rust_decimal::Decimal::from_f64)),
                    Value::String(s) => s.parse::<rust_decimal::Decimal>().ok(),
                    _ => None,
                }
                .ok_or_else(|| bind_error(column, "decimal"))?;
                query.bind(dec_val)
            }
        }
        ColumnType::Boolean => {
            if value.is_null() {
                query.bind(None::<bool>)
            } else {
                let bool_val = value.as_bool().ok_or_else(|| bind_error(column, "boolean"))?;
                query.bind(bool_val)
            }
        }
        ColumnType::Timestamp => {
            if value.is_null() {
                query.bind(None::<chrono::DateTime<chrono::Utc>>)
            } else {
                let timestamp = value
                    .as_str()
                    .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
                    .ok_or_else(|| bind_error(column, "RFC 3339 timestamp"))?
                    .with_timezone(&chrono::Utc);
                query.bind(timestamp)
            }
        }
        ColumnType::Json => query.bind(value.clone()),
    })
}

/// Read one column of a result row as JSON
fn extract_column_value(row: &PgRow, column: &ColumnDefinition) -> Result<Value> {
    let name = column.name.as_str();
    let value = match &column.column_type {
        ColumnType::String | ColumnType::Enum { .. } => row
            .try_get::<Option<String>, _>(name)?
            .map(Value::String),
        ColumnType::Uuid => row
            .try_get::<Option<uuid::Uuid>, _>(name)?
            .map(|v| Value::String(v.to_string())),
        ColumnType::Integer => row
            .try_get::<Option<i64>, _>(name)?
            .map(|v| Value::Number(v.into())),
        ColumnType::Decimal { .. } => row
            .try_get::<Option<rust_decimal::Decimal>, _>(name)?
            .and_then(|d| d.to_f64())
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        ColumnType::Boolean => row.try_get::<Option<bool>, _>(name)?.map(Value::Bool),
        ColumnType::Timestamp => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name)?
            .map(|v| Value::String(v.to_rfc3339())),
        ColumnType::Json => row.try_get::<Option<Value>, _>(name)?,
    };
    Ok(value.unwrap_or(Value::Null))
}
