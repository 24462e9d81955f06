//! In-memory table operations
//!
//! Keeps rows of one table in a `Vec` behind a `tokio` lock. Column defaults,
//! NOT NULL checks, primary-key uniqueness and the removal policy behave the
//! way the PostgreSQL operations do, which makes this backend suitable for
//! tests and for features that do not need persistence.

use std::collections::HashSet;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use super::{
    CreateManyRecords, CreateRecord, GetFirstRecord, GetManyRecords, RemoveRecord,
    TableOperations, UpdateRecord, compare_rows, project,
};
use crate::config::RemovalPolicy;
use crate::error::{QueryError, Result};
use crate::identifier::Identifier;
use crate::types::{ColumnDefault, Row, TableDefinition};

/// Table operations over an in-memory row list
#[derive(Debug)]
pub struct MemoryTableOperations {
    table: TableDefinition,
    removal: RemovalPolicy,
    touch_updated_at: bool,
    rows: RwLock<Vec<Row>>,
}

impl MemoryTableOperations {
    /// Empty table with the default removal policy
    pub fn new(table: TableDefinition) -> Self {
        let removal = RemovalPolicy::default().resolve(&table);
        Self {
            table,
            removal,
            touch_updated_at: true,
            rows: RwLock::new(Vec::new()),
        }
    }

    pub fn with_removal(mut self, removal: RemovalPolicy) -> Self {
        self.removal = removal.resolve(&self.table);
        self
    }

    pub fn with_touch_updated_at(mut self, enabled: bool) -> Self {
        self.touch_updated_at = enabled;
        self
    }

    pub fn removal(&self) -> &RemovalPolicy {
        &self.removal
    }

    /// Every stored row, including soft-deleted ones
    pub async fn snapshot(&self) -> Vec<Row> {
        self.rows.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    /// Complete a row for insertion: defaults, NOT NULL and unknown columns
    fn prepare_row(&self, mut data: Row) -> Result<Row> {
        if let Some(unknown) = data.keys().find(|k| !self.table.has_column(k)) {
            return Err(QueryError::QueryFailed {
                operation: None,
                code: Some("42703".to_string()),
                message: format!(
                    "column \"{}\" of relation \"{}\" does not exist",
                    unknown, self.table.name
                ),
            });
        }

        let mut row = Row::new();
        for column in &self.table.columns {
            let value = match data.remove(&column.name) {
                Some(v) => v,
                None => column
                    .default
                    .as_ref()
                    .map(ColumnDefault::generate)
                    .unwrap_or(Value::Null),
            };
            if value.is_null() && !column.nullable {
                return Err(QueryError::NotNullViolation {
                    operation: None,
                    column: Some(column.name.clone()),
                    message: format!(
                        "null value in column \"{}\" of relation \"{}\" violates not-null constraint",
                        column.name, self.table.name
                    ),
                });
            }
            row.insert(column.name.clone(), value);
        }
        Ok(row)
    }

    fn primary_key(&self, row: &Row) -> Option<Vec<Value>> {
        let pk = self.table.primary_key_columns();
        if pk.is_empty() {
            return None;
        }
        Some(
            pk.iter()
                .map(|c| row.get(&c.name).cloned().unwrap_or(Value::Null))
                .collect(),
        )
    }

    fn check_unique(&self, existing: &[Row], new_rows: &[Row]) -> Result<()> {
        let mut keys: HashSet<String> = existing
            .iter()
            .filter_map(|r| self.primary_key(r))
            .map(|k| Value::Array(k).to_string())
            .collect();
        for row in new_rows {
            if let Some(key) = self.primary_key(row) {
                let key = Value::Array(key).to_string();
                if !keys.insert(key.clone()) {
                    return Err(QueryError::UniqueViolation {
                        operation: None,
                        constraint: Some(format!("{}_pkey", self.table.name)),
                        message: format!("duplicate key value {} violates unique constraint", key),
                    });
                }
            }
        }
        Ok(())
    }

    fn touch(&self, row: &mut Row) {
        if self.touch_updated_at && self.table.has_column("updated_at") {
            row.insert("updated_at".to_string(), ColumnDefault::Now.generate());
        }
    }
}

fn matches_all(row: &Row, identifiers: &[Identifier]) -> bool {
    identifiers.iter().all(|i| i.matches(row))
}

#[async_trait]
impl TableOperations for MemoryTableOperations {
    fn table(&self) -> &TableDefinition {
        &self.table
    }

    async fn create_record(&self, request: CreateRecord) -> Result<Row> {
        let row = self.prepare_row(request.data)?;
        let mut rows = self.rows.write().await;
        self.check_unique(&rows, std::slice::from_ref(&row))?;
        let result = project(&row, &request.return_columns);
        rows.push(row);
        debug!(table = %self.table.name, "Created record in memory");
        Ok(result)
    }

    async fn create_many_records(&self, request: CreateManyRecords) -> Result<Vec<Row>> {
        let prepared = request
            .data
            .into_iter()
            .map(|data| self.prepare_row(data))
            .collect::<Result<Vec<_>>>()?;

        let mut rows = self.rows.write().await;
        self.check_unique(&rows, &prepared)?;
        let results = prepared
            .iter()
            .map(|r| project(r, &request.return_columns))
            .collect();
        let count = prepared.len();
        rows.extend(prepared);
        debug!(table = %self.table.name, count, "Created records in memory");
        Ok(results)
    }

    async fn get_first_record(&self, request: GetFirstRecord) -> Result<Option<Row>> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .find(|r| matches_all(r, &request.identifiers))
            .map(|r| project(r, &request.columns)))
    }

    async fn get_many_records(&self, request: GetManyRecords) -> Result<Vec<Row>> {
        let rows = self.rows.read().await;
        let mut matched: Vec<&Row> = rows
            .iter()
            .filter(|r| matches_all(r, &request.identifiers))
            .filter(|r| request.filters.iter().all(|f| f.matches(r)))
            .collect();

        if !request.order_by.is_empty() {
            matched.sort_by(|a, b| compare_rows(a, b, &request.order_by));
        }

        let (skip, take) = match &request.pagination {
            Some(p) => (p.offset() as usize, p.limit() as usize),
            None => (0, usize::MAX),
        };

        Ok(matched
            .into_iter()
            .skip(skip)
            .take(take)
            .map(|r| project(r, &request.columns))
            .collect())
    }

    async fn update_record(&self, request: UpdateRecord) -> Result<Option<Row>> {
        if let Some(unknown) = request.data.keys().find(|k| !self.table.has_column(k)) {
            return Err(QueryError::QueryFailed {
                operation: None,
                code: Some("42703".to_string()),
                message: format!("column \"{}\" does not exist", unknown),
            });
        }

        let mut rows = self.rows.write().await;
        let mut first = None;
        for row in rows.iter_mut().filter(|r| matches_all(r, &request.identifiers)) {
            for (key, value) in &request.data {
                row.insert(key.clone(), value.clone());
            }
            if !request.data.contains_key("updated_at") {
                self.touch(row);
            }
            if first.is_none() {
                first = Some(project(row, &request.return_columns));
            }
        }
        Ok(first)
    }

    async fn remove_record(&self, request: RemoveRecord) -> Result<()> {
        let mut rows = self.rows.write().await;
        match &self.removal {
            RemovalPolicy::Hard => {
                let before = rows.len();
                rows.retain(|r| !matches_all(r, &request.identifiers));
                debug!(table = %self.table.name, removed = before - rows.len(), "Deleted records in memory");
            }
            RemovalPolicy::Soft {
                column,
                removed_value,
            } => {
                for row in rows.iter_mut().filter(|r| matches_all(r, &request.identifiers)) {
                    row.insert(column.clone(), removed_value.clone());
                    self.touch(row);
                }
            }
        }
        Ok(())
    }
}
