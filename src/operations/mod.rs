//! Table operations: the single-table CRUD primitives the query layer runs on
//!
//! Every backend implements [`TableOperations`] for exactly one table. The
//! query builders never issue SQL themselves; they assemble an identifier list
//! and hand it to one of these primitives.

use std::cmp::Ordering;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::identifier::Identifier;
use crate::types::{Row, TableDefinition};

pub mod memory;
pub mod postgres;

pub use memory::MemoryTableOperations;
pub use postgres::PgTableOperations;

// ============================================================================
// Filtering, Ordering, Pagination
// ============================================================================

/// Comparison applied by a caller-supplied filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOp {
    Eq,
    Ne,
    /// Case-sensitive substring match
    Like,
    /// Case-insensitive substring match
    Ilike,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

impl FilterOp {
    /// Whether the operator takes no value
    pub fn is_unary(&self) -> bool {
        matches!(self, FilterOp::IsNull | FilterOp::IsNotNull)
    }

    /// Whether the operator takes a list of values
    pub fn is_list(&self) -> bool {
        matches!(self, FilterOp::In | FilterOp::NotIn)
    }
}

/// An ad-hoc predicate on one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    #[serde(default)]
    pub value: Value,
}

impl Filter {
    pub fn new(field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Eq, value)
    }

    /// Evaluate the filter against an in-memory row
    pub fn matches(&self, row: &Row) -> bool {
        let actual = row.get(&self.field).unwrap_or(&Value::Null);
        match self.op {
            FilterOp::Eq => values_equal(actual, &self.value),
            FilterOp::Ne => !actual.is_null() && !values_equal(actual, &self.value),
            FilterOp::Like => match (actual.as_str(), self.value.as_str()) {
                (Some(a), Some(p)) => a.contains(p),
                _ => false,
            },
            FilterOp::Ilike => match (actual.as_str(), self.value.as_str()) {
                (Some(a), Some(p)) => a.to_lowercase().contains(&p.to_lowercase()),
                _ => false,
            },
            FilterOp::In => self
                .value
                .as_array()
                .is_some_and(|list| list.iter().any(|v| values_equal(actual, v))),
            // An empty list excludes nothing, nulls included, like `TRUE` in SQL
            FilterOp::NotIn => self.value.as_array().is_some_and(|list| {
                list.is_empty() || (!actual.is_null() && !list.iter().any(|v| values_equal(actual, v)))
            }),
            FilterOp::IsNull => actual.is_null(),
            FilterOp::IsNotNull => !actual.is_null(),
        }
    }
}

/// Equality used by the in-memory backend; numbers compare by value
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// One ordering term
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Compare two rows by a list of ordering terms; nulls sort last
pub(crate) fn compare_rows(a: &Row, b: &Row, order_by: &[OrderBy]) -> Ordering {
    for term in order_by {
        let left = a.get(&term.field).unwrap_or(&Value::Null);
        let right = b.get(&term.field).unwrap_or(&Value::Null);
        let ord = match (left.is_null(), right.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            (false, false) => compare_values(left, right),
        };
        let ord = match term.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

/// Page-based pagination; pages start at 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
}

impl Pagination {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    /// Number of rows to skip
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.page_size)
    }
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone)]
pub struct CreateRecord {
    pub data: Row,
    pub return_columns: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CreateManyRecords {
    pub data: Vec<Row>,
    pub return_columns: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct GetFirstRecord {
    pub columns: Vec<String>,
    pub identifiers: Vec<Identifier>,
}

#[derive(Debug, Clone, Default)]
pub struct GetManyRecords {
    pub columns: Vec<String>,
    pub identifiers: Vec<Identifier>,
    pub filters: Vec<Filter>,
    pub order_by: Vec<OrderBy>,
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Clone)]
pub struct UpdateRecord {
    pub identifiers: Vec<Identifier>,
    pub data: Row,
    pub return_columns: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RemoveRecord {
    pub identifiers: Vec<Identifier>,
}

// ============================================================================
// TableOperations
// ============================================================================

/// Single-table CRUD primitives
///
/// Implementations report failures as errors; "no matching row" is never an
/// error (`None`, an empty list, or a silent no-op for removal).
#[async_trait]
pub trait TableOperations: Send + Sync {
    /// The table these operations act on
    fn table(&self) -> &TableDefinition;

    async fn create_record(&self, request: CreateRecord) -> Result<Row>;

    async fn create_many_records(&self, request: CreateManyRecords) -> Result<Vec<Row>>;

    async fn get_first_record(&self, request: GetFirstRecord) -> Result<Option<Row>>;

    async fn get_many_records(&self, request: GetManyRecords) -> Result<Vec<Row>>;

    async fn update_record(&self, request: UpdateRecord) -> Result<Option<Row>>;

    /// Remove matching rows; soft or hard delete depending on the backend's policy
    async fn remove_record(&self, request: RemoveRecord) -> Result<()>;
}

/// Keep only the requested columns of a row, in request order
pub(crate) fn project(row: &Row, columns: &[String]) -> Row {
    columns
        .iter()
        .map(|c| (c.clone(), row.get(c).cloned().unwrap_or(Value::Null)))
        .collect()
}
