//! Table configuration
//!
//! A [`TableConfig`] is the immutable description of how one table is exposed
//! to a feature: which fields may be written, which columns are returned, what
//! identifies a row, who owns it, and which `getMany` extensions are enabled.
//! It is produced by [`TableConfigBuilder`] and shared by every query built
//! from it.

use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{QueryError, Result, ValidationIssue};
use crate::operations::{Filter, FilterOp, OrderBy, Pagination};
use crate::shape::Shape;
use crate::types::{Row, TableDefinition};

pub mod builder;

pub use builder::TableConfigBuilder;

/// Marker: identity columns have been configured
#[derive(Debug, Clone, Copy, Default)]
pub struct Keyed;

/// Marker: no identity columns; by-id queries are unavailable
#[derive(Debug, Clone, Copy, Default)]
pub struct Unkeyed;

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Keyed {}
    impl Sealed for super::Unkeyed {}
}

/// Implemented by the [`Keyed`] and [`Unkeyed`] markers only
pub trait KeyState: sealed::Sealed + Clone + std::fmt::Debug + Send + Sync + 'static {
    /// Whether by-id queries can be generated
    const KEYED: bool;
}

impl KeyState for Keyed {
    const KEYED: bool = true;
}

impl KeyState for Unkeyed {
    const KEYED: bool = false;
}

/// Validated configuration of one table
#[derive(Debug, Clone)]
pub struct TableConfig<K = Unkeyed> {
    pub(crate) table: Arc<TableDefinition>,
    pub(crate) base: Shape,
    pub(crate) create_data: Shape,
    pub(crate) update_data: Shape,
    pub(crate) return_columns: Vec<String>,
    pub(crate) id: Shape,
    pub(crate) user_id: Shape,
    pub(crate) filters: Option<Vec<String>>,
    pub(crate) ordering: Option<Vec<String>>,
    pub(crate) pagination: bool,
    pub(crate) _key: PhantomData<K>,
}

impl TableConfig<Unkeyed> {
    /// Start configuring a table
    pub fn builder(table: TableDefinition) -> TableConfigBuilder<Unkeyed> {
        TableConfigBuilder::new(table)
    }
}

impl<K> TableConfig<K> {
    /// Same configuration under a different key marker
    pub(crate) fn rekey<K2>(self) -> TableConfig<K2> {
        TableConfig {
            table: self.table,
            base: self.base,
            create_data: self.create_data,
            update_data: self.update_data,
            return_columns: self.return_columns,
            id: self.id,
            user_id: self.user_id,
            filters: self.filters,
            ordering: self.ordering,
            pagination: self.pagination,
            _key: PhantomData,
        }
    }

    pub fn table(&self) -> &TableDefinition {
        &self.table
    }

    pub fn table_name(&self) -> &str {
        &self.table.name
    }

    /// Client-writable fields the insert and update shapes are drawn from
    pub fn base(&self) -> &Shape {
        &self.base
    }

    pub fn create_data(&self) -> &Shape {
        &self.create_data
    }

    pub fn update_data(&self) -> &Shape {
        &self.update_data
    }

    /// Columns exposed in results, in order
    pub fn return_columns(&self) -> &[String] {
        &self.return_columns
    }

    pub fn id_shape(&self) -> &Shape {
        &self.id
    }

    pub fn id_fields(&self) -> Vec<&str> {
        self.id.field_names()
    }

    pub fn user_id_shape(&self) -> &Shape {
        &self.user_id
    }

    /// The ownership column, if one is configured
    pub fn user_id_field(&self) -> Option<&str> {
        self.user_id.fields().first().map(|f| f.name.as_str())
    }

    pub fn filter_fields(&self) -> Option<&[String]> {
        self.filters.as_deref()
    }

    pub fn ordering_fields(&self) -> Option<&[String]> {
        self.ordering.as_deref()
    }

    pub fn pagination_enabled(&self) -> bool {
        self.pagination
    }

    // ========================================================================
    // Input Validation
    // ========================================================================

    /// Validate one record against the create shape
    pub fn validate_create(&self, context: &str, data: &Value) -> Result<Row> {
        self.create_data.validate(context, "data", data)
    }

    /// Validate a list of records against the create shape
    pub fn validate_create_many(&self, context: &str, data: &Value) -> Result<Vec<Row>> {
        let Some(records) = data.as_array() else {
            return Err(QueryError::invalid(context, "data", "expected an array of records"));
        };

        let mut issues = Vec::new();
        let mut rows = Vec::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            if let Some(row) = self.create_data.check(&format!("data[{}]", i), record, &mut issues) {
                rows.push(row);
            }
        }

        if issues.is_empty() {
            Ok(rows)
        } else {
            Err(QueryError::validation(context, issues))
        }
    }

    /// Validate update data; every field is optional
    pub fn validate_update(&self, context: &str, data: &Value) -> Result<Row> {
        self.update_data.validate(context, "data", data)
    }

    /// Check that a row about to be inserted carries every required column
    pub fn validate_insert_row(&self, context: &str, path: &str, row: &Row) -> Result<()> {
        let issues: Vec<ValidationIssue> = self
            .table
            .columns
            .iter()
            .filter(|c| c.is_required_on_insert())
            .filter(|c| row.get(&c.name).is_none_or(Value::is_null))
            .map(|c| ValidationIssue::new(format!("{}.{}", path, c.name), "required column is missing"))
            .collect();

        if issues.is_empty() {
            Ok(())
        } else {
            Err(QueryError::validation(context, issues))
        }
    }

    /// Parse `getMany` filters
    ///
    /// Accepts an object mapping field names either to a value (equality) or
    /// to `{"op": .., "value": ..}`.
    pub fn parse_filters(&self, context: &str, filters: Option<&Value>) -> Result<Vec<Filter>> {
        let Some(filters) = filters.filter(|v| !v.is_null()) else {
            return Ok(Vec::new());
        };
        let Some(allowed) = &self.filters else {
            return Err(QueryError::invalid(context, "filters", "filtering is not enabled"));
        };
        let Some(object) = filters.as_object() else {
            return Err(QueryError::invalid(context, "filters", "expected an object"));
        };

        let mut issues = Vec::new();
        let mut parsed = Vec::with_capacity(object.len());
        for (field, condition) in object {
            let path = format!("filters.{}", field);
            if !allowed.iter().any(|f| f == field) {
                issues.push(ValidationIssue::new(path, "filtering is not enabled for this field"));
                continue;
            }

            let filter = match condition {
                Value::Object(map) if map.contains_key("op") => {
                    let mut with_field = map.clone();
                    with_field.insert("field".to_string(), Value::String(field.clone()));
                    match serde_json::from_value::<Filter>(Value::Object(with_field)) {
                        Ok(f) => f,
                        Err(e) => {
                            issues.push(ValidationIssue::new(path, e.to_string()));
                            continue;
                        }
                    }
                }
                value => Filter::eq(field.clone(), value.clone()),
            };

            if let Some(message) = self.check_filter_value(&filter) {
                issues.push(ValidationIssue::new(path, message));
                continue;
            }
            parsed.push(filter);
        }

        if issues.is_empty() {
            Ok(parsed)
        } else {
            Err(QueryError::validation(context, issues))
        }
    }

    fn check_filter_value(&self, filter: &Filter) -> Option<String> {
        let column = self.table.column(&filter.field)?;
        match filter.op {
            FilterOp::IsNull | FilterOp::IsNotNull => None,
            FilterOp::Like | FilterOp::Ilike => {
                (!filter.value.is_string()).then(|| "expected a string pattern".to_string())
            }
            FilterOp::In | FilterOp::NotIn => match filter.value.as_array() {
                None => Some("expected an array of values".to_string()),
                Some(values) => values
                    .iter()
                    .find_map(|v| column.column_type.validate_value(v).err()),
            },
            FilterOp::Eq | FilterOp::Ne => column.column_type.validate_value(&filter.value).err(),
        }
    }

    /// Check caller ordering against the enabled ordering columns
    pub fn validate_order_by(&self, context: &str, order_by: &[OrderBy]) -> Result<()> {
        if order_by.is_empty() {
            return Ok(());
        }
        let Some(allowed) = &self.ordering else {
            return Err(QueryError::invalid(context, "orderBy", "ordering is not enabled"));
        };

        let issues: Vec<ValidationIssue> = order_by
            .iter()
            .enumerate()
            .filter(|(_, o)| !allowed.contains(&o.field))
            .map(|(i, o)| {
                ValidationIssue::new(
                    format!("orderBy[{}].field", i),
                    format!("ordering by '{}' is not enabled", o.field),
                )
            })
            .collect();

        if issues.is_empty() {
            Ok(())
        } else {
            Err(QueryError::validation(context, issues))
        }
    }

    pub fn validate_pagination(&self, context: &str, pagination: &Pagination) -> Result<()> {
        if !self.pagination {
            return Err(QueryError::invalid(context, "pagination", "pagination is not enabled"));
        }
        let mut issues = Vec::new();
        if pagination.page < 1 {
            issues.push(ValidationIssue::new("pagination.page", "must be at least 1"));
        }
        if pagination.page_size < 1 {
            issues.push(ValidationIssue::new("pagination.pageSize", "must be at least 1"));
        }
        if issues.is_empty() {
            Ok(())
        } else {
            Err(QueryError::validation(context, issues))
        }
    }
}
