//! Identifier lists
//!
//! Every standard query scopes its table operation with an ordered list of
//! equality predicates. The list is always assembled here, in this order:
//! default filters, then identity values, then the ownership value.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{QueryError, Result, ValidationIssue};
use crate::table::TableConfig;

/// An equality predicate `field = value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identifier {
    pub field: String,
    pub value: Value,
}

impl Identifier {
    pub fn new(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Evaluate against an in-memory row; a missing column reads as null
    pub fn matches(&self, row: &crate::types::Row) -> bool {
        let actual = row.get(&self.field).unwrap_or(&Value::Null);
        crate::operations::values_equal(actual, &self.value)
    }
}

/// Where the identity part of an identifier list comes from
#[derive(Debug, Clone, Copy)]
pub enum IdSource<'a> {
    /// The operation is not scoped by identity (`getMany`)
    Unused,
    /// The caller's `ids` input, which must be present and complete
    Input(Option<&'a Value>),
}

/// Build the identifier list for one query execution
///
/// Fails with [`QueryError::MissingIdentifier`] when `ids` is required but
/// absent or empty, or when an owner column is configured and `user_id` is
/// absent. A `user_id` given without an owner column is ignored.
pub fn build_identifiers<K>(
    operation: &str,
    config: &TableConfig<K>,
    default_filters: &[Identifier],
    ids: IdSource<'_>,
    user_id: Option<&Value>,
) -> Result<Vec<Identifier>> {
    let mut identifiers = default_filters.to_vec();

    if let IdSource::Input(ids) = ids {
        identifiers.extend(id_identifiers(operation, config, ids)?);
    }

    if let Some(owner) = config.user_id_field() {
        let value = match user_id {
            Some(v) if !v.is_null() => v,
            _ => return Err(QueryError::missing_identifier(operation, "userId")),
        };
        if let Some(rule) = config.user_id_shape().field(owner) {
            rule.column_type
                .validate_value(value)
                .map_err(|msg| QueryError::invalid(format!("{} input", operation), "userId", msg))?;
        }
        identifiers.push(Identifier::new(owner, value.clone()));
    }

    Ok(identifiers)
}

fn id_identifiers<K>(
    operation: &str,
    config: &TableConfig<K>,
    ids: Option<&Value>,
) -> Result<Vec<Identifier>> {
    let id_shape = config.id_shape();
    let context = format!("{} input", operation);

    let ids = match ids {
        None | Some(Value::Null) => return Err(QueryError::missing_identifier(operation, "ids")),
        Some(Value::Object(map)) if map.is_empty() => {
            return Err(QueryError::missing_identifier(operation, "ids"));
        }
        Some(Value::Object(map)) => map,
        // A bare value is accepted for single-column keys
        Some(scalar) if id_shape.len() == 1 => {
            let rule = &id_shape.fields()[0];
            rule.column_type
                .validate_value(scalar)
                .map_err(|msg| QueryError::invalid(&context, "ids", msg))?;
            return Ok(vec![Identifier::new(rule.name.clone(), scalar.clone())]);
        }
        Some(_) => {
            return Err(QueryError::invalid(
                context,
                "ids",
                "expected an object of id fields",
            ));
        }
    };

    let mut issues = Vec::new();
    for key in ids.keys() {
        if !id_shape.contains(key) {
            issues.push(ValidationIssue::new(format!("ids.{}", key), "unknown id field"));
        }
    }

    let mut identifiers = Vec::with_capacity(id_shape.len());
    for rule in id_shape.fields() {
        match ids.get(&rule.name) {
            None | Some(Value::Null) => {
                return Err(QueryError::missing_identifier(
                    operation,
                    format!("ids.{}", rule.name),
                ));
            }
            Some(value) => {
                if let Err(msg) = rule.column_type.validate_value(value) {
                    issues.push(ValidationIssue::new(format!("ids.{}", rule.name), msg));
                }
                identifiers.push(Identifier::new(rule.name.clone(), value.clone()));
            }
        }
    }

    if !issues.is_empty() {
        return Err(QueryError::validation(context, issues));
    }
    Ok(identifiers)
}
