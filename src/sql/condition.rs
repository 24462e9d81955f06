//! Condition building for SQL WHERE, ORDER BY and LIMIT clauses
//!
//! Turns an identifier list plus caller filters into a parameterized WHERE
//! clause. Placeholders are numbered from a caller-owned offset so clauses can
//! be appended to statements that already bind values (e.g. `UPDATE .. SET`).

use serde_json::Value;

use crate::identifier::Identifier;
use crate::operations::{Filter, FilterOp, OrderBy, Pagination};
use crate::sql::sanitize::quote_identifier;

/// A value to bind for a generated placeholder
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    /// Bound with the declared type of `column`
    Column { column: String, value: Value },
    /// Bound as TEXT (pattern matches compare `column::text`)
    Text(String),
}

impl SqlParam {
    fn column(column: &str, value: &Value) -> Self {
        SqlParam::Column {
            column: column.to_string(),
            value: value.clone(),
        }
    }
}

/// Build a WHERE condition from identifiers and filters, all joined with AND
///
/// Returns `TRUE` when there is nothing to constrain. Null-valued identifiers
/// render as `IS NULL`.
///
/// # Arguments
/// * `identifiers` - Equality predicates, rendered first and in order
/// * `filters` - Caller filters, rendered after the identifiers
/// * `param_offset` - Next placeholder number (mutated to track next available)
pub fn build_where_clause(
    identifiers: &[Identifier],
    filters: &[Filter],
    param_offset: &mut usize,
) -> Result<(String, Vec<SqlParam>), String> {
    let mut clauses = Vec::new();
    let mut params = Vec::new();

    for identifier in identifiers {
        let column = quote_identifier(&identifier.field);
        if identifier.value.is_null() {
            clauses.push(format!("{} IS NULL", column));
        } else {
            clauses.push(format!("{} = ${}", column, next(param_offset)));
            params.push(SqlParam::column(&identifier.field, &identifier.value));
        }
    }

    for filter in filters {
        let (clause, mut filter_params) = build_filter_clause(filter, param_offset)?;
        clauses.push(clause);
        params.append(&mut filter_params);
    }

    if clauses.is_empty() {
        return Ok(("TRUE".to_string(), params));
    }
    Ok((clauses.join(" AND "), params))
}

fn next(param_offset: &mut usize) -> usize {
    let current = *param_offset;
    *param_offset += 1;
    current
}

fn build_filter_clause(
    filter: &Filter,
    param_offset: &mut usize,
) -> Result<(String, Vec<SqlParam>), String> {
    let column = quote_identifier(&filter.field);
    let mut params = Vec::new();

    let clause = match filter.op {
        FilterOp::IsNull => format!("{} IS NULL", column),
        FilterOp::IsNotNull => format!("{} IS NOT NULL", column),
        FilterOp::Eq | FilterOp::Ne if filter.value.is_null() => {
            let op = if filter.op == FilterOp::Eq { "IS NULL" } else { "IS NOT NULL" };
            format!("{} {}", column, op)
        }
        FilterOp::Eq | FilterOp::Ne => {
            let op = if filter.op == FilterOp::Eq { "=" } else { "!=" };
            params.push(SqlParam::column(&filter.field, &filter.value));
            format!("{} {} ${}", column, op, next(param_offset))
        }
        FilterOp::Like | FilterOp::Ilike => {
            let pattern = filter
                .value
                .as_str()
                .ok_or_else(|| format!("{:?} filter on '{}' requires a string value", filter.op, filter.field))?;
            let op = if filter.op == FilterOp::Like { "LIKE" } else { "ILIKE" };
            params.push(SqlParam::Text(format!("%{}%", escape_like(pattern))));
            format!("{}::text {} ${}", column, op, next(param_offset))
        }
        FilterOp::In | FilterOp::NotIn => {
            let values = filter
                .value
                .as_array()
                .ok_or_else(|| format!("{:?} filter on '{}' requires an array value", filter.op, filter.field))?;
            if values.is_empty() {
                // Nothing is in the empty set
                let constant = if filter.op == FilterOp::In { "FALSE" } else { "TRUE" };
                return Ok((constant.to_string(), params));
            }
            let placeholders: Vec<String> = values
                .iter()
                .map(|v| {
                    params.push(SqlParam::column(&filter.field, v));
                    format!("${}", next(param_offset))
                })
                .collect();
            let op = if filter.op == FilterOp::In { "IN" } else { "NOT IN" };
            format!("{} {} ({})", column, op, placeholders.join(", "))
        }
    };

    Ok((clause, params))
}

/// Escape LIKE wildcards so filter values match literally
fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Build an ORDER BY clause (without the keyword); empty when there is no ordering
pub fn build_order_by_clause(order_by: &[OrderBy]) -> String {
    order_by
        .iter()
        .map(|o| format!("{} {}", quote_identifier(&o.field), o.direction.as_sql()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Build a `LIMIT .. OFFSET ..` clause for a page
pub fn build_limit_clause(pagination: &Pagination) -> String {
    format!("LIMIT {} OFFSET {}", pagination.limit(), pagination.offset())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // =========================================================================
    // WHERE Clause Tests
    // =========================================================================

    #[test]
    fn test_empty_where_is_true() {
        let mut offset = 1;
        let (clause, params) = build_where_clause(&[], &[], &mut offset).unwrap();
        assert_eq!(clause, "TRUE");
        assert!(params.is_empty());
        assert_eq!(offset, 1);
    }

    #[test]
    fn test_identifiers_in_order() {
        let identifiers = vec![
            Identifier::new("is_active", true),
            Identifier::new("id", "abc"),
            Identifier::new("user_id", "u1"),
        ];
        let mut offset = 1;
        let (clause, params) = build_where_clause(&identifiers, &[], &mut offset).unwrap();
        assert_eq!(
            clause,
            "\"is_active\" = $1 AND \"id\" = $2 AND \"user_id\" = $3"
        );
        assert_eq!(params.len(), 3);
        assert_eq!(
            params[1],
            SqlParam::Column {
                column: "id".to_string(),
                value: json!("abc")
            }
        );
        assert_eq!(offset, 4);
    }

    #[test]
    fn test_null_identifier_is_null_check() {
        let mut offset = 1;
        let (clause, params) =
            build_where_clause(&[Identifier::new("deleted_at", Value::Null)], &[], &mut offset)
                .unwrap();
        assert_eq!(clause, "\"deleted_at\" IS NULL");
        assert!(params.is_empty());
    }

    #[test]
    fn test_offset_continues_from_caller() {
        let mut offset = 3;
        let (clause, _) =
            build_where_clause(&[Identifier::new("id", "x")], &[], &mut offset).unwrap();
        assert_eq!(clause, "\"id\" = $3");
        assert_eq!(offset, 4);
    }

    // =========================================================================
    // Filter Tests
    // =========================================================================

    #[test]
    fn test_like_filters_bind_text_pattern() {
        let mut offset = 1;
        let filters = vec![Filter::new("name", FilterOp::Ilike, "gro_c")];
        let (clause, params) = build_where_clause(&[], &filters, &mut offset).unwrap();
        assert_eq!(clause, "\"name\"::text ILIKE $1");
        assert_eq!(params, vec![SqlParam::Text("%gro\\_c%".to_string())]);
    }

    #[test]
    fn test_like_requires_string() {
        let mut offset = 1;
        let filters = vec![Filter::new("name", FilterOp::Like, 5)];
        assert!(build_where_clause(&[], &filters, &mut offset).is_err());
    }

    #[test]
    fn test_in_filter_expands_placeholders() {
        let mut offset = 2;
        let filters = vec![Filter::new("color", FilterOp::In, json!(["#000", "#fff"]))];
        let (clause, params) = build_where_clause(&[], &filters, &mut offset).unwrap();
        assert_eq!(clause, "\"color\" IN ($2, $3)");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_empty_in_lists() {
        let mut offset = 1;
        let (clause, _) = build_where_clause(
            &[],
            &[Filter::new("color", FilterOp::In, json!([]))],
            &mut offset,
        )
        .unwrap();
        assert_eq!(clause, "FALSE");

        let (clause, _) = build_where_clause(
            &[],
            &[Filter::new("color", FilterOp::NotIn, json!([]))],
            &mut offset,
        )
        .unwrap();
        assert_eq!(clause, "TRUE");
    }

    #[test]
    fn test_null_and_ne_filters() {
        let mut offset = 1;
        let filters = vec![
            Filter::new("note", FilterOp::IsNull, Value::Null),
            Filter::new("color", FilterOp::Ne, Value::Null),
            Filter::new("name", FilterOp::Ne, "x"),
        ];
        let (clause, params) = build_where_clause(&[], &filters, &mut offset).unwrap();
        assert_eq!(
            clause,
            "\"note\" IS NULL AND \"color\" IS NOT NULL AND \"name\" != $1"
        );
        assert_eq!(params.len(), 1);
    }

    // =========================================================================
    // ORDER BY / LIMIT Tests
    // =========================================================================

    #[test]
    fn test_order_by_clause() {
        let order = vec![OrderBy::asc("name"), OrderBy::desc("created_at")];
        assert_eq!(
            build_order_by_clause(&order),
            "\"name\" ASC, \"created_at\" DESC"
        );
        assert_eq!(build_order_by_clause(&[]), "");
    }

    #[test]
    fn test_limit_clause() {
        assert_eq!(
            build_limit_clause(&Pagination::new(3, 25)),
            "LIMIT 25 OFFSET 50"
        );
    }
}
