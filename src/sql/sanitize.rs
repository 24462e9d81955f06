//! SQL identifier quoting and validation
//!
//! Table and column names are interpolated into generated SQL, so every name
//! is validated when a table is defined and quoted when it is rendered.

use std::sync::LazyLock;

use regex::Regex;

/// PostgreSQL reserved keywords that are rejected as table or column names
pub const POSTGRES_RESERVED_WORDS: &[&str] = &[
    "ALL", "ANALYSE", "ANALYZE", "AND", "ANY", "ARRAY", "AS", "ASC", "ASYMMETRIC", "BOTH",
    "CASE", "CAST", "CHECK", "COLLATE", "COLUMN", "CONSTRAINT", "CREATE", "CURRENT_CATALOG",
    "CURRENT_DATE", "CURRENT_ROLE", "CURRENT_TIME", "CURRENT_TIMESTAMP", "CURRENT_USER",
    "DEFAULT", "DEFERRABLE", "DESC", "DISTINCT", "DO", "ELSE", "END", "EXCEPT", "FALSE",
    "FETCH", "FOR", "FOREIGN", "FROM", "GRANT", "GROUP", "HAVING", "IN", "INITIALLY",
    "INTERSECT", "INTO", "LATERAL", "LEADING", "LIMIT", "LOCALTIME", "LOCALTIMESTAMP", "NOT",
    "NULL", "OFFSET", "ON", "ONLY", "OR", "ORDER", "PLACING", "PRIMARY", "REFERENCES",
    "RETURNING", "SELECT", "SESSION_USER", "SOME", "SYMMETRIC", "TABLE", "THEN", "TO",
    "TRAILING", "TRUE", "UNION", "UNIQUE", "USER", "USING", "VARIADIC", "WHEN", "WHERE",
    "WINDOW", "WITH",
];

static IDENTIFIER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("identifier pattern is valid"));

/// Quote a SQL identifier, doubling any embedded quotes
///
/// ```
/// use feature_query::sql::quote_identifier;
///
/// assert_eq!(quote_identifier("tag"), "\"tag\"");
/// ```
pub fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Validate a table or column name
///
/// Names must start with a lowercase letter, contain only lowercase letters,
/// digits and underscores, and must not be a reserved keyword or one of
/// `reserved_columns`.
///
/// ```
/// use feature_query::sql::validate_identifier;
///
/// assert!(validate_identifier("tag_color", &[]).is_ok());
/// assert!(validate_identifier("order", &[]).is_err());
/// assert!(validate_identifier("id", &["id"]).is_err());
/// ```
pub fn validate_identifier(name: &str, reserved_columns: &[&str]) -> Result<(), String> {
    if name.is_empty() {
        return Err("Identifier cannot be empty".to_string());
    }

    if !IDENTIFIER_PATTERN.is_match(name) {
        return Err(format!(
            "Identifier '{}' is invalid. Must start with a lowercase letter and contain only lowercase letters, numbers, and underscores.",
            name
        ));
    }

    if POSTGRES_RESERVED_WORDS.contains(&name.to_uppercase().as_str()) {
        return Err(format!(
            "Identifier '{}' is a PostgreSQL reserved keyword and cannot be used.",
            name
        ));
    }

    if reserved_columns.contains(&name) {
        return Err(format!("Column name '{}' is reserved and cannot be used.", name));
    }

    Ok(())
}
