//! Core type definitions for feature tables
//!
//! Includes column types, column definitions, and the table definition a
//! feature's configuration is derived from.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{QueryError, Result};
use crate::sql::sanitize::validate_identifier;

/// A single row, keyed by column name
pub type Row = serde_json::Map<String, Value>;

/// Columns that are always managed by the system and never part of the
/// client-writable base shape.
pub const SYSTEM_COLUMNS: &[&str] = &["id", "is_active", "created_at", "updated_at"];

// ============================================================================
// Column Types
// ============================================================================

/// Column type definition with validation rules
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ColumnType {
    /// Text field
    String,

    /// UUID stored natively, exchanged as a hyphenated string
    Uuid,

    /// 64-bit integer
    Integer,

    /// Decimal field with precision and scale
    Decimal {
        #[serde(default = "default_precision")]
        precision: u8,
        #[serde(default = "default_scale")]
        scale: u8,
    },

    Boolean,

    /// Timestamp, always UTC, exchanged as RFC 3339
    Timestamp,

    /// Arbitrary JSON
    Json,

    /// String restricted to a fixed set of values
    Enum { values: Vec<String> },
}

fn default_precision() -> u8 {
    19
}

fn default_scale() -> u8 {
    4
}

impl ColumnType {
    /// Create a Decimal type with specified precision and scale
    pub fn decimal(precision: u8, scale: u8) -> Self {
        ColumnType::Decimal { precision, scale }
    }

    /// Create an Enum type from a list of allowed values
    pub fn enumeration<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ColumnType::Enum {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Short name used in validation messages
    pub fn name(&self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Uuid => "uuid",
            ColumnType::Integer => "integer",
            ColumnType::Decimal { .. } => "decimal",
            ColumnType::Boolean => "boolean",
            ColumnType::Timestamp => "timestamp",
            ColumnType::Json => "json",
            ColumnType::Enum { .. } => "enum",
        }
    }

    /// Check that a JSON value can be stored in a column of this type
    ///
    /// Null is accepted here; nullability is a property of the field, not the type.
    /// Integers and decimals may also be given as numeric strings.
    pub fn validate_value(&self, value: &Value) -> std::result::Result<(), String> {
        let accepted = match (self, value) {
            (_, Value::Null) | (ColumnType::Json, _) => true,
            (ColumnType::String, Value::String(_)) => true,
            (ColumnType::Boolean, Value::Bool(_)) => true,
            (ColumnType::Integer, Value::Number(n)) => n.is_i64(),
            (ColumnType::Decimal { .. }, Value::Number(_)) => true,
            (ColumnType::Uuid, Value::String(s)) => {
                return uuid::Uuid::parse_str(s)
                    .map(drop)
                    .map_err(|_| format!("'{}' is not a valid uuid", s));
            }
            (ColumnType::Integer, Value::String(s)) => {
                return s
                    .parse::<i64>()
                    .map(drop)
                    .map_err(|_| format!("'{}' is not an integer", s));
            }
            (ColumnType::Decimal { .. }, Value::String(s)) => {
                return s
                    .parse::<rust_decimal::Decimal>()
                    .map(drop)
                    .map_err(|_| format!("'{}' is not a decimal", s));
            }
            (ColumnType::Timestamp, Value::String(s)) => {
                return chrono::DateTime::parse_from_rfc3339(s)
                    .map(drop)
                    .map_err(|e| format!("'{}' is not an RFC 3339 timestamp: {}", s, e));
            }
            (ColumnType::Enum { values }, Value::String(s)) => {
                if values.contains(s) {
                    return Ok(());
                }
                return Err(format!("'{}' is not one of {}", s, values.join(", ")));
            }
            _ => false,
        };

        if accepted {
            Ok(())
        } else {
            Err(format!("expected {}, got {}", self.name(), json_kind(value)))
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// Column Definitions
// ============================================================================

/// How a column gets its value when an insert omits it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ColumnDefault {
    /// A fixed value
    Literal(Value),
    /// A freshly generated v4 UUID
    Uuid,
    /// The current UTC time
    Now,
}

impl ColumnDefault {
    /// Produce the value for a new row
    pub fn generate(&self) -> Value {
        match self {
            ColumnDefault::Literal(v) => v.clone(),
            ColumnDefault::Uuid => Value::String(uuid::Uuid::new_v4().to_string()),
            ColumnDefault::Now => Value::String(chrono::Utc::now().to_rfc3339()),
        }
    }
}

fn default_nullable() -> bool {
    true
}

/// Column definition of a feature table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,

    #[serde(flatten)]
    pub column_type: ColumnType,

    #[serde(default = "default_nullable")]
    pub nullable: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<ColumnDefault>,

    #[serde(default)]
    pub primary_key: bool,

    /// Maintained by the store (timestamps, flags); never client-writable
    #[serde(default)]
    pub managed: bool,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            default: None,
            primary_key: false,
            managed: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(ColumnDefault::Literal(value.into()));
        self
    }

    pub fn default_uuid(mut self) -> Self {
        self.default = Some(ColumnDefault::Uuid);
        self
    }

    pub fn default_now(mut self) -> Self {
        self.default = Some(ColumnDefault::Now);
        self
    }

    /// Mark the column as (part of) the primary key; implies NOT NULL
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn managed(mut self) -> Self {
        self.managed = true;
        self
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Whether an insert must supply this column
    pub fn is_required_on_insert(&self) -> bool {
        !self.nullable && self.default.is_none()
    }

    /// System columns are excluded from the writable base shape
    pub fn is_system(&self) -> bool {
        self.primary_key || self.managed || SYSTEM_COLUMNS.contains(&self.name.as_str())
    }
}

// ============================================================================
// Table Definition
// ============================================================================

/// Description of a single relational table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
}

impl TableDefinition {
    /// Create a validated table definition
    ///
    /// Table and column names must be valid lowercase identifiers and column
    /// names must be unique.
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDefinition>) -> Result<Self> {
        let name = name.into();
        validate_identifier(&name, &[]).map_err(QueryError::config)?;

        if columns.is_empty() {
            return Err(QueryError::config(format!(
                "Table '{}' must define at least one column",
                name
            )));
        }

        let mut seen = std::collections::HashSet::new();
        for col in &columns {
            validate_identifier(&col.name, &[]).map_err(QueryError::config)?;
            if !seen.insert(col.name.as_str()) {
                return Err(QueryError::config(format!(
                    "Table '{}' defines column '{}' more than once",
                    name, col.name
                )));
            }
        }

        Ok(Self { name, columns })
    }

    /// Look up a column by name
    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Column names in definition order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn primary_key_columns(&self) -> Vec<&ColumnDefinition> {
        self.columns.iter().filter(|c| c.primary_key).collect()
    }
}
