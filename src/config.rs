//! Configuration for table operations and standard queries
//!
//! Provides builder patterns for configuring the PostgreSQL table operations
//! and the defaults applied by the standard query set.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{QueryError, Result};
use crate::identifier::Identifier;
use crate::operations::OrderBy;
use crate::types::{Row, TableDefinition};

/// Page size used by `getMany` when the caller does not paginate
pub const DEFAULT_PAGE_SIZE: u32 = 25;

/// How `remove_record` treats matching rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum RemovalPolicy {
    /// Delete the rows
    Hard,
    /// Flip a flag column to its removed value
    Soft { column: String, removed_value: Value },
}

impl Default for RemovalPolicy {
    fn default() -> Self {
        Self::soft("is_active")
    }
}

impl RemovalPolicy {
    /// Soft delete by setting a boolean column to `false`
    pub fn soft(column: impl Into<String>) -> Self {
        Self::Soft {
            column: column.into(),
            removed_value: Value::Bool(false),
        }
    }

    /// Fall back to a hard delete when the soft-delete column does not exist
    pub fn resolve(&self, table: &TableDefinition) -> RemovalPolicy {
        match self {
            Self::Soft { column, .. } if !table.has_column(column) => Self::Hard,
            other => other.clone(),
        }
    }
}

// ============================================================================
// Store Configuration
// ============================================================================

/// Configuration for the PostgreSQL table operations
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// PostgreSQL database URL
    pub database_url: String,
    /// Maximum number of pooled connections (default: 5)
    pub max_connections: u32,
    /// Removal behavior (default: soft delete on `is_active`)
    pub removal: RemovalPolicy,
    /// Whether updates and soft deletes set `updated_at` when the column exists
    pub touch_updated_at: bool,
}

impl StoreConfig {
    /// Create a new configuration builder
    pub fn builder(database_url: impl Into<String>) -> StoreConfigBuilder {
        StoreConfigBuilder::new(database_url)
    }
}

/// Builder for StoreConfig
#[derive(Debug)]
pub struct StoreConfigBuilder {
    database_url: String,
    max_connections: u32,
    removal: RemovalPolicy,
    touch_updated_at: bool,
}

impl StoreConfigBuilder {
    /// Create a new builder with the database URL
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 5,
            removal: RemovalPolicy::default(),
            touch_updated_at: true,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the removal policy
    pub fn removal(mut self, policy: RemovalPolicy) -> Self {
        self.removal = policy;
        self
    }

    /// Soft delete using the given flag column
    pub fn soft_delete_column(mut self, column: impl Into<String>) -> Self {
        self.removal = RemovalPolicy::soft(column);
        self
    }

    /// Delete rows instead of flagging them
    pub fn hard_delete(mut self) -> Self {
        self.removal = RemovalPolicy::Hard;
        self
    }

    /// Enable or disable `updated_at` maintenance (default: true)
    pub fn touch_updated_at(mut self, enabled: bool) -> Self {
        self.touch_updated_at = enabled;
        self
    }

    /// Build the configuration
    pub fn build(self) -> StoreConfig {
        StoreConfig {
            database_url: self.database_url,
            max_connections: self.max_connections,
            removal: self.removal,
            touch_updated_at: self.touch_updated_at,
        }
    }
}

// ============================================================================
// Standard Query Configuration
// ============================================================================

/// `getMany` defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetManyConfig {
    /// Ordering applied when the caller gives none
    #[serde(default)]
    pub default_ordering: Vec<OrderBy>,
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for GetManyConfig {
    fn default() -> Self {
        Self {
            default_ordering: Vec::new(),
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Options shared by every standard query of a feature
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardQueryConfig {
    /// Equality filters prepended to every identifier list (e.g. `is_active = true`)
    #[serde(default)]
    pub default_filters: Row,
    #[serde(default)]
    pub get_many: GetManyConfig,
}

impl StandardQueryConfig {
    pub fn builder() -> StandardQueryConfigBuilder {
        StandardQueryConfigBuilder::default()
    }

    /// Default filters as identifiers, checked against the table
    pub fn default_identifiers(&self, table: &TableDefinition) -> Result<Vec<Identifier>> {
        self.default_filters
            .iter()
            .map(|(field, value)| {
                let column = table.column(field).ok_or_else(|| {
                    QueryError::config(format!(
                        "Default filter column '{}' does not exist in table '{}'",
                        field, table.name
                    ))
                })?;
                column.column_type.validate_value(value).map_err(|msg| {
                    QueryError::config(format!("Default filter '{}': {}", field, msg))
                })?;
                Ok(Identifier::new(field.clone(), value.clone()))
            })
            .collect()
    }

    /// Check the default ordering against the table
    pub fn validate(&self, table: &TableDefinition) -> Result<()> {
        self.default_identifiers(table)?;
        if let Some(order) = self
            .get_many
            .default_ordering
            .iter()
            .find(|o| !table.has_column(&o.field))
        {
            return Err(QueryError::config(format!(
                "Default ordering column '{}' does not exist in table '{}'",
                order.field, table.name
            )));
        }
        if self.get_many.default_page_size == 0 {
            return Err(QueryError::config("Default page size must be at least 1"));
        }
        Ok(())
    }
}

/// Builder for StandardQueryConfig
#[derive(Debug, Default)]
pub struct StandardQueryConfigBuilder {
    config: StandardQueryConfig,
}

impl StandardQueryConfigBuilder {
    /// Add an equality filter applied to every standard query
    pub fn default_filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.default_filters.insert(field.into(), value.into());
        self
    }

    /// Only return rows whose `is_active` flag is set
    pub fn active_only(self) -> Self {
        self.default_filter("is_active", true)
    }

    /// Append a default ordering term for `getMany`
    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.config.get_many.default_ordering.push(order);
        self
    }

    /// Set the `getMany` page size (default: 25)
    pub fn default_page_size(mut self, size: u32) -> Self {
        self.config.get_many.default_page_size = size;
        self
    }

    pub fn build(self) -> StandardQueryConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnDefinition, ColumnType};
    use serde_json::json;

    fn table() -> TableDefinition {
        TableDefinition::new(
            "tag",
            vec![
                ColumnDefinition::new("id", ColumnType::Uuid).primary_key(),
                ColumnDefinition::new("name", ColumnType::String),
                ColumnDefinition::new("is_active", ColumnType::Boolean).default_value(true),
            ],
        )
        .unwrap()
    }

    // =========================================================================
    // StoreConfig Tests
    // =========================================================================

    #[test]
    fn test_default_store_config() {
        let config = StoreConfig::builder("postgres://localhost/test").build();

        assert_eq!(config.database_url, "postgres://localhost/test");
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.removal, RemovalPolicy::soft("is_active"));
        assert!(config.touch_updated_at);
    }

    #[test]
    fn test_builder_accepts_string() {
        let config = StoreConfig::builder(String::from("postgres://localhost/db")).build();
        assert_eq!(config.database_url, "postgres://localhost/db");
    }

    #[test]
    fn test_removal_options() {
        let config = StoreConfig::builder("postgres://localhost/test")
            .hard_delete()
            .build();
        assert_eq!(config.removal, RemovalPolicy::Hard);

        let config = StoreConfig::builder("postgres://localhost/test")
            .soft_delete_column("enabled")
            .touch_updated_at(false)
            .max_connections(1)
            .build();
        assert_eq!(config.removal, RemovalPolicy::soft("enabled"));
        assert!(!config.touch_updated_at);
        assert_eq!(config.max_connections, 1);
    }

    #[test]
    fn test_removal_policy_resolves_to_hard_without_column() {
        let table = table();
        assert_eq!(RemovalPolicy::default().resolve(&table), RemovalPolicy::soft("is_active"));
        assert_eq!(RemovalPolicy::soft("deleted").resolve(&table), RemovalPolicy::Hard);
    }

    #[test]
    fn test_removal_policy_serde() {
        let policy: RemovalPolicy =
            serde_json::from_str(r#"{"mode":"soft","column":"enabled","removed_value":false}"#)
                .unwrap();
        assert_eq!(policy, RemovalPolicy::soft("enabled"));
        let policy: RemovalPolicy = serde_json::from_str(r#"{"mode":"hard"}"#).unwrap();
        assert_eq!(policy, RemovalPolicy::Hard);
    }

    // =========================================================================
    // StandardQueryConfig Tests
    // =========================================================================

    #[test]
    fn test_standard_query_config_defaults() {
        let config = StandardQueryConfig::default();
        assert!(config.default_filters.is_empty());
        assert_eq!(config.get_many.default_page_size, DEFAULT_PAGE_SIZE);
        assert!(config.get_many.default_ordering.is_empty());
    }

    #[test]
    fn test_standard_query_config_builder() {
        let config = StandardQueryConfig::builder()
            .active_only()
            .order_by(OrderBy::asc("name"))
            .default_page_size(10)
            .build();
        assert_eq!(config.default_filters.get("is_active"), Some(&json!(true)));
        assert_eq!(config.get_many.default_ordering, vec![OrderBy::asc("name")]);
        assert_eq!(config.get_many.default_page_size, 10);
        assert!(config.validate(&table()).is_ok());
    }

    #[test]
    fn test_default_identifiers() {
        let config = StandardQueryConfig::builder().active_only().build();
        let ids = config.default_identifiers(&table()).unwrap();
        assert_eq!(ids, vec![Identifier::new("is_active", true)]);
    }

    #[test]
    fn test_validate_rejects_unknown_columns() {
        let config = StandardQueryConfig::builder().default_filter("deleted", false).build();
        assert!(matches!(config.validate(&table()), Err(QueryError::Config(_))));

        let config = StandardQueryConfig::builder().order_by(OrderBy::desc("rank")).build();
        assert!(config.validate(&table()).is_err());

        let config = StandardQueryConfig::builder().default_filter("is_active", "yes").build();
        assert!(config.validate(&table()).is_err());

        let config = StandardQueryConfig::builder().default_page_size(0).build();
        assert!(config.validate(&table()).is_err());
    }

    #[test]
    fn test_standard_query_config_deserialization() {
        let config: StandardQueryConfig = serde_json::from_str(
            r#"{"defaultFilters":{"is_active":true},"getMany":{"defaultOrdering":[{"field":"name","direction":"desc"}]}}"#,
        )
        .unwrap();
        assert_eq!(config.get_many.default_page_size, 25);
        assert_eq!(config.get_many.default_ordering, vec![OrderBy::desc("name")]);
    }
}
