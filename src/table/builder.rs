//! Fluent builder for [`TableConfig`]
//!
//! Every method consumes the builder and returns a new one. Methods that take
//! field names check them immediately and return a configuration error for
//! anything the table (or the current base shape) does not have.

use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::trace;

use super::{Keyed, TableConfig, Unkeyed};
use crate::error::{QueryError, Result};
use crate::shape::Shape;
use crate::types::TableDefinition;

/// Builder for [`TableConfig`]
///
/// The type parameter records whether identity columns are configured; only a
/// `TableConfigBuilder<Keyed>` builds a config that by-id queries accept.
#[derive(Debug, Clone)]
pub struct TableConfigBuilder<K = Unkeyed> {
    config: TableConfig<K>,
}

impl TableConfigBuilder<Unkeyed> {
    /// Start from a table definition
    ///
    /// Defaults: every non-system column is writable, updates are partial,
    /// every column is returned, no identity or owner columns, no `getMany`
    /// extensions.
    pub fn new(table: TableDefinition) -> Self {
        let base = Shape::insert_of(&table);
        let return_columns = table.columns.iter().map(|c| c.name.clone()).collect();
        Self {
            config: TableConfig {
                create_data: base.clone(),
                update_data: base.partial(),
                base,
                return_columns,
                id: Shape::empty(),
                user_id: Shape::empty(),
                filters: None,
                ordering: None,
                pagination: false,
                table: Arc::new(table),
                _key: PhantomData,
            },
        }
    }
}

impl<K> TableConfigBuilder<K> {
    fn map(mut self, f: impl FnOnce(&mut TableConfig<K>)) -> Self {
        f(&mut self.config);
        self
    }

    /// Table column names, rejecting unknown names and duplicates
    fn columns<'a>(&self, what: &str, fields: &[&'a str]) -> Result<Vec<&'a str>> {
        let mut seen = HashSet::new();
        for field in fields {
            if !self.config.table.has_column(field) {
                return Err(QueryError::config(format!(
                    "{}: column '{}' does not exist in table '{}'",
                    what, field, self.config.table.name
                )));
            }
            if !seen.insert(*field) {
                return Err(QueryError::config(format!(
                    "{}: column '{}' is listed more than once",
                    what, field
                )));
            }
        }
        Ok(fields.to_vec())
    }

    fn non_empty(what: &str, fields: &[&str]) -> Result<()> {
        if fields.is_empty() {
            return Err(QueryError::config(format!("{} requires at least one field", what)));
        }
        Ok(())
    }

    // ========================================================================
    // Identity & Ownership
    // ========================================================================

    /// Designate the identity columns; composite keys are supported
    pub fn set_ids(self, fields: &[&str]) -> Result<TableConfigBuilder<Keyed>> {
        Self::non_empty("set_ids", fields)?;
        let fields = self.columns("set_ids", fields)?;
        let id = Shape::required_columns(&self.config.table, &fields)?;
        trace!(table = %self.config.table.name, ids = ?fields, "Configured identity columns");

        let mut config = self.config.rekey::<Keyed>();
        config.id = id;
        Ok(TableConfigBuilder { config })
    }

    /// Drop the identity columns
    pub fn remove_ids(self) -> TableConfigBuilder<Unkeyed> {
        let mut config = self.config.rekey::<Unkeyed>();
        config.id = Shape::empty();
        TableConfigBuilder { config }
    }

    /// Designate the ownership column
    ///
    /// The column is removed from every writable shape; its value always comes
    /// from the query input's `userId`.
    pub fn set_user_id(self, field: &str) -> Result<Self> {
        self.columns("set_user_id", &[field])?;
        let user_id = Shape::required_columns(&self.config.table, &[field])?;
        Ok(self.map(|c| {
            c.user_id = user_id;
            c.base = c.base.without(&[field]);
            c.create_data = c.create_data.without(&[field]);
            c.update_data = c.update_data.without(&[field]);
        }))
    }

    /// Clear the ownership column
    ///
    /// A writable owner column goes back into the base, insert and update
    /// shapes it was removed from.
    pub fn remove_user_id(self) -> Self {
        self.map(|c| {
            let Some(owner) = c.user_id.fields().first().map(|f| f.name.clone()) else {
                return;
            };
            let all = Shape::insert_of(&c.table);
            let restore = |shape: &Shape, all: &Shape| {
                all.retain(|f| f.name == owner || shape.contains(&f.name))
            };
            c.base = restore(&c.base, &all);
            c.create_data = restore(&c.create_data, &all);
            c.update_data = restore(&c.update_data, &all.partial());
            c.user_id = Shape::empty();
        })
    }

    // ========================================================================
    // Writable Fields
    // ========================================================================

    /// Narrow the base shape and use it for both inserts and updates
    pub fn restrict_upsert_fields(self, fields: &[&str]) -> Result<Self> {
        let base = self.config.base.pick(fields)?;
        Ok(self.map(|c| {
            c.create_data = base.clone();
            c.update_data = base.partial();
            c.base = base;
        }))
    }

    /// Narrow the fields accepted on insert
    pub fn restrict_insert_fields(self, fields: &[&str]) -> Result<Self> {
        let create_data = self.config.base.pick(fields)?;
        Ok(self.map(|c| c.create_data = create_data))
    }

    /// Narrow the fields accepted on update
    pub fn restrict_update_fields(self, fields: &[&str]) -> Result<Self> {
        let update_data = self.config.base.pick(fields)?.partial();
        Ok(self.map(|c| c.update_data = update_data))
    }

    /// Narrow the base shape; insert and update shapes drop whatever the new
    /// base no longer has
    pub fn pick_base_schema(self, fields: &[&str]) -> Result<Self> {
        let base = self.config.base.pick(fields)?;
        Ok(self.map(|c| {
            c.create_data = c.create_data.retain(|f| base.contains(&f.name));
            c.update_data = c.update_data.retain(|f| base.contains(&f.name));
            c.base = base;
        }))
    }

    /// Remove fields from the base shape and reset insert and update shapes to it
    pub fn omit_base_schema(self, fields: &[&str]) -> Result<Self> {
        let base = self.config.base.omit(fields)?;
        Ok(self.map(|c| {
            c.create_data = base.clone();
            c.update_data = base.partial();
            c.base = base;
        }))
    }

    /// Make every non-system column writable again
    pub fn allow_all_fields(self) -> Self {
        self.map(|c| {
            let mut base = Shape::insert_of(&c.table);
            if let Some(owner) = c.user_id.fields().first() {
                base = base.without(&[owner.name.as_str()]);
            }
            c.create_data = base.clone();
            c.update_data = base.partial();
            c.base = base;
        })
    }

    // ========================================================================
    // Results
    // ========================================================================

    /// Limit the columns returned by every query
    pub fn restrict_return_columns(self, fields: &[&str]) -> Result<Self> {
        Self::non_empty("restrict_return_columns", fields)?;
        let fields = self.columns("restrict_return_columns", fields)?;
        let return_columns = fields.iter().map(|f| f.to_string()).collect();
        Ok(self.map(|c| c.return_columns = return_columns))
    }

    // ========================================================================
    // getMany Extensions
    // ========================================================================

    pub fn enable_pagination(self) -> Self {
        self.map(|c| c.pagination = true)
    }

    /// Allow `orderBy` on the given columns
    pub fn enable_ordering(self, columns: &[&str]) -> Result<Self> {
        Self::non_empty("enable_ordering", columns)?;
        let columns = self.columns("enable_ordering", columns)?;
        let ordering = columns.iter().map(|f| f.to_string()).collect();
        Ok(self.map(|c| c.ordering = Some(ordering)))
    }

    /// Allow `filters` on the given columns
    pub fn enable_filtering(self, fields: &[&str]) -> Result<Self> {
        Self::non_empty("enable_filtering", fields)?;
        let fields = self.columns("enable_filtering", fields)?;
        let filters = fields.iter().map(|f| f.to_string()).collect();
        Ok(self.map(|c| c.filters = Some(filters)))
    }

    /// Freeze the configuration
    pub fn build(self) -> TableConfig<K> {
        self.config
    }
}
