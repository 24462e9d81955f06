//! Validation shapes
//!
//! A [`Shape`] is an ordered set of field rules derived from a table's
//! columns. Table configs narrow shapes with `pick`/`omit` and relax them with
//! `partial`; query inputs are checked with [`Shape::validate`].

use std::collections::HashSet;

use serde::Serialize;
use serde_json::Value;

use crate::error::{QueryError, Result, ValidationIssue};
use crate::types::{ColumnDefinition, ColumnType, Row, TableDefinition};

/// Validation rule for one field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldRule {
    pub name: String,
    pub column_type: ColumnType,
    /// Whether `null` is an accepted value
    pub nullable: bool,
    /// Whether the field may be left out
    pub optional: bool,
}

impl FieldRule {
    /// Rule for supplying a column on insert
    pub fn insertable(column: &ColumnDefinition) -> Self {
        Self {
            name: column.name.clone(),
            column_type: column.column_type.clone(),
            nullable: column.nullable,
            optional: !column.is_required_on_insert(),
        }
    }

    /// Rule for a column that must be given with a non-null value
    pub fn required_value(column: &ColumnDefinition) -> Self {
        Self {
            name: column.name.clone(),
            column_type: column.column_type.clone(),
            nullable: false,
            optional: false,
        }
    }
}

/// Ordered collection of field rules
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Shape {
    fields: Vec<FieldRule>,
}

impl Shape {
    pub fn new(fields: Vec<FieldRule>) -> Self {
        Self { fields }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Insert shape of every non-system column of a table
    pub fn insert_of(table: &TableDefinition) -> Self {
        Self::new(
            table
                .columns
                .iter()
                .filter(|c| !c.is_system())
                .map(FieldRule::insertable)
                .collect(),
        )
    }

    /// Shape requiring a non-null value for each named column
    pub fn required_columns(table: &TableDefinition, names: &[&str]) -> Result<Self> {
        let mut fields = Vec::with_capacity(names.len());
        for name in names {
            let column = table.column(name).ok_or_else(|| {
                QueryError::config(format!(
                    "Column '{}' does not exist in table '{}'",
                    name, table.name
                ))
            })?;
            fields.push(FieldRule::required_value(column));
        }
        Ok(Self::new(fields))
    }

    pub fn fields(&self) -> &[FieldRule] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldRule> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn ensure_known(&self, names: &[&str]) -> Result<()> {
        for name in names {
            if !self.contains(name) {
                return Err(QueryError::config(format!(
                    "Field '{}' is not available; expected one of: {}",
                    name,
                    self.field_names().join(", ")
                )));
            }
        }
        Ok(())
    }

    /// Keep only the named fields, preserving this shape's order
    pub fn pick(&self, names: &[&str]) -> Result<Self> {
        self.ensure_known(names)?;
        Ok(Self::new(
            self.fields
                .iter()
                .filter(|f| names.contains(&f.name.as_str()))
                .cloned()
                .collect(),
        ))
    }

    /// Drop the named fields
    pub fn omit(&self, names: &[&str]) -> Result<Self> {
        self.ensure_known(names)?;
        Ok(self.without(names))
    }

    /// Drop the named fields, ignoring names that are not present
    pub(crate) fn without(&self, names: &[&str]) -> Self {
        Self::new(
            self.fields
                .iter()
                .filter(|f| !names.contains(&f.name.as_str()))
                .cloned()
                .collect(),
        )
    }

    /// Keep the fields matching `keep`
    pub(crate) fn retain(&self, keep: impl Fn(&FieldRule) -> bool) -> Self {
        Self::new(self.fields.iter().filter(|f| keep(f)).cloned().collect())
    }

    /// Make every field optional
    pub fn partial(&self) -> Self {
        Self::new(
            self.fields
                .iter()
                .cloned()
                .map(|f| FieldRule { optional: true, ..f })
                .collect(),
        )
    }

    /// Make every field mandatory
    pub fn required(&self) -> Self {
        Self::new(
            self.fields
                .iter()
                .cloned()
                .map(|f| FieldRule { optional: false, ..f })
                .collect(),
        )
    }

    /// Combine two shapes; fields of `other` replace same-named fields
    pub fn merge(&self, other: &Shape) -> Self {
        let mut fields: Vec<FieldRule> = self
            .fields
            .iter()
            .filter(|f| !other.contains(&f.name))
            .cloned()
            .collect();
        fields.extend(other.fields.iter().cloned());
        Self::new(fields)
    }

    /// Validate a JSON value, returning it as a row
    ///
    /// Unknown fields are rejected. All issues are collected before failing.
    pub fn validate(&self, context: &str, path: &str, value: &Value) -> Result<Row> {
        let mut issues = Vec::new();
        match self.check(path, value, &mut issues) {
            Some(row) if issues.is_empty() => Ok(row),
            _ => Err(QueryError::validation(context, issues)),
        }
    }

    /// Validate into `issues`; returns the row when the value is an object
    pub(crate) fn check(
        &self,
        path: &str,
        value: &Value,
        issues: &mut Vec<ValidationIssue>,
    ) -> Option<Row> {
        let Some(object) = value.as_object() else {
            issues.push(ValidationIssue::new(path, "expected an object"));
            return None;
        };

        let known: HashSet<&str> = self.fields.iter().map(|f| f.name.as_str()).collect();
        for key in object.keys() {
            if !known.contains(key.as_str()) {
                issues.push(ValidationIssue::new(join(path, key), "unknown field"));
            }
        }

        for rule in &self.fields {
            let field_path = join(path, &rule.name);
            match object.get(&rule.name) {
                None if !rule.optional => {
                    issues.push(ValidationIssue::new(field_path, "required field is missing"));
                }
                None => {}
                Some(Value::Null) if !rule.nullable => {
                    issues.push(ValidationIssue::new(field_path, "must not be null"));
                }
                Some(v) => {
                    if let Err(msg) = rule.column_type.validate_value(v) {
                        issues.push(ValidationIssue::new(field_path, msg));
                    }
                }
            }
        }

        Some(object.clone())
    }
}

fn join(path: &str, field: &str) -> String {
    if path.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", path, field)
    }
}
