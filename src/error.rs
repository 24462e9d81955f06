//! Error types for feature query operations

use serde::Serialize;
use thiserror::Error;

/// A single failed check produced while validating input against a shape
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    /// Dotted path to the offending field (e.g. `data.name`, `data[1].color`)
    pub path: String,
    /// Human-readable reason
    pub message: String,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors that can occur while configuring or executing feature queries
#[derive(Debug, Error)]
pub enum QueryError {
    /// Programmer error detected while building a configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A scoping identifier required by the operation was not supplied
    #[error("Missing identifier for '{operation}': {field}")]
    MissingIdentifier { operation: String, field: String },

    #[error("Validation failed for {context}: {}", join_issues(.issues))]
    Validation {
        context: String,
        issues: Vec<ValidationIssue>,
    },

    #[error("Unique constraint violation{}: {message}", operation_suffix(.operation))]
    UniqueViolation {
        operation: Option<String>,
        constraint: Option<String>,
        message: String,
    },

    #[error("Foreign key constraint violation{}: {message}", operation_suffix(.operation))]
    ForeignKeyViolation {
        operation: Option<String>,
        constraint: Option<String>,
        message: String,
    },

    #[error("Not-null constraint violation{}: {message}", operation_suffix(.operation))]
    NotNullViolation {
        operation: Option<String>,
        column: Option<String>,
        message: String,
    },

    #[error("Database connection failed{}: {message}", operation_suffix(.operation))]
    Connection {
        operation: Option<String>,
        message: String,
    },

    #[error("Database query failed{}: {message}", operation_suffix(.operation))]
    QueryFailed {
        operation: Option<String>,
        code: Option<String>,
        message: String,
    },

    /// Failure of a custom query, labelled with its operation name
    #[error("'{operation}' failed: {source}")]
    Operation {
        operation: String,
        #[source]
        source: Box<QueryError>,
    },

    /// Failure reported by a table operations backend that is not a SQL error
    #[error("Store error: {0}")]
    Store(String),

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

fn operation_suffix(operation: &Option<String>) -> String {
    match operation {
        Some(op) => format!(" during '{}'", op),
        None => String::new(),
    }
}

impl QueryError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn missing_identifier(operation: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingIdentifier {
            operation: operation.into(),
            field: field.into(),
        }
    }

    pub fn validation(context: impl Into<String>, issues: Vec<ValidationIssue>) -> Self {
        Self::Validation {
            context: context.into(),
            issues,
        }
    }

    /// Shorthand for a validation error with a single issue
    pub fn invalid(
        context: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::validation(context, vec![ValidationIssue::new(path, message)])
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Whether this error was raised by the caller's input rather than the store
    pub fn is_caller_error(&self) -> bool {
        match self {
            Self::MissingIdentifier { .. } | Self::Validation { .. } => true,
            Self::Operation { source, .. } => source.is_caller_error(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;
