//! Error adapter for custom queries
//!
//! Custom queries are wrapped so their failures carry the operation label.
//! Database errors are classified by PostgreSQL error code; everything else
//! is wrapped in [`QueryError::Operation`]. Standard queries do not pass
//! through here.

use std::sync::Arc;

use tracing::warn;

use super::{QueryFn, QueryFuture};
use crate::error::QueryError;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const NOT_NULL_VIOLATION: &str = "23502";

/// Wrap a query so that its errors are labelled with `operation`
pub fn wrap_query(operation: impl Into<String>, query: QueryFn) -> QueryFn {
    let operation: Arc<str> = Arc::from(operation.into());
    Arc::new(move |input| -> QueryFuture {
        let query = query.clone();
        let operation = operation.clone();
        Box::pin(async move {
            query(input).await.map_err(|error| {
                let error = classify_error(error, &operation);
                warn!(operation = %operation, error = %error, "Query failed");
                error
            })
        })
    })
}

/// Attach an operation label to an error, classifying database failures
pub fn classify_error(error: QueryError, operation: &str) -> QueryError {
    let op = Some(operation.to_string());
    match error {
        QueryError::Sql(sqlx::Error::Database(db)) => {
            let message = db.message().to_string();
            let constraint = db.constraint().map(str::to_string);
            match db.code().as_deref() {
                Some(UNIQUE_VIOLATION) => QueryError::UniqueViolation {
                    operation: op,
                    constraint,
                    message,
                },
                Some(FOREIGN_KEY_VIOLATION) => QueryError::ForeignKeyViolation {
                    operation: op,
                    constraint,
                    message,
                },
                Some(NOT_NULL_VIOLATION) => QueryError::NotNullViolation {
                    operation: op,
                    column: None,
                    message,
                },
                code => QueryError::QueryFailed {
                    operation: op,
                    code: code.map(str::to_string),
                    message,
                },
            }
        }
        QueryError::Sql(
            e @ (sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed),
        ) => QueryError::Connection {
            operation: op,
            message: e.to_string(),
        },
        QueryError::Sql(e) => QueryError::QueryFailed {
            operation: op,
            code: None,
            message: e.to_string(),
        },

        // Already classified by the backend; fill in the label
        QueryError::UniqueViolation {
            operation: None,
            constraint,
            message,
        } => QueryError::UniqueViolation {
            operation: op,
            constraint,
            message,
        },
        QueryError::ForeignKeyViolation {
            operation: None,
            constraint,
            message,
        } => QueryError::ForeignKeyViolation {
            operation: op,
            constraint,
            message,
        },
        QueryError::NotNullViolation {
            operation: None,
            column,
            message,
        } => QueryError::NotNullViolation {
            operation: op,
            column,
            message,
        },
        QueryError::Connection {
            operation: None,
            message,
        } => QueryError::Connection {
            operation: op,
            message,
        },
        QueryError::QueryFailed {
            operation: None,
            code,
            message,
        } => QueryError::QueryFailed {
            operation: op,
            code,
            message,
        },

        e @ (QueryError::UniqueViolation { .. }
        | QueryError::ForeignKeyViolation { .. }
        | QueryError::NotNullViolation { .. }
        | QueryError::Connection { .. }
        | QueryError::QueryFailed { .. }
        | QueryError::Operation { .. }) => e,

        other => QueryError::Operation {
            operation: operation.to_string(),
            source: Box::new(other),
        },
    }
}
