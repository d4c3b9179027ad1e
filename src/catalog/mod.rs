use std::fmt::Debug;

use async_trait::async_trait;
use serde_json::Value;

pub mod postgres;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("{reason}")]
    Generic { reason: String },

    // Errors reported by the database, with its own message as the display text
    #[error("{message}")]
    DuplicateObject { message: String },

    #[error("{message}")]
    UndefinedObject { message: String },

    #[error("{message}")]
    FKConstraintViolation { message: String },

    #[error("{message}")]
    PermissionDenied { message: String },

    #[error("{message}")]
    Database {
        code: Option<String>,
        message: String,
    },

    // Connection, pool and protocol failures
    #[error("Internal SQL error: {0}")]
    SqlxError(sqlx::Error),

    #[error("Unexpected query result: {0}")]
    SerdeJsonError(#[from] serde_json::Error),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// The elevated-privilege side of the database: everything here runs with
/// the service's own credentials, so callers must have authenticated the
/// requester and validated every identifier before reaching it.
#[async_trait]
pub trait Catalog: Send + Sync + Debug {
    /// Run one statement that returns no rows
    async fn execute(&self, sql: &str) -> CatalogResult<()>;

    /// Run a read-only query, returning each row as a JSON object
    async fn query(&self, sql: &str) -> CatalogResult<Vec<Value>>;

    /// Run all statements in a single transaction: either every statement
    /// takes effect or none does
    async fn execute_in_transaction(&self, statements: &[String]) -> CatalogResult<()>;
}
