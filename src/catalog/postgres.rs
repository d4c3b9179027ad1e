use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, Executor, PgPool};
use tracing::debug;

use super::{Catalog, CatalogError, CatalogResult};

#[derive(Debug)]
pub struct PostgresCatalog {
    pub executor: PgPool,
    pub schema_name: String,
}

impl PostgresCatalog {
    pub async fn connect(
        dsn: &str,
        schema_name: &str,
        max_connections: u32,
    ) -> Result<Self, sqlx::Error> {
        let search_path_schema = schema_name.to_string();

        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_millis(30000))
            .test_before_acquire(true)
            .after_connect(move |c, _m| {
                let schema_name = search_path_schema.to_owned();
                Box::pin(async move {
                    let query = format!("SET search_path TO \"{schema_name}\",public;");
                    c.execute(sqlx::query(&query)).await?;
                    Ok(())
                })
            })
            .connect(dsn)
            .await?;

        Ok(Self {
            executor: pool,
            schema_name: schema_name.to_string(),
        })
    }

    pub fn interpret_error(error: sqlx::Error) -> CatalogError {
        if let sqlx::Error::Database(ref d) = error {
            let message = d.message().to_string();
            // Reference: https://www.postgresql.org/docs/current/errcodes-appendix.html
            return match d.code().as_deref() {
                Some("42P07" | "42701" | "42710" | "23505") => {
                    CatalogError::DuplicateObject { message }
                }
                Some("42P01" | "42703" | "42704") => CatalogError::UndefinedObject { message },
                Some("23503") => CatalogError::FKConstraintViolation { message },
                Some("42501") => CatalogError::PermissionDenied { message },
                code => CatalogError::Database {
                    code: code.map(str::to_string),
                    message,
                },
            };
        }
        CatalogError::SqlxError(error)
    }
}

/// Wrap a query so that Postgres returns its whole result as one JSON array
pub(crate) fn json_rows_query(sql: &str) -> String {
    format!("SELECT COALESCE(json_agg(q), '[]'::json) FROM ({sql}) AS q")
}

#[async_trait]
impl Catalog for PostgresCatalog {
    async fn execute(&self, sql: &str) -> CatalogResult<()> {
        debug!("Executing: {}", sql);
        self.executor
            .execute(sql)
            .await
            .map_err(Self::interpret_error)?;
        Ok(())
    }

    async fn query(&self, sql: &str) -> CatalogResult<Vec<Value>> {
        debug!("Querying: {}", sql);
        let rows: Value = sqlx::query_scalar::<_, Value>(&json_rows_query(sql))
            .fetch_one(&self.executor)
            .await
            .map_err(Self::interpret_error)?;

        match rows {
            Value::Array(rows) => Ok(rows),
            other => Err(CatalogError::Generic {
                reason: format!("Expected a JSON array of rows, got {other}"),
            }),
        }
    }

    async fn execute_in_transaction(&self, statements: &[String]) -> CatalogResult<()> {
        let mut tx = self
            .executor
            .begin()
            .await
            .map_err(Self::interpret_error)?;

        for statement in statements {
            debug!("Executing in transaction: {}", statement);
            // Dropping `tx` on error rolls the transaction back
            (&mut *tx)
                .execute(statement.as_str())
                .await
                .map_err(Self::interpret_error)?;
        }

        tx.commit().await.map_err(Self::interpret_error)
    }
}
