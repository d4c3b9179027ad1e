use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::catalog::{Catalog, CatalogError, CatalogResult};

/// In-memory stand-in for the database: records every statement it is
/// given, answers queries from a queue of canned results and can be told to
/// fail any statement containing a given fragment.
#[derive(Debug, Default)]
pub struct RecordingCatalog {
    statements: Mutex<Vec<String>>,
    transactions: Mutex<Vec<Vec<String>>>,
    query_results: Mutex<VecDeque<Vec<Value>>>,
    failure: Option<(String, String)>,
}

impl RecordingCatalog {
    pub fn fail_on(self, fragment: &str, message: &str) -> Self {
        Self {
            failure: Some((fragment.to_string(), message.to_string())),
            ..self
        }
    }

    pub fn push_query_result(&self, rows: Vec<Value>) {
        self.query_results.lock().push_back(rows);
    }

    /// Statements run outside of transactions, in order
    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().clone()
    }

    /// Committed transactions, in order
    pub fn transactions(&self) -> Vec<Vec<String>> {
        self.transactions.lock().clone()
    }

    fn check(&self, sql: &str) -> CatalogResult<()> {
        match &self.failure {
            Some((fragment, message)) if sql.contains(fragment.as_str()) => {
                Err(CatalogError::Generic {
                    reason: message.clone(),
                })
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Catalog for RecordingCatalog {
    async fn execute(&self, sql: &str) -> CatalogResult<()> {
        self.check(sql)?;
        self.statements.lock().push(sql.to_string());
        Ok(())
    }

    async fn query(&self, sql: &str) -> CatalogResult<Vec<Value>> {
        self.check(sql)?;
        self.statements.lock().push(sql.to_string());
        Ok(self.query_results.lock().pop_front().unwrap_or_default())
    }

    async fn execute_in_transaction(&self, statements: &[String]) -> CatalogResult<()> {
        for statement in statements {
            self.check(statement)?;
        }
        self.transactions.lock().push(statements.to_vec());
        Ok(())
    }
}
