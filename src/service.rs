use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::auth::AuthError;
use crate::catalog::{Catalog, CatalogError};
use crate::schema::ddl::{self, ColumnDefinition, ForeignKeyDefinition, TableRef};
use crate::schema::request::{AddColumn, CreateTable, DeleteColumn, RenameColumn};
use crate::schema::types::InvalidDefaultValue;
use crate::schema::{
    ColumnType, Identifier, MutationResult, RequestError, SchemaRequest,
    SchemaResponse, TableInfo,
};

pub const DEFAULT_SCHEMA: &str = "public";
pub const DEFAULT_PROTECTED_TABLES: [&str; 1] = ["table_settings"];
pub const DEFAULT_SYSTEM_COLUMNS: [&str; 4] = ["id", "created_at", "updated_at", "user_id"];

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("{0}")]
    Validation(String),

    #[error("Table '{name}' is protected and cannot be modified.")]
    ProtectedTable { name: String },

    #[error("Cannot {verb} protected column: {name}")]
    ProtectedColumn { verb: &'static str, name: String },

    #[error(transparent)]
    InvalidDefault(#[from] InvalidDefaultValue),

    #[error(
        "Column '{column}' contains data. Clear all data in this column before deleting."
    )]
    ColumnHasData { column: String },

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl SchemaError {
    fn validation(message: impl Into<String>) -> Self {
        SchemaError::Validation(message.into())
    }
}

pub type Result<T, E = SchemaError> = std::result::Result<T, E>;

/// Which schema the service manages and which objects in it are off limits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaPolicy {
    pub schema: Identifier,
    pub protected_tables: Vec<Identifier>,
    pub system_columns: Vec<String>,
}

impl SchemaPolicy {
    pub fn is_protected_table(&self, name: &str) -> bool {
        self.protected_tables.iter().any(|t| t == name)
    }

    pub fn is_system_column(&self, name: &str) -> bool {
        self.system_columns.iter().any(|c| c == name)
    }
}

impl Default for SchemaPolicy {
    fn default() -> Self {
        Self {
            schema: Identifier::parse(DEFAULT_SCHEMA).expect("default schema is valid"),
            protected_tables: DEFAULT_PROTECTED_TABLES
                .iter()
                .map(|t| Identifier::parse(t).expect("default protected table is valid"))
                .collect(),
            system_columns: DEFAULT_SYSTEM_COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Runs schema requests against the catalog. Holds no schema state of its
/// own: every call re-reads or re-validates what it needs.
#[derive(Debug, Clone)]
pub struct SchemaService {
    catalog: Arc<dyn Catalog>,
    policy: SchemaPolicy,
}

impl SchemaService {
    pub fn new(catalog: Arc<dyn Catalog>, policy: SchemaPolicy) -> Self {
        Self { catalog, policy }
    }

    pub fn policy(&self) -> &SchemaPolicy {
        &self.policy
    }

    pub async fn handle(&self, request: SchemaRequest) -> Result<SchemaResponse> {
        match request {
            SchemaRequest::GetSchema => Ok(SchemaResponse::Schema {
                tables: self.get_schema().await?,
            }),
            SchemaRequest::AddColumn(r) => self.add_column(r).await.map(SchemaResponse::Mutation),
            SchemaRequest::DeleteColumn(r) => {
                self.delete_column(r).await.map(SchemaResponse::Mutation)
            }
            SchemaRequest::RenameColumn(r) => {
                self.rename_column(r).await.map(SchemaResponse::Mutation)
            }
            SchemaRequest::CreateTable(r) => {
                self.create_table(r).await.map(SchemaResponse::Mutation)
            }
        }
    }

    /// Validate a table that is about to be altered
    fn mutable_table(&self, name: &str) -> Result<Identifier> {
        let table =
            Identifier::parse(name).map_err(|_| SchemaError::validation("Invalid table name."))?;
        if self.policy.is_protected_table(name) {
            return Err(SchemaError::ProtectedTable {
                name: name.to_string(),
            });
        }
        Ok(table)
    }

    fn table_ref<'a>(&'a self, table: &'a Identifier) -> TableRef<'a> {
        TableRef::new(&self.policy.schema, table)
    }

    pub async fn get_schema(&self) -> Result<Vec<TableInfo>> {
        let sql = ddl::list_tables(&self.policy.schema, &self.policy.protected_tables);
        let rows = self.catalog.query(&sql).await?;

        let mut tables = serde_json::from_value::<Vec<TableInfo>>(Value::Array(rows))
            .map_err(CatalogError::from)?
            .into_iter()
            .map(TableInfo::with_friendly_types)
            .collect::<Vec<_>>();
        tables.sort_by(|a, b| a.table_name.cmp(&b.table_name));

        debug!("Introspected {} table(s)", tables.len());
        Ok(tables)
    }

    pub async fn add_column(&self, request: AddColumn) -> Result<MutationResult> {
        let table = self.mutable_table(&request.table_name)?;
        let column = Identifier::parse(&request.column_name).map_err(|_| {
            SchemaError::validation(
                "Invalid column name. Use lowercase letters, numbers, and underscores only.",
            )
        })?;
        let column_type = ColumnType::from_str(&request.column_type).map_err(|_| {
            SchemaError::validation(format!(
                "Invalid column type. Allowed: {}",
                ColumnType::allowed()
            ))
        })?;

        let definition = ColumnDefinition::new(
            column,
            column_type,
            request.is_nullable,
            request.default_value.as_deref(),
        )?;
        self.catalog
            .execute(&ddl::add_column(self.table_ref(&table), &definition))
            .await?;

        info!(
            table = table.as_str(),
            column = definition.name.as_str(),
            column_type = column_type.as_ref(),
            "Added column"
        );
        Ok(MutationResult::ok(format!(
            "Column '{}' added to '{}'",
            definition.name, table
        )))
    }

    pub async fn delete_column(&self, request: DeleteColumn) -> Result<MutationResult> {
        let table = self.mutable_table(&request.table_name)?;
        if self.policy.is_system_column(&request.column_name) {
            return Err(SchemaError::ProtectedColumn {
                verb: "delete",
                name: request.column_name,
            });
        }
        let column = Identifier::parse(&request.column_name)
            .map_err(|_| SchemaError::validation("Invalid column name."))?;

        // Not atomic with the drop below: a concurrent writer can still slip a
        // value in between the two statements.
        let rows = self
            .catalog
            .query(&ddl::column_has_data(self.table_ref(&table), &column))
            .await?;
        let has_data = rows
            .first()
            .and_then(|row| row.get("has_data"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if has_data {
            return Err(SchemaError::ColumnHasData {
                column: column.to_string(),
            });
        }

        self.catalog
            .execute(&ddl::drop_column(self.table_ref(&table), &column))
            .await?;

        info!(table = table.as_str(), column = column.as_str(), "Deleted column");
        Ok(MutationResult::ok(format!(
            "Column '{column}' deleted from '{table}'"
        )))
    }

    pub async fn rename_column(&self, request: RenameColumn) -> Result<MutationResult> {
        let table = self.mutable_table(&request.table_name)?;
        if self.policy.is_system_column(&request.old_name) {
            return Err(SchemaError::ProtectedColumn {
                verb: "rename",
                name: request.old_name,
            });
        }

        let invalid = || {
            SchemaError::validation(
                "Invalid column name. Use lowercase letters, numbers, and underscores only.",
            )
        };
        let old = Identifier::parse(&request.old_name).map_err(|_| invalid())?;
        let new = Identifier::parse(&request.new_name).map_err(|_| invalid())?;

        self.catalog
            .execute(&ddl::rename_column(self.table_ref(&table), &old, &new))
            .await?;

        info!(
            table = table.as_str(),
            old = old.as_str(),
            new = new.as_str(),
            "Renamed column"
        );
        Ok(MutationResult::ok(format!(
            "Column renamed from '{old}' to '{new}'"
        )))
    }

    pub async fn create_table(&self, request: CreateTable) -> Result<MutationResult> {
        let table = Identifier::parse(&request.table_name).map_err(|_| {
            SchemaError::validation(
                "Invalid table name. Use lowercase letters, numbers, and underscores only.",
            )
        })?;
        if self.policy.is_protected_table(table.as_str()) {
            return Err(SchemaError::ProtectedTable {
                name: request.table_name,
            });
        }

        let columns = request
            .columns
            .iter()
            .map(|spec| -> Result<ColumnDefinition> {
                let name = Identifier::parse(&spec.name).map_err(|_| {
                    SchemaError::validation(format!("Invalid column name: {}", spec.name))
                })?;
                let column_type = ColumnType::from_str(&spec.column_type).map_err(|_| {
                    SchemaError::validation(format!("Invalid type for column {}", spec.name))
                })?;
                Ok(ColumnDefinition::new(
                    name,
                    column_type,
                    spec.is_nullable,
                    spec.default_value.as_deref(),
                )?)
            })
            .collect::<Result<Vec<_>>>()?;

        let foreign_keys = request
            .foreign_keys
            .iter()
            .map(|fk| -> Result<ForeignKeyDefinition> {
                match (
                    Identifier::parse(&fk.column_name),
                    Identifier::parse(&fk.ref_table),
                ) {
                    (Ok(column), Ok(ref_table)) => Ok(ForeignKeyDefinition {
                        column,
                        ref_table,
                        on_delete: fk.on_delete,
                    }),
                    _ => Err(SchemaError::validation("Invalid foreign key reference.")),
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let table_ref = self.table_ref(&table);
        let statements = vec![
            ddl::create_table(table_ref, &columns, &foreign_keys),
            ddl::enable_row_level_security(table_ref),
            ddl::create_access_policy(table_ref),
        ];
        // The table only becomes visible together with its row-level security
        // and access policy.
        self.catalog.execute_in_transaction(&statements).await?;

        info!(
            table = table.as_str(),
            columns = columns.len(),
            foreign_keys = foreign_keys.len(),
            "Created table"
        );
        Ok(MutationResult::ok(format!(
            "Table '{table}' created successfully"
        )))
    }
}
