use serde::{Deserialize, Serialize};

use super::types::friendly_type;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ColumnInfo {
    pub column_name: String,
    pub data_type: String,
    pub udt_name: String,
    /// `"YES"` or `"NO"`, as reported by `information_schema`
    pub is_nullable: String,
    pub column_default: Option<String>,
    pub is_primary: bool,
    pub is_foreign_key: bool,
    pub fk_table: Option<String>,
    pub fk_column: Option<String>,
    #[serde(default)]
    pub friendly_type: String,
}

impl ColumnInfo {
    pub fn nullable(&self) -> bool {
        self.is_nullable == "YES"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TableInfo {
    pub table_name: String,
    pub columns: Vec<ColumnInfo>,
}

impl TableInfo {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.column_name == name)
    }

    pub(crate) fn with_friendly_types(mut self) -> Self {
        for column in &mut self.columns {
            column.friendly_type = friendly_type(&column.udt_name, &column.data_type);
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationResult {
    pub success: bool,
    pub message: String,
}

impl MutationResult {
    pub fn ok(message: String) -> Self {
        Self {
            success: true,
            message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SchemaResponse {
    Schema { tables: Vec<TableInfo> },
    Mutation(MutationResult),
}
