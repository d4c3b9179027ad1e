use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::types::OnDelete;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("Missing action")]
    MissingAction,

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Invalid request body: {0}")]
    Malformed(String),
}

fn default_nullable() -> bool {
    true
}

// Only an explicit `false` makes a column NOT NULL; `null` counts as absent
fn nullable_unless_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(true))
}

// Defaults arrive as raw form values: numbers and booleans are taken as their
// text, `null` as no default
fn default_as_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(de::Error::custom(format!(
            "invalid type for default_value: expected a string, got {other}"
        ))),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AddColumn {
    pub table_name: String,
    pub column_name: String,
    pub column_type: String,
    #[serde(default = "default_nullable", deserialize_with = "nullable_unless_false")]
    pub is_nullable: bool,
    #[serde(default, deserialize_with = "default_as_text")]
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeleteColumn {
    pub table_name: String,
    pub column_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RenameColumn {
    pub table_name: String,
    pub old_name: String,
    pub new_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
    #[serde(default = "default_nullable", deserialize_with = "nullable_unless_false")]
    pub is_nullable: bool,
    #[serde(default, deserialize_with = "default_as_text")]
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ForeignKeySpec {
    pub column_name: String,
    pub ref_table: String,
    #[serde(default)]
    pub on_delete: OnDelete,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreateTable {
    pub table_name: String,
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeySpec>,
}

/// One call to the schema manager, discriminated by its `action` field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaRequest {
    GetSchema,
    AddColumn(AddColumn),
    DeleteColumn(DeleteColumn),
    RenameColumn(RenameColumn),
    CreateTable(CreateTable),
}

impl SchemaRequest {
    pub fn action(&self) -> &'static str {
        match self {
            SchemaRequest::GetSchema => "get_schema",
            SchemaRequest::AddColumn(_) => "add_column",
            SchemaRequest::DeleteColumn(_) => "delete_column",
            SchemaRequest::RenameColumn(_) => "rename_column",
            SchemaRequest::CreateTable(_) => "create_table",
        }
    }

    // Parsed in two steps (action, then fields) so that an unknown action is
    // reported by name rather than as a generic serde variant error.
    pub fn from_json(body: Value) -> Result<Self, RequestError> {
        let action = body
            .get("action")
            .and_then(Value::as_str)
            .ok_or(RequestError::MissingAction)?
            .to_string();

        match action.as_str() {
            "get_schema" => Ok(SchemaRequest::GetSchema),
            "add_column" => fields(body).map(SchemaRequest::AddColumn),
            "delete_column" => fields(body).map(SchemaRequest::DeleteColumn),
            "rename_column" => fields(body).map(SchemaRequest::RenameColumn),
            "create_table" => fields(body).map(SchemaRequest::CreateTable),
            _ => Err(RequestError::UnknownAction(action)),
        }
    }

    pub fn from_slice(body: &[u8]) -> Result<Self, RequestError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| RequestError::Malformed(e.to_string()))?;
        Self::from_json(value)
    }
}

fn fields<T: DeserializeOwned>(body: Value) -> Result<T, RequestError> {
    serde_json::from_value(body).map_err(|e| RequestError::Malformed(e.to_string()))
}
