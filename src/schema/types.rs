use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Column types a dashboard user may pick. Each maps to exactly one physical
/// Postgres type; the mapping is closed and never derived from user input.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, EnumIter, AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum ColumnType {
    Text,
    Number,
    Integer,
    Boolean,
    Date,
    Timestamp,
    /// Dropdown value; options live in the dashboard's metadata, storage is text
    Select,
}

impl ColumnType {
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Text | ColumnType::Select => "TEXT",
            ColumnType::Number => "NUMERIC",
            ColumnType::Integer => "INTEGER",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Date => "DATE",
            ColumnType::Timestamp => "TIMESTAMP WITH TIME ZONE",
        }
    }

    /// Comma-separated list of the accepted type names, for error messages
    pub fn allowed() -> String {
        ColumnType::iter().join(", ")
    }

    /// Turn a raw default value into a SQL literal for this type.
    ///
    /// Returns `Ok(None)` when no DEFAULT clause should be emitted: the value
    /// is empty, or the type has no literal form we accept (dates, timestamps).
    pub fn sanitize_default(
        &self,
        value: &str,
    ) -> Result<Option<String>, InvalidDefaultValue> {
        if value.is_empty() {
            return Ok(None);
        }

        match self {
            ColumnType::Text | ColumnType::Select => {
                Ok(Some(format!("'{}'", value.replace('\'', "''"))))
            }
            ColumnType::Boolean => Ok(Some(
                if value == "true" { "true" } else { "false" }.to_string(),
            )),
            ColumnType::Number => {
                let trimmed = value.trim();
                // Emit the validated text rather than the f64 to keep NUMERIC precision
                match trimmed.parse::<f64>() {
                    Ok(n) if n.is_finite() => Ok(Some(trimmed.to_string())),
                    _ => Err(InvalidDefaultValue::Numeric),
                }
            }
            ColumnType::Integer => value
                .trim()
                .parse::<i32>()
                .map(|n| Some(n.to_string()))
                .map_err(|_| InvalidDefaultValue::Integer),
            ColumnType::Date | ColumnType::Timestamp => Ok(None),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidDefaultValue {
    #[error("Invalid numeric default value.")]
    Numeric,

    #[error("Invalid integer default value.")]
    Integer,
}

/// What happens to referencing rows when the referenced row is deleted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OnDelete {
    Cascade,
    #[default]
    SetNull,
}

impl OnDelete {
    pub fn sql(&self) -> &'static str {
        match self {
            OnDelete::Cascade => "CASCADE",
            OnDelete::SetNull => "SET NULL",
        }
    }
}

/// Human-readable label for a catalog column type, falling back to the
/// catalog's own `data_type` for anything the dashboard can't create.
pub fn friendly_type(udt_name: &str, data_type: &str) -> String {
    match udt_name {
        "text" | "varchar" => "Text",
        "numeric" => "Number",
        "int4" | "int8" => "Integer",
        "bool" => "Boolean",
        "date" => "Date",
        "timestamptz" => "Timestamp",
        "uuid" => "UUID",
        "jsonb" => "JSON",
        _ => data_type,
    }
    .to_string()
}
