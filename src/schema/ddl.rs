//! Statement construction.
//!
//! Every builder here takes already-validated [`Identifier`]s and sanitized
//! literals, so no raw request text ever ends up in a statement.

use std::fmt;

use itertools::Itertools;

use super::identifier::Identifier;
use super::types::{ColumnType, InvalidDefaultValue, OnDelete};

/// Primary key added to every created table
pub const ID_COLUMN: &str = "\"id\" UUID NOT NULL DEFAULT gen_random_uuid() PRIMARY KEY";
/// Creation timestamp added to every created table
pub const CREATED_AT_COLUMN: &str = "\"created_at\" TIMESTAMP WITH TIME ZONE DEFAULT now()";

pub const ACCESS_POLICY_NAME: &str = "Authenticated access";

/// Schema-qualified table name
#[derive(Debug, Clone, Copy)]
pub struct TableRef<'a> {
    pub schema: &'a Identifier,
    pub table: &'a Identifier,
}

impl<'a> TableRef<'a> {
    pub fn new(schema: &'a Identifier, table: &'a Identifier) -> Self {
        Self { schema, table }
    }
}

impl fmt::Display for TableRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema.quoted(), self.table.quoted())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub name: Identifier,
    pub column_type: ColumnType,
    pub nullable: bool,
    /// Already sanitized for `column_type`
    pub default: Option<String>,
}

impl ColumnDefinition {
    pub fn new(
        name: Identifier,
        column_type: ColumnType,
        nullable: bool,
        default_value: Option<&str>,
    ) -> Result<Self, InvalidDefaultValue> {
        let default = match default_value {
            Some(value) => column_type.sanitize_default(value)?,
            None => None,
        };

        Ok(Self {
            name,
            column_type,
            nullable,
            default,
        })
    }
}

impl fmt::Display for ColumnDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name.quoted(), self.column_type.sql_type())?;
        if !self.nullable {
            f.write_str(" NOT NULL")?;
        }
        if let Some(default) = &self.default {
            write!(f, " DEFAULT {default}")?;
        }
        Ok(())
    }
}

/// A nullable UUID column referencing another table's `id`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyDefinition {
    pub column: Identifier,
    pub ref_table: Identifier,
    pub on_delete: OnDelete,
}

impl ForeignKeyDefinition {
    fn render(&self, schema: &Identifier) -> String {
        format!(
            "{} UUID REFERENCES {}(id) ON DELETE {}",
            self.column.quoted(),
            TableRef::new(schema, &self.ref_table),
            self.on_delete.sql()
        )
    }
}

pub fn add_column(table: TableRef, column: &ColumnDefinition) -> String {
    format!("ALTER TABLE {table} ADD COLUMN {column}")
}

pub fn drop_column(table: TableRef, column: &Identifier) -> String {
    format!("ALTER TABLE {table} DROP COLUMN {}", column.quoted())
}

pub fn rename_column(table: TableRef, old: &Identifier, new: &Identifier) -> String {
    format!(
        "ALTER TABLE {table} RENAME COLUMN {} TO {}",
        old.quoted(),
        new.quoted()
    )
}

/// Returns a single row with a boolean `has_data` column
pub fn column_has_data(table: TableRef, column: &Identifier) -> String {
    format!(
        "SELECT EXISTS (SELECT 1 FROM {table} WHERE {} IS NOT NULL LIMIT 1) AS has_data",
        column.quoted()
    )
}

pub fn create_table(
    table: TableRef,
    columns: &[ColumnDefinition],
    foreign_keys: &[ForeignKeyDefinition],
) -> String {
    let definitions = [ID_COLUMN.to_string(), CREATED_AT_COLUMN.to_string()]
        .into_iter()
        .chain(columns.iter().map(ToString::to_string))
        .chain(foreign_keys.iter().map(|fk| fk.render(table.schema)))
        .join(",\n  ");

    format!("CREATE TABLE {table} (\n  {definitions}\n)")
}

pub fn enable_row_level_security(table: TableRef) -> String {
    format!("ALTER TABLE {table} ENABLE ROW LEVEL SECURITY")
}

pub fn create_access_policy(table: TableRef) -> String {
    format!(
        "CREATE POLICY \"{ACCESS_POLICY_NAME}\" ON {table} FOR ALL TO authenticated USING (true) WITH CHECK (true)"
    )
}

/// Introspection query returning one row per base table in `schema`:
/// `{table_name, columns: [...]}`, columns in physical order with their
/// primary/foreign key annotations.
pub fn list_tables(schema: &Identifier, excluded: &[Identifier]) -> String {
    let schema = schema.literal();
    let exclusion = if excluded.is_empty() {
        String::new()
    } else {
        format!(
            "\n      AND t.table_name NOT IN ({})",
            excluded.iter().map(Identifier::literal).join(", ")
        )
    };

    format!(
        r#"
    SELECT
      t.table_name,
      json_agg(
        json_build_object(
          'column_name', c.column_name,
          'data_type', c.data_type,
          'udt_name', c.udt_name,
          'is_nullable', c.is_nullable,
          'column_default', c.column_default,
          'is_primary', COALESCE(pk_info.is_pk, false),
          'is_foreign_key', COALESCE(fk_info.is_fk, false),
          'fk_table', fk_info.ref_table,
          'fk_column', fk_info.ref_column
        ) ORDER BY c.ordinal_position
      ) AS columns
    FROM information_schema.tables t
    JOIN information_schema.columns c
      ON c.table_name = t.table_name AND c.table_schema = t.table_schema
    LEFT JOIN LATERAL (
      SELECT true AS is_pk
      FROM information_schema.table_constraints tc
      JOIN information_schema.key_column_usage kcu
        ON tc.constraint_name = kcu.constraint_name AND tc.table_schema = kcu.table_schema
      WHERE tc.constraint_type = 'PRIMARY KEY'
        AND tc.table_name = t.table_name
        AND tc.table_schema = {schema}
        AND kcu.column_name = c.column_name
      LIMIT 1
    ) pk_info ON true
    LEFT JOIN LATERAL (
      SELECT true AS is_fk,
             ccu.table_name AS ref_table,
             ccu.column_name AS ref_column
      FROM information_schema.table_constraints tc
      JOIN information_schema.key_column_usage kcu
        ON tc.constraint_name = kcu.constraint_name AND tc.table_schema = kcu.table_schema
      JOIN information_schema.constraint_column_usage ccu
        ON ccu.constraint_name = tc.constraint_name AND ccu.table_schema = tc.table_schema
      WHERE tc.constraint_type = 'FOREIGN KEY'
        AND tc.table_name = t.table_name
        AND tc.table_schema = {schema}
        AND kcu.column_name = c.column_name
      LIMIT 1
    ) fk_info ON true
    WHERE t.table_schema = {schema}
      AND t.table_type = 'BASE TABLE'{exclusion}
    GROUP BY t.table_name
    ORDER BY t.table_name
"#
    )
}
