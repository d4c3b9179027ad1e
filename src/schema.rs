//! The schema model: identifier grammar, logical column types, request and
//! response shapes, and the statements built from them.

pub mod ddl;
pub mod identifier;
pub mod request;
pub mod response;
pub mod types;

pub use identifier::{is_valid_identifier, Identifier, InvalidIdentifier};
pub use request::{RequestError, SchemaRequest};
pub use response::{ColumnInfo, MutationResult, SchemaResponse, TableInfo};
pub use types::{ColumnType, OnDelete};
