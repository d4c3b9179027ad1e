use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref IDENTIFIER_RE: Regex =
        Regex::new(r"^[a-z][a-z0-9_]{0,62}$").expect("identifier pattern is valid");
}

pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER_RE.is_match(name)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid identifier: {0}")]
pub struct InvalidIdentifier(pub String);

/// A table, column or schema name that has passed the identifier grammar.
///
/// This is the only way a user-supplied name can reach a DDL statement: the
/// statement builders in [`super::ddl`] take `&Identifier`, never `&str`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(String);

impl Identifier {
    pub fn parse(name: &str) -> Result<Self, InvalidIdentifier> {
        if is_valid_identifier(name) {
            Ok(Self(name.to_string()))
        } else {
            Err(InvalidIdentifier(name.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Double-quoted form for use in statements
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }

    /// Single-quoted form, for comparing against catalog string columns
    pub fn literal(&self) -> String {
        format!("'{}'", self.0)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Identifier {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}
