use std::fmt;
use thiserror::Error as ThisError;

/// MySQL caps identifiers at 64 characters; the same bound is applied to SQLite.
const MAX_IDENT_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum IdentError {
    #[error("{kind} must not be empty")]
    Empty { kind: &'static str },

    #[error("{kind} '{value}' is longer than 64 characters")]
    TooLong { kind: &'static str, value: String },

    #[error("{kind} '{value}' is not a plain SQL identifier")]
    Invalid { kind: &'static str, value: String },
}

/// Target table, optionally schema-qualified. Only constructed from validated identifiers, so
/// the quoted forms are safe to splice into SQL text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    schema: Option<String>,
    table: String,
}

impl TableRef {
    pub fn new(schema: Option<&str>, table: &str) -> Result<Self, IdentError> {
        if let Some(schema) = schema {
            validate("DBName", schema)?;
        }
        validate("DBTable", table)?;
        Ok(Self {
            schema: schema.map(str::to_string),
            table: table.to_string(),
        })
    }

    /// `` `schema`.`table` `` (or just `` `table` ``).
    pub fn quoted_mysql(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", quote_mysql(schema), quote_mysql(&self.table)),
            None => quote_mysql(&self.table),
        }
    }

    /// `"table"`. SQLite has no schema-qualified target here.
    pub fn quoted_sqlite(&self) -> String {
        quote_sqlite(&self.table)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{schema}.{}", self.table),
            None => f.write_str(&self.table),
        }
    }
}

pub(super) fn quote_mysql(ident: &str) -> String {
    format!("`{ident}`")
}

pub(super) fn quote_sqlite(ident: &str) -> String {
    format!("\"{ident}\"")
}

fn validate(kind: &'static str, value: &str) -> Result<(), IdentError> {
    if value.is_empty() {
        return Err(IdentError::Empty { kind });
    }
    if value.chars().count() > MAX_IDENT_LEN {
        return Err(IdentError::TooLong {
            kind,
            value: value.to_string(),
        });
    }
    let mut chars = value.chars();
    let head_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let tail_ok = chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
    if head_ok && tail_ok {
        Ok(())
    } else {
        Err(IdentError::Invalid {
            kind,
            value: value.to_string(),
        })
    }
}
