//! Operations accepted by the gateway and their rendering to SQL

use serde_json::Value;
use thiserror::Error;
use warden_common::{types::normalize_table_name, OperationType};

use crate::sql::{is_valid_identifier, json_literal};
use crate::store::Row;

/// Rows a structured operation applies to.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    All,
    Id(i64),
    /// `column = value`
    Eq { column: String, value: Value },
}

/// A typed operation built by application code.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredOp {
    pub kind: OperationType,
    pub table: String,
    pub target: Target,
    /// Column values for INSERT/UPDATE; column types for ALTER (ADD COLUMN).
    pub fields: Option<Row>,
}

impl StructuredOp {
    pub fn select(table: impl Into<String>, target: Target) -> Self {
        Self::new(OperationType::Select, table, target, None)
    }

    pub fn insert(table: impl Into<String>, fields: Row) -> Self {
        Self::new(OperationType::Insert, table, Target::All, Some(fields))
    }

    pub fn update(table: impl Into<String>, target: Target, fields: Row) -> Self {
        Self::new(OperationType::Update, table, target, Some(fields))
    }

    pub fn delete(table: impl Into<String>, target: Target) -> Self {
        Self::new(OperationType::Delete, table, target, None)
    }

    pub fn new(
        kind: OperationType,
        table: impl Into<String>,
        target: Target,
        fields: Option<Row>,
    ) -> Self {
        Self {
            kind,
            table: table.into(),
            target,
            fields,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Structured(StructuredOp),
    /// Statement text forwarded verbatim after classification.
    Raw { statement: String },
}

impl Operation {
    pub fn raw(statement: impl Into<String>) -> Self {
        Operation::Raw {
            statement: statement.into(),
        }
    }
}

impl From<StructuredOp> for Operation {
    fn from(op: StructuredOp) -> Self {
        Operation::Structured(op)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("invalid identifier {0:?}")]
    InvalidIdentifier(String),

    #[error("{0} requires at least one field")]
    MissingFields(OperationType),

    #[error("invalid column type {0:?}")]
    InvalidColumnType(String),

    #[error("{0} cannot be expressed as a structured operation")]
    Unsupported(OperationType),
}

fn identifier(name: &str) -> Result<String, RenderError> {
    let normalized = normalize_table_name(name)
        .map_err(|_| RenderError::InvalidIdentifier(name.to_string()))?;
    if is_valid_identifier(&normalized) {
        Ok(normalized)
    } else {
        Err(RenderError::InvalidIdentifier(name.to_string()))
    }
}

/// `text`, `integer`, `numeric(10,2)`, `varchar(64)`, ...
fn column_type(value: &Value) -> Result<String, RenderError> {
    let raw = value.as_str().unwrap_or("text").trim().to_lowercase();
    let (base, args) = match raw.split_once('(') {
        Some((base, rest)) => (base.trim(), Some(rest)),
        None => (raw.as_str(), None),
    };
    let base_ok = !base.is_empty() && base.chars().all(|c| c.is_ascii_lowercase() || c == ' ');
    let args_ok = args.map_or(true, |rest| {
        rest.strip_suffix(')').is_some_and(|inner| {
            !inner.is_empty() && inner.chars().all(|c| c.is_ascii_digit() || c == ',' || c == ' ')
        })
    });
    if base_ok && args_ok {
        Ok(raw)
    } else {
        Err(RenderError::InvalidColumnType(raw))
    }
}

impl StructuredOp {
    /// Normalized target table.
    pub fn table_name(&self) -> Result<String, RenderError> {
        identifier(&self.table)
    }

    fn where_clause(&self) -> Result<String, RenderError> {
        match &self.target {
            Target::All => Ok(String::new()),
            Target::Id(id) => Ok(format!(" WHERE id = {id}")),
            Target::Eq { column, value } => {
                Ok(format!(" WHERE {} = {}", identifier(column)?, json_literal(value)))
            },
        }
    }

    fn fields(&self) -> Result<Vec<(String, &Value)>, RenderError> {
        let fields = self
            .fields
            .as_ref()
            .filter(|f| !f.is_empty())
            .ok_or(RenderError::MissingFields(self.kind))?;
        fields
            .iter()
            .map(|(column, value)| Ok((identifier(column)?, value)))
            .collect()
    }

    /// SQL text for this operation. Literals are escaped and identifiers
    /// validated; writes return the affected rows.
    pub fn render(&self) -> Result<String, RenderError> {
        let table = self.table_name()?;
        match self.kind {
            OperationType::Select => Ok(format!("SELECT * FROM {table}{}", self.where_clause()?)),
            OperationType::Insert => {
                let fields = self.fields()?;
                let columns: Vec<&str> = fields.iter().map(|(c, _)| c.as_str()).collect();
                let values: Vec<String> = fields.iter().map(|(_, v)| json_literal(v)).collect();
                Ok(format!(
                    "INSERT INTO {table} ({}) VALUES ({}) RETURNING *",
                    columns.join(", "),
                    values.join(", ")
                ))
            },
            OperationType::Update => {
                let assignments: Vec<String> = self
                    .fields()?
                    .iter()
                    .filter(|(c, _)| c != "id")
                    .map(|(c, v)| format!("{c} = {}", json_literal(v)))
                    .collect();
                if assignments.is_empty() {
                    return Err(RenderError::MissingFields(self.kind));
                }
                Ok(format!(
                    "UPDATE {table} SET {}{} RETURNING *",
                    assignments.join(", "),
                    self.where_clause()?
                ))
            },
            OperationType::Delete => {
                Ok(format!("DELETE FROM {table}{} RETURNING *", self.where_clause()?))
            },
            OperationType::Alter => {
                let additions = self
                    .fields()?
                    .iter()
                    .map(|(c, ty)| Ok(format!("ADD COLUMN {c} {}", column_type(ty)?)))
                    .collect::<Result<Vec<_>, RenderError>>()?;
                Ok(format!("ALTER TABLE {table} {}", additions.join(", ")))
            },
            OperationType::Drop => Ok(format!("DROP TABLE {table}")),
            kind @ (OperationType::Protect | OperationType::Unprotect | OperationType::Unknown) => {
                Err(RenderError::Unsupported(kind))
            },
        }
    }
}
