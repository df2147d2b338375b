//! Data stores behind the gateway
//!
//! The gateway talks to the store only through [`DataStore`]: it hands over
//! a statement and gets back affected rows plus any rows the statement
//! returned. Two implementations exist:
//!
//! - [`MemoryStore`]: an in-process engine for the statement subset the
//!   gateway emits, seeded with the demo catalog
//! - [`PgStore`]: a PostgreSQL pool via SQLx

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// One result row, column name -> value.
pub type Row = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecOutcome {
    pub rows_affected: u64,
    pub rows: Vec<Row>,
}

impl ExecOutcome {
    pub fn affected(rows_affected: u64) -> Self {
        Self {
            rows_affected,
            rows: Vec::new(),
        }
    }

    pub fn with_rows(rows: Vec<Row>) -> Self {
        Self {
            rows_affected: rows.len() as u64,
            rows,
        }
    }
}

/// Failures reported by a store, with the store's own message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("relation \"{0}\" does not exist")]
    UndefinedTable(String),

    #[error("column \"{0}\" does not exist")]
    UndefinedColumn(String),

    #[error("{0}")]
    Syntax(String),

    #[error("{0}")]
    Constraint(String),

    /// The database itself refused the statement (permissions, or a
    /// server-side protection trigger).
    #[error("{0}")]
    Rejected(String),

    #[error("{0}")]
    Timeout(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait DataStore: Send + Sync + std::fmt::Debug {
    /// Execute one statement verbatim.
    async fn execute(&self, statement: &str) -> Result<ExecOutcome, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;

    /// Short backend name for health and service info.
    fn backend(&self) -> &'static str;
}
