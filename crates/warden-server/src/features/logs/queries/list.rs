use serde::Deserialize;
use warden_common::{AuditStatus, OperationType};

use crate::audit::{AuditLog, AuditQuery, AuditRecord, DEFAULT_AUDIT_QUERY_LIMIT};

/// Default size of the named views (`recent`, `blocked`, `allowed`, ...).
pub const RECENT_VIEW_LIMIT: usize = 50;

/// Query string of `GET /api/logs/operations` and its views.
///
/// `status` accepts `SUCCESS` as a synonym of `ALLOWED`. A missing or zero
/// `limit` falls back to the default; larger values are clamped.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOperationsQuery {
    pub limit: Option<usize>,
    pub status: Option<String>,
    pub table_name: Option<String>,
    pub operation_type: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ListOperationsError {
    #[error("Unknown status '{0}', expected ALLOWED, BLOCKED or ERROR")]
    InvalidStatus(String),
    #[error("Unknown operation type '{0}'")]
    InvalidOperationType(String),
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl ListOperationsQuery {
    pub fn with_status(mut self, status: AuditStatus) -> Self {
        self.status = Some(status.as_str().to_string());
        self
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table_name = Some(table.into());
        self
    }

    /// Convert into a log query, using `default_limit` when none was given.
    pub fn to_audit_query(&self, default_limit: usize) -> Result<AuditQuery, ListOperationsError> {
        let status = non_blank(&self.status)
            .map(|s| {
                s.parse::<AuditStatus>()
                    .map_err(|_| ListOperationsError::InvalidStatus(s.to_string()))
            })
            .transpose()?;
        let operation_type = non_blank(&self.operation_type)
            .map(|s| {
                s.parse::<OperationType>()
                    .map_err(|_| ListOperationsError::InvalidOperationType(s.to_string()))
            })
            .transpose()?;

        Ok(AuditQuery {
            limit: Some(self.limit.filter(|&n| n > 0).unwrap_or(default_limit)),
            table_name: non_blank(&self.table_name).map(str::to_string),
            status,
            operation_type,
        })
    }
}

/// Records matching the query, newest first.
#[tracing::instrument(skip(audit))]
pub fn handle(
    audit: &AuditLog,
    query: ListOperationsQuery,
    default_limit: usize,
) -> Result<Vec<AuditRecord>, ListOperationsError> {
    let query = query.to_audit_query(default_limit)?;
    Ok(audit.query(&query))
}

/// `handle` with the limit used by `GET /api/logs/operations`.
pub fn handle_operations(
    audit: &AuditLog,
    query: ListOperationsQuery,
) -> Result<Vec<AuditRecord>, ListOperationsError> {
    handle(audit, query, DEFAULT_AUDIT_QUERY_LIMIT)
}
