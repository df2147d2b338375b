//! Audit data models

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use warden_common::{AuditStatus, OperationType};

// ============================================================================
// Audit Query Constants
// ============================================================================

/// Default number of records returned by a log query
pub const DEFAULT_AUDIT_QUERY_LIMIT: usize = 500;

/// Maximum number of records a single query may return
pub const MAX_AUDIT_QUERY_LIMIT: usize = 1000;

/// Default number of recent records a summary covers
pub const DEFAULT_SUMMARY_LIMIT: usize = 100;

/// One intercepted operation and its disposition. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub id: i64,
    pub operation_time: DateTime<Utc>,
    pub operation_type: OperationType,
    pub table_name: String,
    pub status: AuditStatus,
    pub user_name: String,
    pub query_text: String,
    pub blocked_reason: Option<String>,
}

/// Caller-supplied part of a record; id and time are assigned by the log.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditRecord {
    pub operation_type: OperationType,
    pub table_name: String,
    pub status: AuditStatus,
    pub user_name: Option<String>,
    pub query_text: String,
    pub blocked_reason: Option<String>,
}

impl NewAuditRecord {
    pub fn allowed(
        operation_type: OperationType,
        table_name: impl Into<String>,
        query_text: impl Into<String>,
    ) -> Self {
        Self {
            operation_type,
            table_name: table_name.into(),
            status: AuditStatus::Allowed,
            user_name: None,
            query_text: query_text.into(),
            blocked_reason: None,
        }
    }

    pub fn blocked(
        operation_type: OperationType,
        table_name: impl Into<String>,
        query_text: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            status: AuditStatus::Blocked,
            blocked_reason: Some(reason.into()),
            ..Self::allowed(operation_type, table_name, query_text)
        }
    }

    pub fn failed(
        operation_type: OperationType,
        table_name: impl Into<String>,
        query_text: impl Into<String>,
    ) -> Self {
        Self {
            status: AuditStatus::Error,
            ..Self::allowed(operation_type, table_name, query_text)
        }
    }

    pub fn with_user(mut self, user_name: Option<String>) -> Self {
        self.user_name = user_name;
        self
    }
}

/// Filters for reading the log; records come back newest first.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub limit: Option<usize>,
    pub table_name: Option<String>,
    pub status: Option<AuditStatus>,
    pub operation_type: Option<OperationType>,
}

impl AuditQuery {
    pub fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_AUDIT_QUERY_LIMIT)
            .min(MAX_AUDIT_QUERY_LIMIT)
    }

    pub fn matches(&self, record: &AuditRecord) -> bool {
        self.table_name
            .as_deref()
            .map_or(true, |t| record.table_name.eq_ignore_ascii_case(t.trim()))
            && self.status.map_or(true, |s| record.status == s)
            && self.operation_type.map_or(true, |op| record.operation_type == op)
    }
}

/// Aggregate counts over the most recent records.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditSummary {
    pub total_operations: usize,
    pub allowed_operations: usize,
    pub blocked_operations: usize,
    pub error_operations: usize,
    pub operation_types: BTreeMap<OperationType, usize>,
    pub status_counts: BTreeMap<AuditStatus, usize>,
}

impl AuditSummary {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a AuditRecord>) -> Self {
        let mut summary = Self::default();
        for record in records {
            summary.total_operations += 1;
            match record.status {
                AuditStatus::Allowed => summary.allowed_operations += 1,
                AuditStatus::Blocked => summary.blocked_operations += 1,
                AuditStatus::Error => summary.error_operations += 1,
            }
            *summary.operation_types.entry(record.operation_type).or_default() += 1;
            *summary.status_counts.entry(record.status).or_default() += 1;
        }
        summary
    }
}
