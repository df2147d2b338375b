use serde::Deserialize;

use crate::audit::{AuditLog, AuditSummary};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetLogSummaryQuery {
    pub limit: Option<usize>,
}

/// Counts over the most recent `limit` records (default 100).
pub fn handle(audit: &AuditLog, query: GetLogSummaryQuery) -> AuditSummary {
    audit.summary(query.limit.filter(|&n| n > 0))
}
