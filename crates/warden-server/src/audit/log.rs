//! In-process audit log

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use super::models::{
    AuditQuery, AuditRecord, AuditSummary, NewAuditRecord, DEFAULT_SUMMARY_LIMIT,
    MAX_AUDIT_QUERY_LIMIT,
};

/// Append-only operation log.
///
/// Appends are serialized under one lock that also assigns ids and times, so
/// id order, time order and append order always agree. When a sink is
/// attached every appended record is forwarded to it in that same order.
#[derive(Debug)]
pub struct AuditLog {
    inner: Mutex<LogInner>,
    retention: Option<usize>,
    sink: Option<UnboundedSender<AuditRecord>>,
}

#[derive(Debug)]
struct LogInner {
    next_id: i64,
    last_time: Option<DateTime<Utc>>,
    records: VecDeque<AuditRecord>,
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLog {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LogInner {
                next_id: 1,
                last_time: None,
                records: VecDeque::new(),
            }),
            retention: None,
            sink: None,
        }
    }

    /// Keep at most `max_records` in memory, evicting the oldest.
    pub fn with_retention(mut self, max_records: Option<usize>) -> Self {
        self.retention = max_records.filter(|n| *n > 0);
        self
    }

    pub fn with_sink(mut self, sink: UnboundedSender<AuditRecord>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Seed the log with persisted history (any order). Id assignment
    /// continues after the highest persisted id.
    pub fn with_history(self, mut history: Vec<AuditRecord>) -> Self {
        history.sort_by_key(|r| r.id);
        {
            let mut inner = self.lock();
            if let Some(last) = history.last() {
                inner.next_id = last.id + 1;
                inner.last_time = history.iter().map(|r| r.operation_time).max();
            }
            inner.records = history.into();
            self.enforce_retention(&mut inner);
        }
        self
    }

    fn lock(&self) -> MutexGuard<'_, LogInner> {
        // Records are pushed whole; a poisoned lock still guards a usable log.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn enforce_retention(&self, inner: &mut LogInner) {
        if let Some(max) = self.retention {
            while inner.records.len() > max {
                inner.records.pop_front();
            }
        }
    }

    /// Assign id and time and store the record. Never fails.
    pub fn append(&self, new: NewAuditRecord) -> AuditRecord {
        let mut inner = self.lock();

        let now = Utc::now();
        let operation_time = match inner.last_time {
            Some(last) if last > now => last,
            _ => now,
        };

        let record = AuditRecord {
            id: inner.next_id,
            operation_time,
            operation_type: new.operation_type,
            table_name: new.table_name,
            status: new.status,
            user_name: new.user_name.unwrap_or_default(),
            query_text: new.query_text,
            blocked_reason: new.blocked_reason,
        };

        inner.next_id += 1;
        inner.last_time = Some(operation_time);
        inner.records.push_back(record.clone());
        self.enforce_retention(&mut inner);

        if let Some(sink) = &self.sink {
            if sink.send(record.clone()).is_err() {
                warn!(audit_id = record.id, "Audit sink closed; record kept in memory only");
            }
        }

        debug!(
            audit_id = record.id,
            operation = %record.operation_type,
            table = %record.table_name,
            status = %record.status,
            "Audit record appended"
        );

        record
    }

    /// Records matching `query`, newest first.
    pub fn query(&self, query: &AuditQuery) -> Vec<AuditRecord> {
        let limit = query.effective_limit();
        let inner = self.lock();
        inner
            .records
            .iter()
            .rev()
            .filter(|r| query.matches(r))
            .take(limit)
            .cloned()
            .collect()
    }

    /// The `limit` most recent records, newest first.
    pub fn recent(&self, limit: usize) -> Vec<AuditRecord> {
        self.query(&AuditQuery {
            limit: Some(limit),
            ..Default::default()
        })
    }

    pub fn summary(&self, limit: Option<usize>) -> AuditSummary {
        let limit = limit
            .unwrap_or(DEFAULT_SUMMARY_LIMIT)
            .min(MAX_AUDIT_QUERY_LIMIT);
        let inner = self.lock();
        AuditSummary::from_records(inner.records.iter().rev().take(limit))
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use warden_common::{AuditStatus, OperationType};

    fn select(table: &str) -> NewAuditRecord {
        NewAuditRecord::allowed(OperationType::Select, table, format!("SELECT * FROM {table}"))
    }

    #[test]
    fn test_append_assigns_increasing_ids_and_times() {
        let log = AuditLog::new();
        let a = log.append(select("products"));
        let b = log.append(select("products"));
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert!(b.operation_time >= a.operation_time);
        assert_eq!(a.user_name, "");
    }

    #[test]
    fn test_recent_is_newest_first() {
        let log = AuditLog::new();
        for i in 0..5 {
            log.append(select(&format!("t{i}")));
        }
        let recent = log.recent(3);
        let ids: Vec<i64> = recent.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![5, 4, 3]);
    }

    #[test]
    fn test_query_filters_by_status_and_table() {
        let log = AuditLog::new();
        log.append(select("products"));
        log.append(NewAuditRecord::blocked(
            OperationType::Delete,
            "products",
            "DELETE FROM products",
            "table 'products' is protected",
        ));
        log.append(NewAuditRecord::blocked(
            OperationType::Delete,
            "customer_payments",
            "DELETE FROM customer_payments",
            "table 'customer_payments' is protected",
        ));

        let blocked = log.query(&AuditQuery {
            status: Some(AuditStatus::Blocked),
            table_name: Some("products".into()),
            ..Default::default()
        });
        assert_eq!(blocked.len(), 1);
        assert_eq!(blocked[0].id, 2);
    }

    #[test]
    fn test_retention_evicts_oldest() {
        let log = AuditLog::new().with_retention(Some(2));
        for _ in 0..4 {
            log.append(select("products"));
        }
        let ids: Vec<i64> = log.recent(10).iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![4, 3]);
    }

    #[test]
    fn test_history_continues_ids() {
        let seed = AuditLog::new();
        let history = vec![seed.append(select("a")), seed.append(select("b"))];
        let log = AuditLog::new().with_history(history);
        assert_eq!(log.len(), 2);
        assert_eq!(log.append(select("c")).id, 3);
    }

    #[tokio::test]
    async fn test_sink_receives_records_in_append_order() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let log = AuditLog::new().with_sink(tx);
        log.append(select("a"));
        log.append(select("b"));
        assert_eq!(rx.recv().await.unwrap().id, 1);
        assert_eq!(rx.recv().await.unwrap().id, 2);
    }

    #[tokio::test]
    async fn test_concurrent_appends_get_unique_ids() {
        let log = Arc::new(AuditLog::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let log = log.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..25 {
                    log.append(select("products"));
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let mut ids: Vec<i64> = log.recent(1000).iter().map(|r| r.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 200);
        assert_eq!(ids.last(), Some(&200));
    }

    #[test]
    fn test_summary_uses_recent_window() {
        let log = AuditLog::new();
        log.append(NewAuditRecord::failed(OperationType::Update, "t", "UPDATE t SET a = 1"));
        log.append(select("t"));
        let summary = log.summary(Some(1));
        assert_eq!(summary.total_operations, 1);
        assert_eq!(summary.allowed_operations, 1);
        assert_eq!(log.summary(None).error_operations, 1);
    }
}
