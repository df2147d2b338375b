//! PostgreSQL persistence for the audit log
//!
//! A single background task owns all writes, so rows land in the order the
//! in-memory log appended them.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::models::AuditRecord;

#[derive(Debug, sqlx::FromRow)]
struct LogRow {
    id: i64,
    operation_time: DateTime<Utc>,
    operation_type: String,
    table_name: String,
    status: String,
    user_name: String,
    query_text: String,
    blocked_reason: Option<String>,
}

impl TryFrom<LogRow> for AuditRecord {
    type Error = warden_common::WardenError;

    fn try_from(row: LogRow) -> Result<Self, Self::Error> {
        Ok(AuditRecord {
            id: row.id,
            operation_time: row.operation_time,
            operation_type: row.operation_type.parse()?,
            table_name: row.table_name,
            status: row.status.parse()?,
            user_name: row.user_name,
            query_text: row.query_text,
            blocked_reason: row.blocked_reason,
        })
    }
}

/// Attempts per record before it is counted as failed.
pub const MAX_RETRIES: u32 = 3;

/// Base delay between attempts; attempt `n` waits `n` times this.
pub const RETRY_DELAY_MS: u64 = 200;

/// Counters reported when the writer stops.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WriterStats {
    pub written: u64,
    pub failed: u64,
}

/// Handle on the writer task.
#[derive(Debug)]
pub struct AuditWriter {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<WriterStats>,
}

impl AuditWriter {
    /// Close the queue, persist every record already in it, and wait for
    /// the task to finish. Records appended after this point stay in memory.
    pub async fn shutdown(self) -> WriterStats {
        // The task may already have stopped on its own.
        let _ = self.shutdown.send(());
        match self.handle.await {
            Ok(stats) => stats,
            Err(e) => {
                error!(error = %e, "Audit writer task failed");
                WriterStats::default()
            },
        }
    }
}

/// Spawn the writer task. It stops after the queue drains once every sender
/// is dropped, or once the [`AuditWriter`] is shut down or dropped.
pub fn spawn_writer(pool: PgPool) -> (UnboundedSender<AuditRecord>, AuditWriter) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (shutdown, shutdown_rx) = oneshot::channel();
    let handle = tokio::spawn(run_writer(pool, rx, shutdown_rx));
    (tx, AuditWriter { shutdown, handle })
}

async fn run_writer(
    pool: PgPool,
    mut rx: UnboundedReceiver<AuditRecord>,
    mut shutdown: oneshot::Receiver<()>,
) -> WriterStats {
    info!("Audit writer started");
    let mut stats = WriterStats::default();
    let mut closing = false;
    loop {
        let record = if closing {
            rx.recv().await
        } else {
            tokio::select! {
                biased;
                record = rx.recv() => record,
                _ = &mut shutdown => {
                    debug!("Audit writer draining queue");
                    rx.close();
                    closing = true;
                    continue;
                },
            }
        };
        let Some(record) = record else {
            break;
        };
        match persist(&pool, &record).await {
            Ok(()) => {
                stats.written += 1;
                debug!(audit_id = record.id, "Audit record persisted");
            },
            Err(e) => {
                stats.failed += 1;
                error!(
                    audit_id = record.id,
                    error = %e,
                    failed = stats.failed,
                    "Failed to persist audit record"
                );
            },
        }
    }
    info!(written = stats.written, failed = stats.failed, "Audit writer stopped");
    stats
}

/// Insert with retries on connection-level failures.
async fn persist(pool: &PgPool, record: &AuditRecord) -> Result<(), sqlx::Error> {
    let mut attempt = 1;
    loop {
        match insert_record(pool, record).await {
            Ok(()) => return Ok(()),
            Err(e) if attempt < MAX_RETRIES && is_transient(&e) => {
                let delay = RETRY_DELAY_MS * u64::from(attempt);
                warn!(
                    audit_id = record.id,
                    "Audit insert attempt {}/{} failed: {}. Retrying in {}ms...",
                    attempt,
                    MAX_RETRIES,
                    e,
                    delay
                );
                tokio::time::sleep(Duration::from_millis(delay)).await;
                attempt += 1;
            },
            Err(e) => return Err(e),
        }
    }
}

/// Errors worth another attempt: lost connections, pool exhaustion,
/// serialization failures and deadlocks.
fn is_transient(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut => true,
        sqlx::Error::Database(db) => db
            .code()
            .is_some_and(|code| code.starts_with("08") || code == "40001" || code == "40P01"),
        _ => false,
    }
}

pub async fn insert_record(pool: &PgPool, record: &AuditRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO warden_operation_log (
            id, operation_time, operation_type, table_name,
            status, user_name, query_text, blocked_reason
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(record.id)
    .bind(record.operation_time)
    .bind(record.operation_type.as_str())
    .bind(&record.table_name)
    .bind(record.status.as_str())
    .bind(&record.user_name)
    .bind(&record.query_text)
    .bind(&record.blocked_reason)
    .execute(pool)
    .await?;
    Ok(())
}

/// Most recent persisted records, newest first. The highest persisted id is
/// always included so id assignment can resume after it.
pub async fn load_recent(pool: &PgPool, limit: i64) -> Result<Vec<AuditRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, LogRow>(
        r#"
        SELECT id, operation_time, operation_type, table_name,
               status, user_name, query_text, blocked_reason
        FROM warden_operation_log
        ORDER BY id DESC
        LIMIT $1
        "#,
    )
    .bind(limit.max(1))
    .fetch_all(pool)
    .await?;

    let records = rows
        .into_iter()
        .filter_map(|row| {
            let id = row.id;
            AuditRecord::try_from(row)
                .map_err(|e| warn!(audit_id = id, error = %e, "Skipping unreadable audit row"))
                .ok()
        })
        .collect();

    Ok(records)
}
