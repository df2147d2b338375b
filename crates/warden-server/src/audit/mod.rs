//! Audit log
//!
//! Every operation the gateway intercepts, and every protection toggle, ends
//! up here as exactly one immutable [`AuditRecord`]. Records live in memory
//! (newest-first reads, optional retention cap) and, when PostgreSQL is
//! configured, are mirrored to the `warden_operation_log` table by a single
//! background writer.
//!
//! # Example
//!
//! ```
//! use warden_common::{AuditStatus, OperationType};
//! use warden_server::audit::{AuditLog, NewAuditRecord};
//!
//! let log = AuditLog::new();
//! log.append(NewAuditRecord::blocked(
//!     OperationType::Delete,
//!     "products",
//!     "DELETE FROM products",
//!     "table 'products' is protected",
//! ));
//! let latest = &log.recent(1)[0];
//! assert_eq!(latest.status, AuditStatus::Blocked);
//! ```

mod log;
mod models;
pub mod pg;

pub use log::AuditLog;
pub use models::{
    AuditQuery, AuditRecord, AuditSummary, NewAuditRecord, DEFAULT_AUDIT_QUERY_LIMIT,
    DEFAULT_SUMMARY_LIMIT, MAX_AUDIT_QUERY_LIMIT,
};
