//! pg_warden common library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared vocabulary for the pg_warden gateway workspace.
//!
//! - **Error Handling**: [`WardenError`] and the [`Result`] alias
//! - **Logging**: tracing subscriber setup driven by environment variables
//! - **Types**: operation kinds and audit dispositions shared by the gateway,
//!   the audit log and the HTTP layer
//!
//! # Example
//!
//! ```
//! use warden_common::types::{AuditStatus, OperationType};
//!
//! let op: OperationType = "delete".parse().unwrap();
//! assert!(op.is_destructive());
//! assert_eq!(AuditStatus::Blocked.as_str(), "BLOCKED");
//! ```

pub mod error;
pub mod logging;
pub mod types;

pub use error::{Result, WardenError};
pub use types::{AuditStatus, OperationType};
