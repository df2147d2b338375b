//! Per-table write protection
//!
//! The registry is an explicit component owned by the application state. It
//! answers "is this table protected?" for the gateway and records every
//! protect/unprotect request in the audit log.

mod registry;

pub use registry::{
    OverallStatus, ProtectionRegistry, ProtectionStatus, ProtectionSummary, ToggleOutcome,
};
