//! Policy evaluation
//!
//! A pure function of operation kind, target table and the protection state
//! observed for that table. It never reads the registry itself; the gateway
//! passes one snapshot per call.

use serde::Serialize;
use warden_common::OperationType;

/// Table holding the persisted audit log. Destructive statements against it
/// are refused regardless of protection state.
pub const AUDIT_LOG_TABLE: &str = "warden_operation_log";

/// Protection state of a table at evaluation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtectionState {
    pub is_protected: bool,
}

impl ProtectionState {
    pub const PROTECTED: Self = Self { is_protected: true };
    pub const UNPROTECTED: Self = Self {
        is_protected: false,
    };
}

impl From<bool> for ProtectionState {
    fn from(is_protected: bool) -> Self {
        Self { is_protected }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Block { reason: String },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Decision::Allow => None,
            Decision::Block { reason } => Some(reason),
        }
    }
}

pub fn evaluate(operation: OperationType, table: &str, state: ProtectionState) -> Decision {
    match operation {
        OperationType::Select
        | OperationType::Insert
        | OperationType::Protect
        | OperationType::Unprotect => Decision::Allow,
        OperationType::Update
        | OperationType::Delete
        | OperationType::Alter
        | OperationType::Drop => {
            if table.eq_ignore_ascii_case(AUDIT_LOG_TABLE) {
                Decision::Block {
                    reason: format!("audit log '{AUDIT_LOG_TABLE}' is append-only"),
                }
            } else if state.is_protected {
                Decision::Block {
                    reason: format!("table '{table}' is protected"),
                }
            } else {
                Decision::Allow
            }
        },
        OperationType::Unknown => Decision::Block {
            reason: "unrecognized operation".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truth_table() {
        for op in OperationType::DATA {
            for state in [ProtectionState::PROTECTED, ProtectionState::UNPROTECTED] {
                let decision = evaluate(op, "products", state);
                let expect_block = state.is_protected && op.is_destructive();
                assert_eq!(!decision.is_allowed(), expect_block, "{op} {state:?}");
                if expect_block {
                    assert_eq!(decision.reason(), Some("table 'products' is protected"));
                }
            }
        }
    }

    #[test]
    fn test_administrative_operations_always_allowed() {
        for op in [OperationType::Protect, OperationType::Unprotect] {
            assert_eq!(evaluate(op, "products", ProtectionState::PROTECTED), Decision::Allow);
        }
    }

    #[test]
    fn test_unknown_is_blocked() {
        let decision = evaluate(OperationType::Unknown, "", ProtectionState::UNPROTECTED);
        assert_eq!(decision.reason(), Some("unrecognized operation"));
    }

    #[test]
    fn test_audit_table_is_append_only() {
        let decision = evaluate(
            OperationType::Delete,
            "warden_operation_log",
            ProtectionState::UNPROTECTED,
        );
        assert_eq!(
            decision.reason(),
            Some("audit log 'warden_operation_log' is append-only")
        );
        assert!(evaluate(
            OperationType::Select,
            "warden_operation_log",
            ProtectionState::UNPROTECTED
        )
        .is_allowed());
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let a = evaluate(OperationType::Drop, "t", ProtectionState::PROTECTED);
        let b = evaluate(OperationType::Drop, "t", ProtectionState::PROTECTED);
        assert_eq!(a, b);
    }
}
