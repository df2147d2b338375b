//! Domain types shared across pg_warden

use serde::{Deserialize, Serialize};

use crate::error::WardenError;

/// Kind of data-access operation seen by the gateway.
///
/// `Protect`/`Unprotect` are administrative operations recorded by the
/// protection registry. `Unknown` is the outcome of classifying a statement
/// the gateway cannot attribute to a single verb and table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationType {
    Select,
    Insert,
    Update,
    Delete,
    Alter,
    Drop,
    Protect,
    Unprotect,
    Unknown,
}

impl OperationType {
    /// Operations that can be executed against a store table.
    pub const DATA: [OperationType; 6] = [
        OperationType::Select,
        OperationType::Insert,
        OperationType::Update,
        OperationType::Delete,
        OperationType::Alter,
        OperationType::Drop,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OperationType::Select => "SELECT",
            OperationType::Insert => "INSERT",
            OperationType::Update => "UPDATE",
            OperationType::Delete => "DELETE",
            OperationType::Alter => "ALTER",
            OperationType::Drop => "DROP",
            OperationType::Protect => "PROTECT",
            OperationType::Unprotect => "UNPROTECT",
            OperationType::Unknown => "UNKNOWN",
        }
    }

    /// Whether protection on the target table blocks this operation.
    pub fn is_destructive(self) -> bool {
        matches!(
            self,
            OperationType::Update
                | OperationType::Delete
                | OperationType::Alter
                | OperationType::Drop
        )
    }

    pub fn is_administrative(self) -> bool {
        matches!(self, OperationType::Protect | OperationType::Unprotect)
    }
}

impl std::str::FromStr for OperationType {
    type Err = WardenError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SELECT" => Ok(OperationType::Select),
            "INSERT" => Ok(OperationType::Insert),
            "UPDATE" => Ok(OperationType::Update),
            "DELETE" => Ok(OperationType::Delete),
            "ALTER" => Ok(OperationType::Alter),
            "DROP" => Ok(OperationType::Drop),
            "PROTECT" => Ok(OperationType::Protect),
            "UNPROTECT" => Ok(OperationType::Unprotect),
            "UNKNOWN" => Ok(OperationType::Unknown),
            _ => Err(WardenError::UnknownOperation(s.to_string())),
        }
    }
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Disposition of an intercepted operation.
///
/// Older console builds send `SUCCESS` for allowed operations; it is accepted
/// on input and always written back as `ALLOWED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditStatus {
    #[serde(alias = "SUCCESS")]
    Allowed,
    Blocked,
    Error,
}

impl AuditStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditStatus::Allowed => "ALLOWED",
            AuditStatus::Blocked => "BLOCKED",
            AuditStatus::Error => "ERROR",
        }
    }
}

impl std::str::FromStr for AuditStatus {
    type Err = WardenError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ALLOWED" | "SUCCESS" => Ok(AuditStatus::Allowed),
            "BLOCKED" => Ok(AuditStatus::Blocked),
            "ERROR" => Ok(AuditStatus::Error),
            _ => Err(WardenError::UnknownStatus(s.to_string())),
        }
    }
}

impl std::fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical form of a table name: trimmed and lowercased.
///
/// Table names are case-insensitive throughout the gateway, matching how
/// PostgreSQL folds unquoted identifiers.
pub fn normalize_table_name(raw: &str) -> crate::Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(WardenError::InvalidTableName(raw.to_string()));
    }
    Ok(trimmed.to_lowercase())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_type_parse_is_case_insensitive() {
        assert_eq!("select".parse::<OperationType>().unwrap(), OperationType::Select);
        assert_eq!(" Delete ".parse::<OperationType>().unwrap(), OperationType::Delete);
        assert!("merge".parse::<OperationType>().is_err());
    }

    #[test]
    fn test_destructive_operations() {
        let destructive: Vec<_> = OperationType::DATA
            .iter()
            .copied()
            .filter(|op| op.is_destructive())
            .collect();
        assert_eq!(
            destructive,
            vec![
                OperationType::Update,
                OperationType::Delete,
                OperationType::Alter,
                OperationType::Drop
            ]
        );
        assert!(!OperationType::Protect.is_destructive());
        assert!(!OperationType::Unknown.is_destructive());
    }

    #[test]
    fn test_audit_status_accepts_success_alias() {
        assert_eq!("SUCCESS".parse::<AuditStatus>().unwrap(), AuditStatus::Allowed);
        let status: AuditStatus = serde_json::from_str("\"SUCCESS\"").unwrap();
        assert_eq!(status, AuditStatus::Allowed);
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"ALLOWED\"");
    }

    #[test]
    fn test_normalize_table_name() {
        assert_eq!(normalize_table_name("  Products ").unwrap(), "products");
        assert!(normalize_table_name("   ").is_err());
    }
}
