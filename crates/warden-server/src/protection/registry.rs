use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::info;
use warden_common::{types::normalize_table_name, OperationType, WardenError};

use crate::audit::{AuditLog, NewAuditRecord};
use crate::policy::ProtectionState;

/// Protection state of one table as reported to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtectionStatus {
    pub table_name: String,
    pub is_protected: bool,
    pub protection_status: &'static str,
}

impl ProtectionStatus {
    fn new(table_name: String, is_protected: bool) -> Self {
        Self {
            table_name,
            is_protected,
            protection_status: status_label(is_protected),
        }
    }
}

/// Result of a protect or unprotect request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleOutcome {
    pub table_name: String,
    /// True only when the request flipped the flag.
    pub changed: bool,
    pub protection_status: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverallStatus {
    AllTablesProtected,
    SomeTablesUnprotected,
    AllTablesUnprotected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtectionSummary {
    pub unprotected_tables: Vec<String>,
    pub protected_tables: Vec<String>,
    pub unprotected_count: usize,
    pub total_tables: usize,
    pub overall_status: OverallStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

fn status_label(is_protected: bool) -> &'static str {
    if is_protected {
        "PROTECTED"
    } else {
        "UNPROTECTED"
    }
}

/// Table name -> protected flag.
///
/// Unknown tables read as unprotected and gain an entry on first reference
/// through this API. Entries are never removed.
#[derive(Debug)]
pub struct ProtectionRegistry {
    tables: RwLock<HashMap<String, bool>>,
    audit: Arc<AuditLog>,
}

impl ProtectionRegistry {
    pub fn new(audit: Arc<AuditLog>) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            audit,
        }
    }

    /// Registry pre-populated with `known` tables (unprotected) and
    /// `protected` tables. Seeding is not audited.
    pub fn seeded<K, P>(audit: Arc<AuditLog>, known: K, protected: P) -> Self
    where
        K: IntoIterator,
        K::Item: AsRef<str>,
        P: IntoIterator,
        P::Item: AsRef<str>,
    {
        let mut tables = HashMap::new();
        for name in known {
            if let Ok(name) = normalize_table_name(name.as_ref()) {
                tables.entry(name).or_insert(false);
            }
        }
        for name in protected {
            if let Ok(name) = normalize_table_name(name.as_ref()) {
                tables.insert(name, true);
            }
        }
        Self {
            tables: RwLock::new(tables),
            audit,
        }
    }

    /// Snapshot used by the gateway. Does not create entries.
    pub async fn state_of(&self, table: &str) -> ProtectionState {
        let key = table.trim().to_lowercase();
        let tables = self.tables.read().await;
        ProtectionState::from(tables.get(&key).copied().unwrap_or(false))
    }

    pub async fn is_protected(&self, table: &str) -> bool {
        self.state_of(table).await.is_protected
    }

    pub async fn status(&self, table: &str) -> Result<ProtectionStatus, WardenError> {
        let name = normalize_table_name(table)?;
        if let Some(&flag) = self.tables.read().await.get(&name) {
            return Ok(ProtectionStatus::new(name, flag));
        }
        let flag = *self.tables.write().await.entry(name.clone()).or_insert(false);
        Ok(ProtectionStatus::new(name, flag))
    }

    pub async fn protect(
        &self,
        table: &str,
        user: Option<String>,
    ) -> Result<ToggleOutcome, WardenError> {
        self.set(table, true, user).await
    }

    pub async fn unprotect(
        &self,
        table: &str,
        user: Option<String>,
    ) -> Result<ToggleOutcome, WardenError> {
        self.set(table, false, user).await
    }

    async fn set(
        &self,
        table: &str,
        protect: bool,
        user: Option<String>,
    ) -> Result<ToggleOutcome, WardenError> {
        let name = normalize_table_name(table)?;
        let (operation, function) = if protect {
            (OperationType::Protect, "warden_protect")
        } else {
            (OperationType::Unprotect, "warden_unprotect")
        };

        let changed = {
            let mut tables = self.tables.write().await;
            let entry = tables.entry(name.clone()).or_insert(false);
            let changed = *entry != protect;
            *entry = protect;

            // Appended under the write lock so audit order matches the
            // order in which toggles took effect.
            self.audit.append(
                NewAuditRecord::allowed(operation, name.clone(), format!("{function}('{name}')"))
                    .with_user(user),
            );
            changed
        };

        let verb = if protect { "protected" } else { "unprotected" };
        let message = if changed {
            format!("Table '{name}' is now {verb}")
        } else {
            format!("Table '{name}' is already {verb}")
        };

        info!(table = %name, protect, changed, "Protection toggled");

        Ok(ToggleOutcome {
            table_name: name,
            changed,
            protection_status: status_label(protect),
            message,
        })
    }

    pub async fn unprotected_tables(&self) -> Vec<String> {
        self.summary().await.unprotected_tables
    }

    pub async fn summary(&self) -> ProtectionSummary {
        let tables = self.tables.read().await;

        let mut unprotected_tables = Vec::new();
        let mut protected_tables = Vec::new();
        for (name, &flag) in tables.iter() {
            if flag {
                protected_tables.push(name.clone());
            } else {
                unprotected_tables.push(name.clone());
            }
        }
        unprotected_tables.sort();
        protected_tables.sort();

        let total_tables = tables.len();
        let unprotected_count = unprotected_tables.len();
        let overall_status = if unprotected_count == 0 {
            OverallStatus::AllTablesProtected
        } else if unprotected_count == total_tables {
            OverallStatus::AllTablesUnprotected
        } else {
            OverallStatus::SomeTablesUnprotected
        };
        let note = (unprotected_count == 0).then(|| {
            "All tables are protected. Use POST /api/protection/unprotect/{tableName} to unprotect a table."
                .to_string()
        });

        ProtectionSummary {
            unprotected_tables,
            protected_tables,
            unprotected_count,
            total_tables,
            overall_status,
            note,
        }
    }
}
