//! Interception gateway
//!
//! Every data-access operation passes through [`Gateway::execute`]:
//!
//! 1. classify the operation into an [`OperationType`] and target table
//! 2. take one snapshot of the table's protection state
//! 3. evaluate the policy against that snapshot
//! 4. on ALLOW run the statement on the store under the statement timeout
//!    and record `ALLOWED` (or `ERROR` on failure); on BLOCK record
//!    `BLOCKED` without touching the store
//!
//! The sequence runs on its own task, so a caller that drops the request
//! future half way still gets its audit record written.
//!
//! In vanilla enforcement the gateway forwards straight to the store: no
//! classification, no policy and no audit.

mod operation;

pub use operation::{Operation, RenderError, StructuredOp, Target};

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use warden_common::OperationType;

use crate::audit::{AuditLog, NewAuditRecord};
use crate::config::Enforcement;
use crate::policy::{evaluate, Decision, ProtectionState};
use crate::protection::ProtectionRegistry;
use crate::sql::{classify, Classification};
use crate::store::{DataStore, ExecOutcome, StoreError};

/// Result of an operation that reached the store.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayResponse {
    pub operation: OperationType,
    pub table_name: String,
    /// Statement sent to the store.
    pub statement: String,
    #[serde(flatten)]
    pub outcome: ExecOutcome,
    /// `None` in vanilla enforcement.
    pub audit_id: Option<i64>,
}

impl GatewayResponse {
    pub fn rows_affected(&self) -> u64 {
        self.outcome.rows_affected
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{reason}")]
    PolicyBlocked {
        operation: OperationType,
        table: String,
        reason: String,
        statement: String,
        audit_id: i64,
    },

    #[error("{reason}")]
    ClassificationFailed {
        reason: String,
        statement: String,
        audit_id: i64,
    },

    #[error("{source}")]
    Downstream {
        operation: OperationType,
        table: String,
        statement: String,
        #[source]
        source: StoreError,
        audit_id: Option<i64>,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("gateway task failed: {reason}")]
    Aborted {
        reason: String,
        audit_id: Option<i64>,
    },
}

impl GatewayError {
    pub fn not_found(table: &str, id: i64) -> Self {
        GatewayError::NotFound(format!("no row with id {id} in '{table}'"))
    }

    pub fn audit_id(&self) -> Option<i64> {
        match self {
            GatewayError::PolicyBlocked { audit_id, .. }
            | GatewayError::ClassificationFailed { audit_id, .. } => Some(*audit_id),
            GatewayError::Downstream { audit_id, .. } | GatewayError::Aborted { audit_id, .. } => {
                *audit_id
            },
            GatewayError::NotFound(_) => None,
        }
    }

    /// Statement the gateway refused or the store failed on.
    pub fn statement(&self) -> Option<&str> {
        match self {
            GatewayError::PolicyBlocked { statement, .. }
            | GatewayError::ClassificationFailed { statement, .. }
            | GatewayError::Downstream { statement, .. } => Some(statement),
            GatewayError::NotFound(_) | GatewayError::Aborted { .. } => None,
        }
    }

    pub fn is_blocked(&self) -> bool {
        matches!(
            self,
            GatewayError::PolicyBlocked { .. } | GatewayError::ClassificationFailed { .. }
        )
    }
}

/// Per-call context.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    pub user: Option<String>,
}

impl CallContext {
    pub fn user(user: impl Into<String>) -> Self {
        Self {
            user: Some(user.into()),
        }
    }
}

/// Operation after classification.
#[derive(Debug)]
enum Prepared {
    Known {
        operation: OperationType,
        table: String,
        statement: String,
        /// Structured lookups by id answer "not found" when nothing matched.
        by_id: Option<i64>,
    },
    Unrecognized {
        operation: OperationType,
        table: String,
        statement: String,
        reason: String,
    },
}

impl Prepared {
    fn summary(&self) -> (OperationType, String, String) {
        match self {
            Prepared::Known {
                operation,
                table,
                statement,
                ..
            }
            | Prepared::Unrecognized {
                operation,
                table,
                statement,
                ..
            } => (*operation, table.clone(), statement.clone()),
        }
    }
}

#[derive(Debug)]
struct GatewayInner {
    store: Arc<dyn DataStore>,
    registry: Arc<ProtectionRegistry>,
    audit: Arc<AuditLog>,
    enforcement: Enforcement,
    statement_timeout: Duration,
}

/// Cheap to clone; clones share the same store, registry and audit log.
#[derive(Debug, Clone)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

impl Gateway {
    pub fn new(
        store: Arc<dyn DataStore>,
        registry: Arc<ProtectionRegistry>,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            inner: Arc::new(GatewayInner {
                store,
                registry,
                audit,
                enforcement: Enforcement::Warden,
                statement_timeout: Duration::from_millis(
                    crate::config::DEFAULT_STATEMENT_TIMEOUT_MS,
                ),
            }),
        }
    }

    pub fn with_enforcement(self, enforcement: Enforcement) -> Self {
        self.rebuild(|inner| inner.enforcement = enforcement)
    }

    pub fn with_statement_timeout(self, timeout: Duration) -> Self {
        self.rebuild(|inner| inner.statement_timeout = timeout)
    }

    fn rebuild(self, apply: impl FnOnce(&mut GatewayInner)) -> Self {
        let mut inner = GatewayInner {
            store: self.inner.store.clone(),
            registry: self.inner.registry.clone(),
            audit: self.inner.audit.clone(),
            enforcement: self.inner.enforcement,
            statement_timeout: self.inner.statement_timeout,
        };
        apply(&mut inner);
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn enforcement(&self) -> Enforcement {
        self.inner.enforcement
    }

    pub fn store(&self) -> &Arc<dyn DataStore> {
        &self.inner.store
    }

    pub fn registry(&self) -> &Arc<ProtectionRegistry> {
        &self.inner.registry
    }

    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.inner.audit
    }

    /// Classify, evaluate, execute or reject, and record one operation.
    ///
    /// In warden enforcement exactly one audit record is appended per call,
    /// even if the returned future is dropped before completion.
    pub async fn execute(
        &self,
        operation: Operation,
        ctx: CallContext,
    ) -> Result<GatewayResponse, GatewayError> {
        let gateway = self.clone();
        if !self.inner.enforcement.intercepts() {
            return tokio::spawn(async move { gateway.passthrough(operation).await })
                .await
                .map_err(|e| GatewayError::Aborted {
                    reason: e.to_string(),
                    audit_id: None,
                })?;
        }

        let prepared = prepare(operation);
        let (kind, table, statement) = prepared.summary();
        let user = ctx.user.clone();

        match tokio::spawn(async move { gateway.run(prepared, ctx).await }).await {
            Ok(result) => result,
            Err(e) => {
                // The task records only after the store returns, so a panic
                // in the store has left no record yet.
                let record = self.inner.audit.append(
                    NewAuditRecord::failed(kind, table, statement).with_user(user),
                );
                error!(audit_id = record.id, error = %e, "Gateway task aborted");
                Err(GatewayError::Aborted {
                    reason: e.to_string(),
                    audit_id: Some(record.id),
                })
            },
        }
    }

    async fn run(&self, prepared: Prepared, ctx: CallContext) -> Result<GatewayResponse, GatewayError> {
        match prepared {
            Prepared::Unrecognized {
                operation,
                table,
                statement,
                reason,
            } => {
                let reason = match evaluate(operation, &table, ProtectionState::UNPROTECTED) {
                    Decision::Block { reason: base } => format!("{base}: {reason}"),
                    Decision::Allow => reason,
                };
                let record = self.inner.audit.append(
                    NewAuditRecord::blocked(operation, table, statement.clone(), reason.clone())
                        .with_user(ctx.user),
                );
                warn!(audit_id = record.id, %reason, "Operation not classified, blocked");
                Err(GatewayError::ClassificationFailed {
                    reason,
                    statement,
                    audit_id: record.id,
                })
            },
            Prepared::Known {
                operation,
                table,
                statement,
                by_id,
            } => {
                let state = self.inner.registry.state_of(&table).await;

                if let Decision::Block { reason } = evaluate(operation, &table, state) {
                    let record = self.inner.audit.append(
                        NewAuditRecord::blocked(
                            operation,
                            table.clone(),
                            statement.clone(),
                            reason.clone(),
                        )
                        .with_user(ctx.user),
                    );
                    info!(
                        audit_id = record.id,
                        operation = %operation,
                        table = %table,
                        %reason,
                        "Operation blocked"
                    );
                    return Err(GatewayError::PolicyBlocked {
                        operation,
                        table,
                        reason,
                        statement,
                        audit_id: record.id,
                    });
                }

                match self.run_statement(&statement).await {
                    Ok(outcome) => {
                        let record = self.inner.audit.append(
                            NewAuditRecord::allowed(operation, table.clone(), statement.clone())
                                .with_user(ctx.user),
                        );
                        debug!(
                            audit_id = record.id,
                            operation = %operation,
                            table = %table,
                            rows_affected = outcome.rows_affected,
                            "Operation executed"
                        );
                        if let (Some(id), 0) = (by_id, outcome.rows_affected) {
                            return Err(GatewayError::not_found(&table, id));
                        }
                        Ok(GatewayResponse {
                            operation,
                            table_name: table,
                            statement,
                            outcome,
                            audit_id: Some(record.id),
                        })
                    },
                    Err(source) => {
                        let record = self.inner.audit.append(
                            NewAuditRecord::failed(operation, table.clone(), statement.clone())
                                .with_user(ctx.user),
                        );
                        warn!(
                            audit_id = record.id,
                            operation = %operation,
                            table = %table,
                            error = %source,
                            "Operation failed downstream"
                        );
                        Err(GatewayError::Downstream {
                            operation,
                            table,
                            statement,
                            source,
                            audit_id: Some(record.id),
                        })
                    },
                }
            },
        }
    }

    /// Vanilla path: render if needed and forward.
    async fn passthrough(&self, operation: Operation) -> Result<GatewayResponse, GatewayError> {
        let (operation, table, statement, by_id) = match operation {
            Operation::Raw { statement } => (OperationType::Unknown, String::new(), statement, None),
            Operation::Structured(op) => {
                let by_id = match op.target {
                    Target::Id(id) => Some(id),
                    _ => None,
                };
                let table = op.table.trim().to_lowercase();
                let statement = op.render().map_err(|e| GatewayError::Downstream {
                    operation: op.kind,
                    table: table.clone(),
                    statement: String::new(),
                    source: StoreError::Syntax(e.to_string()),
                    audit_id: None,
                })?;
                (op.kind, table, statement, by_id)
            },
        };

        let outcome =
            self.run_statement(&statement)
                .await
                .map_err(|source| GatewayError::Downstream {
                    operation,
                    table: table.clone(),
                    statement: statement.clone(),
                    source,
                    audit_id: None,
                })?;

        if let (Some(id), 0) = (by_id, outcome.rows_affected) {
            return Err(GatewayError::not_found(&table, id));
        }

        Ok(GatewayResponse {
            operation,
            table_name: table,
            statement,
            outcome,
            audit_id: None,
        })
    }

    async fn run_statement(&self, statement: &str) -> Result<ExecOutcome, StoreError> {
        let timeout = self.inner.statement_timeout;
        match tokio::time::timeout(timeout, self.inner.store.execute(statement)).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(format!(
                "statement timed out after {} ms",
                timeout.as_millis()
            ))),
        }
    }
}

fn prepare(operation: Operation) -> Prepared {
    match operation {
        Operation::Raw { statement } => match classify(&statement) {
            Classification::Statement { operation, table } => Prepared::Known {
                operation,
                table,
                statement,
                by_id: None,
            },
            Classification::Unrecognized { reason } => Prepared::Unrecognized {
                operation: OperationType::Unknown,
                table: String::new(),
                statement,
                reason,
            },
        },
        Operation::Structured(op) => {
            let by_id = match op.target {
                Target::Id(id) => Some(id),
                _ => None,
            };
            match op.table_name().and_then(|table| Ok((table, op.render()?))) {
                Ok((table, statement)) => Prepared::Known {
                    operation: op.kind,
                    table,
                    statement,
                    by_id,
                },
                Err(e) => Prepared::Unrecognized {
                    operation: OperationType::Unknown,
                    table: op.table.trim().to_lowercase(),
                    statement: format!("{} {}", op.kind, op.table),
                    reason: e.to_string(),
                },
            }
        },
    }
}
