//! Benchmark harness
//!
//! Drives synthetic operations through the [`Gateway`] and aggregates
//! per-operation latency and outcome counts. Every iteration targets rows the
//! harness created itself; fixtures are written and removed directly on the
//! store, so neither protection nor audit sees them and the catalog of real
//! rows is the same before and after a run.

mod stats;

pub use stats::{nearest_rank, CallOutcome, OperationStats, Recorder};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn};
use warden_common::{types::normalize_table_name, OperationType, WardenError};

use crate::gateway::{CallContext, Gateway, GatewayError, GatewayResponse, StructuredOp, Target};
use crate::store::{DataStore, Row, StoreError};

pub const DEFAULT_BENCHMARK_TABLE: &str = "products";
pub const DEFAULT_ITERATIONS: usize = 100;
pub const MAX_ITERATIONS: usize = 10_000;

/// Value stored in every fixture row's category / customer column.
pub const FIXTURE_MARKER: &str = "warden-benchmark";

const BENCHMARKED: [OperationType; 4] = [
    OperationType::Select,
    OperationType::Insert,
    OperationType::Update,
    OperationType::Delete,
];

fn default_iterations() -> usize {
    DEFAULT_ITERATIONS
}

/// Protection applied to the target table before a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtectionSetup {
    Protected,
    Unprotected,
    #[default]
    Skip,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkRequest {
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    #[serde(default)]
    pub operations: Vec<String>,
    #[serde(default)]
    pub table_name: Option<String>,
    #[serde(default)]
    pub protection_state: ProtectionSetup,
}

impl BenchmarkRequest {
    pub fn new<I, S>(iterations: usize, operations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            iterations,
            operations: operations.into_iter().map(Into::into).collect(),
            table_name: None,
            protection_state: ProtectionSetup::Skip,
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table_name = Some(table.into());
        self
    }

    pub fn with_protection(mut self, setup: ProtectionSetup) -> Self {
        self.protection_state = setup;
        self
    }

    pub fn validate(&self) -> Result<(), BenchmarkError> {
        if self.iterations == 0 || self.iterations > MAX_ITERATIONS {
            return Err(BenchmarkError::InvalidIterations(self.iterations));
        }
        if self.operations.iter().all(|op| op.trim().is_empty()) {
            return Err(BenchmarkError::NoOperations);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkResult {
    pub total_iterations: usize,
    pub total_time_ms: f64,
    pub table_name: String,
    pub protection_state: ProtectionSetup,
    pub enforcement: &'static str,
    pub operation_results: BTreeMap<String, OperationStats>,
}

#[derive(Debug, Error)]
pub enum BenchmarkError {
    #[error("iterations must be between 1 and {MAX_ITERATIONS}, got {0}")]
    InvalidIterations(usize),

    #[error("at least one operation is required")]
    NoOperations,

    #[error("no benchmark fixtures for table '{0}'")]
    UnsupportedTable(String),

    #[error(transparent)]
    InvalidTable(#[from] WardenError),

    #[error("fixture setup failed: {0}")]
    Fixture(#[from] StoreError),
}

/// Synthetic rows for one table.
#[derive(Debug, Clone, Copy)]
struct Fixture {
    table: &'static str,
    /// Column rewritten by UPDATE iterations.
    update_column: &'static str,
}

impl Fixture {
    fn for_table(table: &str) -> Option<Self> {
        match table {
            "products" => Some(Self {
                table: "products",
                update_column: "description",
            }),
            "customer_payments" => Some(Self {
                table: "customer_payments",
                update_column: "card_type",
            }),
            _ => None,
        }
    }

    fn row(&self, n: usize) -> Row {
        let value = match self.table {
            "products" => json!({
                "name": format!("Benchmark Product {n}"),
                "category": FIXTURE_MARKER,
                "price": 99.99,
                "stock_quantity": 100,
                "description": "Benchmark test product",
            }),
            _ => json!({
                "customer_name": FIXTURE_MARKER,
                "card_last_four_digits": "0000",
                "card_type": "BENCH",
                "amount": 1.99,
            }),
        };
        let mut row = Row::new();
        if let Value::Object(map) = value {
            row.extend(map);
        }
        row
    }

    fn update(&self, n: usize) -> Row {
        let mut row = Row::new();
        row.insert(self.update_column.to_string(), json!(format!("updated {n}")));
        row
    }
}

/// Fixture ids created during one run; removed when the run ends.
struct FixtureSet<'a> {
    store: &'a Arc<dyn DataStore>,
    fixture: Fixture,
    ids: Vec<i64>,
}

impl<'a> FixtureSet<'a> {
    fn new(store: &'a Arc<dyn DataStore>, fixture: Fixture) -> Self {
        Self {
            store,
            fixture,
            ids: Vec::new(),
        }
    }

    /// Insert one fixture row directly on the store.
    async fn create(&mut self, n: usize) -> Result<i64, StoreError> {
        let statement = StructuredOp::insert(self.fixture.table, self.fixture.row(n))
            .render()
            .map_err(|e| StoreError::Other(e.to_string()))?;
        let outcome = self.store.execute(&statement).await?;
        let id = outcome
            .rows
            .first()
            .and_then(|row| row.get("id"))
            .and_then(Value::as_i64)
            .ok_or_else(|| StoreError::Other("fixture insert returned no id".to_string()))?;
        self.ids.push(id);
        Ok(id)
    }

    fn track(&mut self, id: i64) {
        self.ids.push(id);
    }

    /// Delete every tracked row still present, bypassing the gateway.
    async fn cleanup(self) {
        if self.ids.is_empty() {
            return;
        }
        let ids: Vec<String> = self.ids.iter().map(i64::to_string).collect();
        let statement = format!(
            "DELETE FROM {} WHERE id IN ({})",
            self.fixture.table,
            ids.join(", ")
        );
        match self.store.execute(&statement).await {
            Ok(outcome) => debug!(
                table = self.fixture.table,
                removed = outcome.rows_affected,
                "Benchmark fixtures removed"
            ),
            Err(e) => warn!(
                table = self.fixture.table,
                error = %e,
                "Failed to remove benchmark fixtures"
            ),
        }
    }
}

fn outcome_of<T>(result: &Result<T, GatewayError>) -> CallOutcome {
    match result {
        Ok(_) => CallOutcome::Success,
        Err(e) if e.is_blocked() => CallOutcome::Blocked,
        Err(_) => CallOutcome::Error,
    }
}

fn returned_id(result: &Result<GatewayResponse, GatewayError>) -> Option<i64> {
    result
        .as_ref()
        .ok()?
        .outcome
        .rows
        .first()?
        .get("id")?
        .as_i64()
}

/// Run a benchmark through `gateway`.
///
/// Each listed operation runs `iterations` times in sequence. Unknown
/// operation names produce an entry carrying `error` instead of stats.
#[tracing::instrument(
    skip(gateway, request),
    fields(iterations = request.iterations, operations = ?request.operations)
)]
pub async fn run(
    gateway: &Gateway,
    request: BenchmarkRequest,
    ctx: CallContext,
) -> Result<BenchmarkResult, BenchmarkError> {
    request.validate()?;

    let table = normalize_table_name(
        request
            .table_name
            .as_deref()
            .unwrap_or(DEFAULT_BENCHMARK_TABLE),
    )?;
    let fixture =
        Fixture::for_table(&table).ok_or_else(|| BenchmarkError::UnsupportedTable(table.clone()))?;

    match request.protection_state {
        ProtectionSetup::Protected => {
            gateway.registry().protect(&table, ctx.user.clone()).await?;
        },
        ProtectionSetup::Unprotected => {
            gateway.registry().unprotect(&table, ctx.user.clone()).await?;
        },
        ProtectionSetup::Skip => {},
    }

    let started = Instant::now();
    let mut operation_results = BTreeMap::new();

    for name in &request.operations {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        match name.parse::<OperationType>() {
            Ok(op) if BENCHMARKED.contains(&op) => {
                if !operation_results.contains_key(op.as_str()) {
                    let stats = run_operation(gateway, fixture, op, request.iterations, &ctx).await;
                    operation_results.insert(op.as_str().to_string(), stats);
                }
            },
            _ => {
                let stats = OperationStats::failed(
                    request.iterations,
                    format!("Unknown operation: {name}"),
                );
                operation_results.insert(name.to_string(), stats);
            },
        }
    }

    let total_time_ms = started.elapsed().as_secs_f64() * 1000.0;
    info!(
        table = %table,
        total_time_ms,
        operations = operation_results.len(),
        "Benchmark finished"
    );

    Ok(BenchmarkResult {
        total_iterations: request.iterations,
        total_time_ms,
        table_name: table,
        protection_state: request.protection_state,
        enforcement: gateway.enforcement().as_str(),
        operation_results,
    })
}

async fn run_operation(
    gateway: &Gateway,
    fixture: Fixture,
    operation: OperationType,
    iterations: usize,
    ctx: &CallContext,
) -> OperationStats {
    let mut fixtures = FixtureSet::new(gateway.store(), fixture);
    let result = match operation {
        OperationType::Select => bench_select(gateway, &mut fixtures, iterations, ctx).await,
        OperationType::Insert => bench_insert(gateway, &mut fixtures, iterations, ctx).await,
        OperationType::Update => bench_update(gateway, &mut fixtures, iterations, ctx).await,
        _ => bench_delete(gateway, &mut fixtures, iterations, ctx).await,
    };
    fixtures.cleanup().await;

    result.unwrap_or_else(|e| {
        warn!(operation = %operation, error = %e, "Benchmark operation could not run");
        OperationStats::failed(iterations, e.to_string())
    })
}

async fn bench_select(
    gateway: &Gateway,
    fixtures: &mut FixtureSet<'_>,
    iterations: usize,
    ctx: &CallContext,
) -> Result<OperationStats, StoreError> {
    let id = fixtures.create(0).await?;
    let mut recorder = Recorder::with_capacity(iterations);
    for _ in 0..iterations {
        let op = StructuredOp::select(fixtures.fixture.table, Target::Id(id));
        let started = Instant::now();
        let result = gateway.execute(op.into(), ctx.clone()).await;
        recorder.record(started.elapsed(), outcome_of(&result));
    }
    Ok(recorder.finish())
}

async fn bench_insert(
    gateway: &Gateway,
    fixtures: &mut FixtureSet<'_>,
    iterations: usize,
    ctx: &CallContext,
) -> Result<OperationStats, StoreError> {
    let mut recorder = Recorder::with_capacity(iterations);
    for n in 0..iterations {
        let op = StructuredOp::insert(fixtures.fixture.table, fixtures.fixture.row(n));
        let started = Instant::now();
        let result = gateway.execute(op.into(), ctx.clone()).await;
        recorder.record(started.elapsed(), outcome_of(&result));
        if let Some(id) = returned_id(&result) {
            fixtures.track(id);
        }
    }
    Ok(recorder.finish())
}

async fn bench_update(
    gateway: &Gateway,
    fixtures: &mut FixtureSet<'_>,
    iterations: usize,
    ctx: &CallContext,
) -> Result<OperationStats, StoreError> {
    let id = fixtures.create(0).await?;
    let mut recorder = Recorder::with_capacity(iterations);
    for n in 0..iterations {
        let op = StructuredOp::update(
            fixtures.fixture.table,
            Target::Id(id),
            fixtures.fixture.update(n),
        );
        let started = Instant::now();
        let result = gateway.execute(op.into(), ctx.clone()).await;
        recorder.record(started.elapsed(), outcome_of(&result));
    }
    Ok(recorder.finish())
}

async fn bench_delete(
    gateway: &Gateway,
    fixtures: &mut FixtureSet<'_>,
    iterations: usize,
    ctx: &CallContext,
) -> Result<OperationStats, StoreError> {
    let mut recorder = Recorder::with_capacity(iterations);
    for n in 0..iterations {
        // Row creation is not part of the measured call.
        let id = fixtures.create(n).await?;
        let op = StructuredOp::delete(fixtures.fixture.table, Target::Id(id));
        let started = Instant::now();
        let result = gateway.execute(op.into(), ctx.clone()).await;
        recorder.record(started.elapsed(), outcome_of(&result));
    }
    Ok(recorder.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditLog;
    use crate::config::Enforcement;
    use crate::protection::ProtectionRegistry;
    use crate::store::MemoryStore;

    fn gateway() -> (Gateway, Arc<MemoryStore>) {
        let audit = Arc::new(AuditLog::new());
        let registry = Arc::new(ProtectionRegistry::seeded(
            audit.clone(),
            ["products", "customer_payments"],
            Vec::<String>::new(),
        ));
        let store = Arc::new(MemoryStore::with_demo_data());
        (Gateway::new(store.clone(), registry, audit), store)
    }

    #[test]
    fn test_request_validation() {
        assert!(BenchmarkRequest::new(0, ["SELECT"]).validate().is_err());
        assert!(BenchmarkRequest::new(MAX_ITERATIONS + 1, ["SELECT"]).validate().is_err());
        assert!(matches!(
            BenchmarkRequest::new(10, Vec::<String>::new()).validate(),
            Err(BenchmarkError::NoOperations)
        ));
        assert!(BenchmarkRequest::new(10, ["select"]).validate().is_ok());
    }

    #[test]
    fn test_request_deserializes_with_defaults() {
        let request: BenchmarkRequest =
            serde_json::from_str(r#"{"operations": ["SELECT"], "protectionState": "protected"}"#)
                .unwrap();
        assert_eq!(request.iterations, DEFAULT_ITERATIONS);
        assert_eq!(request.protection_state, ProtectionSetup::Protected);
        assert!(request.table_name.is_none());
    }

    #[tokio::test]
    async fn test_protected_select_and_delete() {
        let (gateway, store) = gateway();
        let request = BenchmarkRequest::new(100, ["SELECT", "DELETE"])
            .with_protection(ProtectionSetup::Protected);

        let result = run(&gateway, request, CallContext::default()).await.unwrap();

        let select = &result.operation_results["SELECT"];
        assert_eq!(select.success_count, 100);
        assert_eq!(select.blocked_count, 0);

        let delete = &result.operation_results["DELETE"];
        assert_eq!(delete.success_count, 0);
        assert_eq!(delete.blocked_count, 100);
        assert_eq!(delete.error_count, 0);

        assert_eq!(store.row_count("products").await, Some(8));
    }

    #[tokio::test]
    async fn test_unprotected_cycle_leaves_catalog_unchanged() {
        let (gateway, store) = gateway();
        let request = BenchmarkRequest::new(20, ["insert", "update", "delete", "select"])
            .with_table("customer_payments")
            .with_protection(ProtectionSetup::Unprotected);

        let result = run(&gateway, request, CallContext::default()).await.unwrap();

        for op in ["SELECT", "INSERT", "UPDATE", "DELETE"] {
            let stats = &result.operation_results[op];
            assert_eq!(stats.success_count, 20, "{op}");
            assert_eq!(stats.iterations, 20);
            assert!(stats.p50_time_ms <= stats.p95_time_ms);
            assert!(stats.p95_time_ms <= stats.p99_time_ms);
        }
        assert_eq!(store.row_count("customer_payments").await, Some(5));
    }

    #[tokio::test]
    async fn test_unknown_operation_reports_error() {
        let (gateway, _) = gateway();
        let request = BenchmarkRequest::new(5, ["SELECT", "TRUNCATE"]);
        let result = run(&gateway, request, CallContext::default()).await.unwrap();

        assert_eq!(
            result.operation_results["TRUNCATE"].error.as_deref(),
            Some("Unknown operation: TRUNCATE")
        );
        assert!(result.operation_results["SELECT"].error.is_none());
    }

    #[tokio::test]
    async fn test_unsupported_table() {
        let (gateway, _) = gateway();
        let request = BenchmarkRequest::new(5, ["SELECT"]).with_table("orders");
        let err = run(&gateway, request, CallContext::default()).await.unwrap_err();
        assert!(matches!(err, BenchmarkError::UnsupportedTable(t) if t == "orders"));
    }

    #[tokio::test]
    async fn test_vanilla_run_is_never_blocked() {
        let (gateway, store) = gateway();
        let gateway = gateway.with_enforcement(Enforcement::Vanilla);
        let request =
            BenchmarkRequest::new(10, ["DELETE"]).with_protection(ProtectionSetup::Protected);

        let result = run(&gateway, request, CallContext::default()).await.unwrap();
        assert_eq!(result.enforcement, "vanilla");
        assert_eq!(result.operation_results["DELETE"].success_count, 10);
        assert_eq!(store.row_count("products").await, Some(8));
    }
}
