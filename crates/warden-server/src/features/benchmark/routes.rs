//! Benchmark API routes
//!
//! - `POST /api/benchmark/run` - Run a benchmark through the gateway
//! - `GET /api/benchmark/health` - Readiness check for the console
//!
//! # Request Body
//!
//! ```json
//! {
//!   "iterations": 100,
//!   "operations": ["SELECT", "DELETE"],
//!   "tableName": "products",
//!   "protectionState": "protected"
//! }
//! ```

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use crate::api::{response::ErrorResponse, AppState};
use crate::benchmark::{self, BenchmarkError, BenchmarkRequest};
use crate::middleware::Caller;

pub fn benchmark_routes() -> Router<AppState> {
    Router::new()
        .route("/run", post(run_benchmark))
        .route("/health", get(health))
}

#[tracing::instrument(
    skip(state, caller, request),
    fields(
        iterations = request.iterations,
        operations = ?request.operations,
        table = ?request.table_name,
        protection = ?request.protection_state
    )
)]
async fn run_benchmark(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<BenchmarkRequest>,
) -> Result<Response, BenchmarkApiError> {
    let result = benchmark::run(&state.gateway, request, caller.context()).await?;
    Ok((StatusCode::OK, Json(result)).into_response())
}

async fn health() -> &'static str {
    "Benchmark service is ready"
}

#[derive(Debug)]
struct BenchmarkApiError(BenchmarkError);

impl From<BenchmarkError> for BenchmarkApiError {
    fn from(err: BenchmarkError) -> Self {
        Self(err)
    }
}

impl IntoResponse for BenchmarkApiError {
    fn into_response(self) -> Response {
        match self.0 {
            BenchmarkError::InvalidIterations(_)
            | BenchmarkError::NoOperations
            | BenchmarkError::UnsupportedTable(_)
            | BenchmarkError::InvalidTable(_) => {
                let error = ErrorResponse::new("VALIDATION_ERROR", self.0.to_string());
                (StatusCode::BAD_REQUEST, Json(error)).into_response()
            },
            BenchmarkError::Fixture(ref e) => {
                tracing::error!("Benchmark fixture error: {}", e);
                let error = ErrorResponse::new("BENCHMARK_FAILED", self.0.to_string());
                (StatusCode::INTERNAL_SERVER_ERROR, Json(error)).into_response()
            },
        }
    }
}
