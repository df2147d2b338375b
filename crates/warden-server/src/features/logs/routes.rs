//! Audit log API routes
//!
//! # Route Structure
//!
//! - `GET /api/logs/operations?limit=&status=&tableName=&operationType=` - Filtered log
//! - `GET /api/logs/operations/recent` - Most recent records
//! - `GET /api/logs/operations/blocked` - Blocked records
//! - `GET /api/logs/operations/allowed` - Allowed records
//! - `GET /api/logs/operations/errors` - Failed records
//! - `GET /api/logs/operations/table/:table` - Records for one table
//! - `GET /api/logs/summary` (alias `/api/logs/operations/summary`) - Counts
//!
//! Every list is newest first.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use warden_common::AuditStatus;

use crate::api::{response::ErrorResponse, AppState};

use super::queries::{
    list::{self, ListOperationsError, ListOperationsQuery, RECENT_VIEW_LIMIT},
    summary::{self, GetLogSummaryQuery},
};

// ============================================================================
// Router Configuration
// ============================================================================

pub fn logs_routes() -> Router<AppState> {
    Router::new()
        .route("/operations", get(list_operations))
        .route("/operations/recent", get(list_recent))
        .route("/operations/blocked", get(list_blocked))
        .route("/operations/allowed", get(list_allowed))
        .route("/operations/errors", get(list_errors))
        .route("/operations/table/:table", get(list_by_table))
        .route("/operations/summary", get(get_summary))
        .route("/summary", get(get_summary))
}

// ============================================================================
// Query Handlers (Read Operations)
// ============================================================================

#[tracing::instrument(skip(state))]
async fn list_operations(
    State(state): State<AppState>,
    Query(query): Query<ListOperationsQuery>,
) -> Result<Response, LogsApiError> {
    let records = list::handle_operations(state.audit(), query)?;
    tracing::debug!(count = records.len(), "Operations listed via API");
    Ok((StatusCode::OK, Json(records)).into_response())
}

async fn list_recent(
    State(state): State<AppState>,
    Query(query): Query<ListOperationsQuery>,
) -> Result<Response, LogsApiError> {
    view(&state, query)
}

async fn list_blocked(
    State(state): State<AppState>,
    Query(query): Query<ListOperationsQuery>,
) -> Result<Response, LogsApiError> {
    view(&state, query.with_status(AuditStatus::Blocked))
}

async fn list_allowed(
    State(state): State<AppState>,
    Query(query): Query<ListOperationsQuery>,
) -> Result<Response, LogsApiError> {
    view(&state, query.with_status(AuditStatus::Allowed))
}

async fn list_errors(
    State(state): State<AppState>,
    Query(query): Query<ListOperationsQuery>,
) -> Result<Response, LogsApiError> {
    view(&state, query.with_status(AuditStatus::Error))
}

async fn list_by_table(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Query(query): Query<ListOperationsQuery>,
) -> Result<Response, LogsApiError> {
    view(&state, query.with_table(table))
}

fn view(state: &AppState, query: ListOperationsQuery) -> Result<Response, LogsApiError> {
    let records = list::handle(state.audit(), query, RECENT_VIEW_LIMIT)?;
    Ok((StatusCode::OK, Json(records)).into_response())
}

async fn get_summary(
    State(state): State<AppState>,
    Query(query): Query<GetLogSummaryQuery>,
) -> Response {
    let summary = summary::handle(state.audit(), query);
    (StatusCode::OK, Json(summary)).into_response()
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
struct LogsApiError(ListOperationsError);

impl From<ListOperationsError> for LogsApiError {
    fn from(err: ListOperationsError) -> Self {
        Self(err)
    }
}

impl IntoResponse for LogsApiError {
    fn into_response(self) -> Response {
        let error = ErrorResponse::new("VALIDATION_ERROR", self.0.to_string());
        (StatusCode::BAD_REQUEST, Json(error)).into_response()
    }
}
