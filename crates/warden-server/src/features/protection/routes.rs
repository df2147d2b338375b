//! Protection API routes
//!
//! # Route Structure
//!
//! - `GET /api/protection/status/:table` - Protection state of one table
//! - `GET /api/protection/summary` - Protected/unprotected tables and overall status
//! - `GET /api/protection/unprotected` - Sorted list of unprotected tables
//! - `POST /api/protection/protect/:table` - Protect a table
//! - `POST /api/protection/unprotect/:table` - Unprotect a table
//!
//! Protect and unprotect are idempotent; `changed` reports whether the call
//! flipped the flag. Both are recorded in the audit log either way.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use crate::api::{response::ErrorResponse, AppState};
use crate::middleware::Caller;

use super::{
    commands::{ToggleProtectionCommand, ToggleProtectionError},
    queries::{
        GetProtectionStatusError, GetProtectionStatusQuery, GetProtectionSummaryQuery,
        ListUnprotectedTablesQuery,
    },
};

// ============================================================================
// Router Configuration
// ============================================================================

pub fn protection_routes() -> Router<AppState> {
    Router::new()
        .route("/status/:table", get(get_status))
        .route("/summary", get(get_summary))
        .route("/unprotected", get(list_unprotected))
        .route("/protect/:table", post(protect_table))
        .route("/unprotect/:table", post(unprotect_table))
}

// ============================================================================
// Command Handlers (Write Operations)
// ============================================================================

#[tracing::instrument(skip(state, caller), fields(table = %table))]
async fn protect_table(
    State(state): State<AppState>,
    caller: Caller,
    Path(table): Path<String>,
) -> Result<Response, ProtectionApiError> {
    let command = ToggleProtectionCommand::protect(table, caller.name());
    let response = super::commands::toggle::handle(state.registry(), command).await?;

    Ok((StatusCode::OK, Json(response)).into_response())
}

#[tracing::instrument(skip(state, caller), fields(table = %table))]
async fn unprotect_table(
    State(state): State<AppState>,
    caller: Caller,
    Path(table): Path<String>,
) -> Result<Response, ProtectionApiError> {
    let command = ToggleProtectionCommand::unprotect(table, caller.name());
    let response = super::commands::toggle::handle(state.registry(), command).await?;

    Ok((StatusCode::OK, Json(response)).into_response())
}

// ============================================================================
// Query Handlers (Read Operations)
// ============================================================================

#[tracing::instrument(skip(state), fields(table = %table))]
async fn get_status(
    State(state): State<AppState>,
    Path(table): Path<String>,
) -> Result<Response, ProtectionApiError> {
    let query = GetProtectionStatusQuery { table_name: table };
    let response = super::queries::status::handle(state.registry(), query).await?;

    Ok((StatusCode::OK, Json(response)).into_response())
}

async fn get_summary(State(state): State<AppState>) -> Response {
    let summary =
        super::queries::summary::handle_summary(state.registry(), GetProtectionSummaryQuery).await;
    (StatusCode::OK, Json(summary)).into_response()
}

async fn list_unprotected(State(state): State<AppState>) -> Response {
    let tables =
        super::queries::summary::handle_unprotected(state.registry(), ListUnprotectedTablesQuery)
            .await;
    (StatusCode::OK, Json(tables)).into_response()
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
enum ProtectionApiError {
    Toggle(ToggleProtectionError),
    Status(GetProtectionStatusError),
}

impl From<ToggleProtectionError> for ProtectionApiError {
    fn from(err: ToggleProtectionError) -> Self {
        Self::Toggle(err)
    }
}

impl From<GetProtectionStatusError> for ProtectionApiError {
    fn from(err: GetProtectionStatusError) -> Self {
        Self::Status(err)
    }
}

impl IntoResponse for ProtectionApiError {
    fn into_response(self) -> Response {
        match self {
            ProtectionApiError::Toggle(ToggleProtectionError::TableNameRequired)
            | ProtectionApiError::Toggle(ToggleProtectionError::InvalidTableName(_))
            | ProtectionApiError::Toggle(ToggleProtectionError::Registry(_))
            | ProtectionApiError::Status(GetProtectionStatusError::TableNameRequired)
            | ProtectionApiError::Status(GetProtectionStatusError::Registry(_)) => {
                let error = ErrorResponse::new("VALIDATION_ERROR", self.to_string());
                (StatusCode::BAD_REQUEST, Json(error)).into_response()
            },
        }
    }
}

impl std::fmt::Display for ProtectionApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Toggle(e) => write!(f, "{}", e),
            Self::Status(e) => write!(f, "{}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProtectionApiError::Toggle(ToggleProtectionError::TableNameRequired);
        assert!(err.to_string().contains("Table name is required"));
    }

    #[test]
    fn test_validation_errors_are_bad_request() {
        let err = ProtectionApiError::Toggle(ToggleProtectionError::InvalidTableName("x y".into()));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
