//! Injection demo routes
//!
//! - `DELETE /api/test/payments/by-id/:id`
//! - `DELETE /api/test/payments/by-customer/:customer`
//! - `DELETE /api/test/products/by-id/:id`
//! - `DELETE /api/test/products/by-category/:category`
//!
//! # Response
//!
//! ```json
//! { "success": true, "rowsAffected": 5, "executedQuery": "DELETE FROM ..." }
//! { "success": false, "rowsAffected": 0, "error": "...", "attemptedQuery": "DELETE FROM ..." }
//! ```

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::delete,
    Json, Router,
};
use serde::Serialize;

use crate::api::AppState;
use crate::error::store_error_status;
use crate::features::shared::Records;
use crate::gateway::GatewayError;
use crate::middleware::Caller;

pub fn injection_routes() -> Router<AppState> {
    Router::new()
        .route("/payments/by-id/:id", delete(delete_payment_by_id))
        .route("/payments/by-customer/:customer", delete(delete_payments_by_customer))
        .route("/products/by-id/:id", delete(delete_product_by_id))
        .route("/products/by-category/:category", delete(delete_products_by_category))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InjectionResponse {
    pub success: bool,
    pub rows_affected: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempted_query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InjectionResponse {
    fn executed(statement: String, rows_affected: u64) -> Self {
        Self {
            success: true,
            rows_affected,
            executed_query: Some(statement),
            attempted_query: None,
            error: None,
        }
    }

    fn failed(statement: String, error: String) -> Self {
        Self {
            success: false,
            rows_affected: 0,
            executed_query: None,
            attempted_query: Some(statement),
            error: Some(error),
        }
    }
}

async fn delete_payment_by_id(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Response {
    run(&state, &caller, format!("DELETE FROM customer_payments WHERE id = {id}")).await
}

async fn delete_payments_by_customer(
    State(state): State<AppState>,
    caller: Caller,
    Path(customer): Path<String>,
) -> Response {
    run(
        &state,
        &caller,
        format!("DELETE FROM customer_payments WHERE customer_name = '{customer}'"),
    )
    .await
}

async fn delete_product_by_id(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Response {
    run(&state, &caller, format!("DELETE FROM products WHERE id = {id}")).await
}

async fn delete_products_by_category(
    State(state): State<AppState>,
    caller: Caller,
    Path(category): Path<String>,
) -> Response {
    run(&state, &caller, format!("DELETE FROM products WHERE category = '{category}'")).await
}

#[tracing::instrument(skip(state, caller))]
async fn run(state: &AppState, caller: &Caller, statement: String) -> Response {
    tracing::warn!("Executing unparameterized statement");
    match Records::new(state, caller).raw(statement.clone()).await {
        Ok(response) => {
            let rows_affected = response.rows_affected();
            let body = InjectionResponse::executed(response.statement, rows_affected);
            (StatusCode::OK, Json(body)).into_response()
        },
        Err(err) => {
            let status = match &err {
                GatewayError::PolicyBlocked { .. } | GatewayError::ClassificationFailed { .. } => {
                    StatusCode::FORBIDDEN
                },
                GatewayError::Downstream { source, .. } => store_error_status(source).0,
                GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
                GatewayError::Aborted { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            };
            let attempted = err.statement().map(str::to_string).unwrap_or(statement);
            let body = InjectionResponse::failed(attempted, err.to_string());
            (status, Json(body)).into_response()
        },
    }
}
