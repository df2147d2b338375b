//! Customer payment API routes
//!
//! Mounted at both `/api/payments` and `/api/customer_payments`.
//!
//! - `GET /` - List payments ordered by id
//! - `POST /` - Record a payment
//! - `GET /:id` - Get one payment
//! - `PUT /:id` - Replace a payment's fields
//! - `DELETE /:id` - Delete a payment

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

use super::types::{CustomerPayment, PaymentInput};
use crate::api::AppState;
use crate::error::{ApiResult, AppError};
use crate::features::shared::Records;
use crate::middleware::Caller;

pub fn payments_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_payments).post(create_payment))
        .route(
            "/:id",
            get(get_payment).put(update_payment).delete(delete_payment),
        )
}

#[tracing::instrument(skip(state, caller))]
async fn list_payments(State(state): State<AppState>, caller: Caller) -> ApiResult<Response> {
    let payments = Records::new(&state, &caller).list::<CustomerPayment>().await?;
    Ok(Json(payments).into_response())
}

#[tracing::instrument(skip(state, caller))]
async fn get_payment(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<i64>,
) -> ApiResult<Response> {
    let payment = Records::new(&state, &caller).get::<CustomerPayment>(id).await?;
    Ok(Json(payment).into_response())
}

#[tracing::instrument(skip(state, caller, input))]
async fn create_payment(
    State(state): State<AppState>,
    caller: Caller,
    Json(input): Json<PaymentInput>,
) -> ApiResult<Response> {
    input
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let payment = Records::new(&state, &caller)
        .create::<CustomerPayment>(input)
        .await?;
    Ok((StatusCode::CREATED, Json(payment)).into_response())
}

#[tracing::instrument(skip(state, caller, input))]
async fn update_payment(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<i64>,
    Json(input): Json<PaymentInput>,
) -> ApiResult<Response> {
    input
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let payment = Records::new(&state, &caller)
        .update::<CustomerPayment>(id, input)
        .await?;
    Ok(Json(payment).into_response())
}

#[tracing::instrument(skip(state, caller))]
async fn delete_payment(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    Records::new(&state, &caller)
        .delete::<CustomerPayment>(id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::config::{AccessPath, Config};
    use crate::features::shared::test_helpers::TestApp;

    #[tokio::test]
    async fn test_alias_mount() {
        let app = TestApp::new(Config::default());
        let (status, a) = app.request(Method::GET, "/api/payments", None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, b) = app.request(Method::GET, "/api/customer_payments", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(a, b);
        assert_eq!(a.as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_update_on_direct_path_is_audited() {
        let mut config = Config::default();
        config.warden.access_path = AccessPath::Direct;
        let app = TestApp::new(config);

        let (status, body) = app
            .request_as(
                Method::PUT,
                "/api/payments/2",
                Some(json!({"customerName": "Bogdan Ionescu", "cardType": "VISA", "amount": 80.0})),
                Some("maria"),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cardType"], "VISA");

        let recent = app.state.audit().recent(1);
        assert_eq!(recent[0].user_name, "maria");
        assert!(recent[0].query_text.starts_with("UPDATE customer_payments SET"));
    }

    #[tokio::test]
    async fn test_blocked_update_keeps_row() {
        let app = TestApp::new(Config::default());
        app.request(Method::POST, "/api/protection/protect/customer_payments", None)
            .await;

        let (status, body) = app
            .request(
                Method::PUT,
                "/api/payments/1",
                Some(json!({"customerName": "Mallory", "amount": 1.0})),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["details"]["operation"], "UPDATE");

        let (_, payment) = app.request(Method::GET, "/api/payments/1", None).await;
        assert_eq!(payment["customerName"], "Alice Popescu");
    }
}
