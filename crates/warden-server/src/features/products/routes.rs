//! Product API routes
//!
//! - `GET /api/products` - List products ordered by id
//! - `POST /api/products` - Create a product
//! - `GET /api/products/:id` - Get one product
//! - `PUT /api/products/:id` - Replace a product's fields
//! - `DELETE /api/products/:id` - Delete a product

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

use super::types::{Product, ProductInput};
use crate::api::AppState;
use crate::error::{ApiResult, AppError};
use crate::features::shared::Records;
use crate::middleware::Caller;

pub fn products_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route(
            "/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
}

#[tracing::instrument(skip(state, caller))]
async fn list_products(State(state): State<AppState>, caller: Caller) -> ApiResult<Response> {
    let products = Records::new(&state, &caller).list::<Product>().await?;
    Ok(Json(products).into_response())
}

#[tracing::instrument(skip(state, caller))]
async fn get_product(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<i64>,
) -> ApiResult<Response> {
    let product = Records::new(&state, &caller).get::<Product>(id).await?;
    Ok(Json(product).into_response())
}

#[tracing::instrument(skip(state, caller, input), fields(name = %input.name))]
async fn create_product(
    State(state): State<AppState>,
    caller: Caller,
    Json(input): Json<ProductInput>,
) -> ApiResult<Response> {
    input
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let product = Records::new(&state, &caller).create::<Product>(input).await?;
    Ok((StatusCode::CREATED, Json(product)).into_response())
}

#[tracing::instrument(skip(state, caller, input))]
async fn update_product(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<i64>,
    Json(input): Json<ProductInput>,
) -> ApiResult<Response> {
    input
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let product = Records::new(&state, &caller).update::<Product>(id, input).await?;
    Ok(Json(product).into_response())
}

#[tracing::instrument(skip(state, caller))]
async fn delete_product(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    Records::new(&state, &caller).delete::<Product>(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
