//! HTTP surface
//!
//! [`AppState`] owns the gateway (and through it the store, protection
//! registry and audit log) plus the loaded configuration. [`create_router`]
//! mounts the feature slices under `/api`; which slices exist depends on the
//! enforcement mode and access path.

pub mod response;

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::compression::CompressionLayer;

use crate::audit::AuditLog;
use crate::config::Config;
use crate::features;
use crate::gateway::Gateway;
use crate::middleware;
use crate::protection::ProtectionRegistry;
use crate::store::{DataStore, MemoryStore};

/// Application state shared across handlers
#[derive(Debug, Clone)]
pub struct AppState {
    pub gateway: Gateway,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wire registry and gateway around `store` and `audit` per `config`.
    pub fn new(config: Config, store: Arc<dyn DataStore>, audit: AuditLog) -> Self {
        let audit = Arc::new(audit);
        let registry = Arc::new(ProtectionRegistry::seeded(
            audit.clone(),
            &config.warden.known_tables,
            &config.warden.protected_tables,
        ));
        let gateway = Gateway::new(store, registry, audit)
            .with_enforcement(config.warden.enforcement)
            .with_statement_timeout(config.warden.statement_timeout());

        Self {
            gateway,
            config: Arc::new(config),
        }
    }

    /// State backed by the seeded in-memory catalog.
    pub fn in_memory(config: Config) -> Self {
        let audit = AuditLog::new().with_retention(config.warden.audit_retention);
        Self::new(config, Arc::new(MemoryStore::with_demo_data()), audit)
    }

    pub fn registry(&self) -> &Arc<ProtectionRegistry> {
        self.gateway.registry()
    }

    pub fn audit(&self) -> &Arc<AuditLog> {
        self.gateway.audit()
    }
}

/// Create the application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/api", features::router(&state.config))
        // Apply layers from innermost to outermost
        .layer(CompressionLayer::new())
        .layer(middleware::tracing_layer())
        .layer(middleware::cors_layer(&state.config.cors))
        .with_state(state)
}

async fn root(State(state): State<AppState>) -> impl IntoResponse {
    let warden = &state.config.warden;
    Json(json!({
        "name": "pg_warden gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "store": state.gateway.store().backend(),
        "accessPath": warden.access_path,
        "enforcement": warden.enforcement,
    }))
}

/// Health check handler
async fn health(State(state): State<AppState>) -> Response {
    let store = state.gateway.store();
    match store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "store": store.backend(),
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Store health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "store": store.backend(),
                    "error": e.to_string(),
                })),
            )
                .into_response()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_root_reports_variant() {
        let app = create_router(AppState::in_memory(Config::default()));
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["store"], "memory");
        assert_eq!(json["accessPath"], "structured");
        assert_eq!(json["enforcement"], "warden");
    }

    #[tokio::test]
    async fn test_health() {
        let app = create_router(AppState::in_memory(Config::default()));
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
