//! Feature modules implementing the warden API
//!
//! Each feature is a vertical slice with its own commands, queries and
//! routes.
//!
//! # Features
//!
//! - **protection**: table protection status and toggles
//! - **logs**: audit log views
//! - **benchmark**: gateway overhead measurements
//! - **products**, **payments**: demo resources, accessed through the gateway
//! - **injection**: unparameterized delete endpoints for the direct path
//!
//! # Architecture
//!
//! Each feature module follows the structure:
//! - `commands/` - Write operations
//! - `queries/` - Read operations
//! - `routes.rs` - HTTP route definitions
//! - `types.rs` - Resource types (if needed)

pub mod benchmark;
pub mod injection;
pub mod logs;
pub mod payments;
pub mod products;
pub mod protection;
pub mod shared;

use axum::Router;

use crate::api::AppState;
use crate::config::{AccessPath, Config};

/// Creates the API router with the feature routes this configuration
/// exposes.
///
/// Always mounted:
/// - `/benchmark` - Benchmark runs
/// - `/products` - Product CRUD
/// - `/payments`, `/customer_payments` - Payment CRUD
///
/// Warden enforcement only:
/// - `/protection` - Protection registry
/// - `/logs` - Audit log
///
/// Direct access path only:
/// - `/test` - Injection demo
pub fn router(config: &Config) -> Router<AppState> {
    let mut router = Router::new()
        .nest("/benchmark", benchmark::benchmark_routes())
        .nest("/products", products::products_routes())
        .nest("/payments", payments::payments_routes())
        .nest("/customer_payments", payments::payments_routes());

    if config.warden.enforcement.intercepts() {
        router = router
            .nest("/protection", protection::protection_routes())
            .nest("/logs", logs::logs_routes());
    }

    if config.warden.access_path == AccessPath::Direct {
        router = router.nest("/test", injection::injection_routes());
    }

    router
}
