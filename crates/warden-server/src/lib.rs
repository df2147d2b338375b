//! pg_warden server library
//!
//! A policy and audit gateway that sits between an application and its
//! database. Every data-access operation is classified, checked against
//! the table's protection state, then executed or refused, and the outcome
//! is appended to an audit log.
//!
//! # Components
//!
//! - **sql**: PostgreSQL parsing and the classifier mapping statement text to an operation
//!   type and target table
//! - **policy**: the pure protection policy
//! - **protection**: the protection registry
//! - **audit**: the append-only audit log, with optional PostgreSQL
//!   persistence
//! - **gateway**: the interception gateway tying the above together
//! - **store**: the in-memory and PostgreSQL data stores
//! - **benchmark**: measures gateway overhead per operation type
//! - **api** / **features**: the HTTP surface
//!
//! # Example
//!
//! ```no_run
//! use warden_server::{api, config::Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let state = api::AppState::in_memory(config);
//!     let app = api::create_router(state);
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod audit;
pub mod benchmark;
pub mod config;
pub mod error;
pub mod features;
pub mod gateway;
pub mod middleware;
pub mod policy;
pub mod protection;
pub mod sql;
pub mod store;

// Re-export commonly used types
pub use error::{ApiResult, AppError};
pub use gateway::{CallContext, Gateway, GatewayError, Operation};
