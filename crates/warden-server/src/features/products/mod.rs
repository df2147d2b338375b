//! Product catalog resource
//!
//! CRUD over the `products` table. Every call runs through the gateway on
//! the configured access path.

pub mod routes;
pub mod types;

pub use routes::products_routes;
pub use types::{Product, ProductInput};
