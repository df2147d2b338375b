//! Injection demo endpoints
//!
//! Deliberately unsafe deletes that splice the path segment straight into
//! the SQL text. They exist to show what the gateway does with a statement
//! it did not build: on an unprotected table `1 OR 1=1` empties the table,
//! on a protected one the whole statement is refused.
//!
//! Mounted only on the direct access path.

pub mod routes;

pub use routes::{injection_routes, InjectionResponse};
