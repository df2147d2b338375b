//! Customer payment resource
//!
//! CRUD over the `customer_payments` table, the table the protection demo
//! is built around.

pub mod routes;
pub mod types;

pub use routes::payments_routes;
pub use types::{CustomerPayment, PaymentInput};
