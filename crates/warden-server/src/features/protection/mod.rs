pub mod commands;
pub mod queries;
pub mod routes;

pub use commands::{ToggleProtectionCommand, ToggleProtectionError, ToggleProtectionResponse};
pub use queries::{
    GetProtectionStatusError, GetProtectionStatusQuery, GetProtectionSummaryQuery,
    ListUnprotectedTablesQuery,
};
pub use routes::protection_routes;
