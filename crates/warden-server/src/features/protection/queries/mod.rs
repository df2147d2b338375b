pub mod status;
pub mod summary;

pub use status::{GetProtectionStatusError, GetProtectionStatusQuery};
pub use summary::{GetProtectionSummaryQuery, ListUnprotectedTablesQuery};
