pub mod queries;
pub mod routes;

pub use queries::{
    GetLogSummaryQuery, ListOperationsError, ListOperationsQuery, RECENT_VIEW_LIMIT,
};
pub use routes::logs_routes;
