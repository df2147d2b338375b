pub mod list;
pub mod summary;

pub use list::{ListOperationsError, ListOperationsQuery, RECENT_VIEW_LIMIT};
pub use summary::GetLogSummaryQuery;
