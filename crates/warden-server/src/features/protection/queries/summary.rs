use crate::protection::{ProtectionRegistry, ProtectionSummary};

#[derive(Debug, Clone, Default)]
pub struct GetProtectionSummaryQuery;

#[derive(Debug, Clone, Default)]
pub struct ListUnprotectedTablesQuery;

pub async fn handle_summary(
    registry: &ProtectionRegistry,
    _query: GetProtectionSummaryQuery,
) -> ProtectionSummary {
    registry.summary().await
}

/// Sorted names of every known table that is not protected.
pub async fn handle_unprotected(
    registry: &ProtectionRegistry,
    _query: ListUnprotectedTablesQuery,
) -> Vec<String> {
    registry.unprotected_tables().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditLog;
    use crate::protection::OverallStatus;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_summary_and_unprotected_list() {
        let registry = ProtectionRegistry::seeded(
            Arc::new(AuditLog::new()),
            ["products", "customer_payments", "audit_notes"],
            ["products"],
        );

        let summary = handle_summary(&registry, GetProtectionSummaryQuery).await;
        assert_eq!(summary.overall_status, OverallStatus::SomeTablesUnprotected);
        assert_eq!(summary.protected_tables, vec!["products"]);
        assert_eq!(summary.unprotected_count, 2);

        let unprotected = handle_unprotected(&registry, ListUnprotectedTablesQuery).await;
        assert_eq!(unprotected, vec!["audit_notes", "customer_payments"]);
    }
}
