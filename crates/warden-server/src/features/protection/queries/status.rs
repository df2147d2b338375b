use warden_common::WardenError;

use crate::protection::{ProtectionRegistry, ProtectionStatus};

#[derive(Debug, Clone)]
pub struct GetProtectionStatusQuery {
    pub table_name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum GetProtectionStatusError {
    #[error("Table name is required and cannot be empty")]
    TableNameRequired,
    #[error(transparent)]
    Registry(#[from] WardenError),
}

impl GetProtectionStatusQuery {
    pub fn validate(&self) -> Result<(), GetProtectionStatusError> {
        if self.table_name.trim().is_empty() {
            return Err(GetProtectionStatusError::TableNameRequired);
        }
        Ok(())
    }
}

/// Unknown tables report as unprotected.
pub async fn handle(
    registry: &ProtectionRegistry,
    query: GetProtectionStatusQuery,
) -> Result<ProtectionStatus, GetProtectionStatusError> {
    query.validate()?;
    Ok(registry.status(&query.table_name).await?)
}
