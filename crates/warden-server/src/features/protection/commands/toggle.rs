use serde::Serialize;
use warden_common::WardenError;

use crate::protection::{ProtectionRegistry, ToggleOutcome};
use crate::sql::is_valid_identifier;

/// Protect or unprotect one table.
#[derive(Debug, Clone)]
pub struct ToggleProtectionCommand {
    pub table_name: String,
    pub protect: bool,
    pub user: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleProtectionResponse {
    pub status: &'static str,
    #[serde(flatten)]
    pub outcome: ToggleOutcome,
}

#[derive(Debug, thiserror::Error)]
pub enum ToggleProtectionError {
    #[error("Table name is required and cannot be empty")]
    TableNameRequired,
    #[error("Invalid table name '{0}'")]
    InvalidTableName(String),
    #[error(transparent)]
    Registry(#[from] WardenError),
}

impl ToggleProtectionCommand {
    pub fn protect(table_name: impl Into<String>, user: Option<String>) -> Self {
        Self {
            table_name: table_name.into(),
            protect: true,
            user,
        }
    }

    pub fn unprotect(table_name: impl Into<String>, user: Option<String>) -> Self {
        Self {
            table_name: table_name.into(),
            protect: false,
            user,
        }
    }

    pub fn validate(&self) -> Result<(), ToggleProtectionError> {
        let name = self.table_name.trim();
        if name.is_empty() {
            return Err(ToggleProtectionError::TableNameRequired);
        }
        if !is_valid_identifier(&name.to_lowercase()) {
            return Err(ToggleProtectionError::InvalidTableName(name.to_string()));
        }
        Ok(())
    }
}

#[tracing::instrument(skip(registry), fields(table = %command.table_name, protect = command.protect))]
pub async fn handle(
    registry: &ProtectionRegistry,
    command: ToggleProtectionCommand,
) -> Result<ToggleProtectionResponse, ToggleProtectionError> {
    command.validate()?;

    let outcome = if command.protect {
        registry.protect(&command.table_name, command.user).await?
    } else {
        registry.unprotect(&command.table_name, command.user).await?
    };

    Ok(ToggleProtectionResponse {
        status: "success",
        outcome,
    })
}
