//! Record access through the gateway
//!
//! The demo resources (products, customer payments) are read and written
//! along one of two access paths:
//!
//! - **structured**: the handler describes the operation and the gateway
//!   renders the statement
//! - **direct**: the handler writes the SQL text itself and the gateway
//!   sees only a raw statement it must classify
//!
//! Either way every call goes through [`Gateway::execute`], so protection
//! and auditing apply uniformly.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::api::AppState;
use crate::config::AccessPath;
use crate::error::{ApiResult, AppError};
use crate::gateway::{
    CallContext, Gateway, GatewayError, GatewayResponse, Operation, StructuredOp, Target,
};
use crate::middleware::Caller;
use crate::sql::json_literal;
use crate::store::Row;

/// A resource stored in one table, decoded from its snake_case row.
pub trait Record: DeserializeOwned + Serialize + Send {
    const TABLE: &'static str;

    fn id(&self) -> i64;
}

/// Fields of a create or update request, keyed by column.
pub trait Fields {
    fn into_row(self) -> Row;
}

/// Record operations for one request.
#[derive(Debug, Clone)]
pub struct Records {
    gateway: Gateway,
    path: AccessPath,
    ctx: CallContext,
}

impl Records {
    pub fn new(state: &AppState, caller: &Caller) -> Self {
        Self {
            gateway: state.gateway.clone(),
            path: state.config.warden.access_path,
            ctx: caller.context(),
        }
    }

    pub fn access_path(&self) -> AccessPath {
        self.path
    }

    pub async fn list<R: Record>(&self) -> ApiResult<Vec<R>> {
        let operation = match self.path {
            AccessPath::Structured => StructuredOp::select(R::TABLE, Target::All).into(),
            AccessPath::Direct => Operation::raw(format!("SELECT * FROM {} ORDER BY id", R::TABLE)),
        };
        let response = self.send(operation).await?;
        let mut records = decode_all::<R>(response)?;
        if self.path == AccessPath::Structured {
            records.sort_by_key(|r| r.id());
        }
        Ok(records)
    }

    pub async fn get<R: Record>(&self, id: i64) -> ApiResult<R> {
        let operation = match self.path {
            AccessPath::Structured => StructuredOp::select(R::TABLE, Target::Id(id)).into(),
            AccessPath::Direct => {
                Operation::raw(format!("SELECT * FROM {} WHERE id = {id}", R::TABLE))
            },
        };
        let response = self.send(operation).await?;
        first::<R>(response, id)
    }

    pub async fn create<R: Record>(&self, fields: impl Fields) -> ApiResult<R> {
        let row = fields.into_row();
        let operation = match self.path {
            AccessPath::Structured => StructuredOp::insert(R::TABLE, row).into(),
            AccessPath::Direct => Operation::raw(insert_statement(R::TABLE, &row)),
        };
        let response = self.send(operation).await?;
        decode_all::<R>(response)?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Internal(format!("insert into '{}' returned no row", R::TABLE)))
    }

    pub async fn update<R: Record>(&self, id: i64, fields: impl Fields) -> ApiResult<R> {
        let row = fields.into_row();
        let operation = match self.path {
            AccessPath::Structured => StructuredOp::update(R::TABLE, Target::Id(id), row).into(),
            AccessPath::Direct => Operation::raw(update_statement(R::TABLE, id, &row)),
        };
        let response = self.send(operation).await?;
        first::<R>(response, id)
    }

    pub async fn delete<R: Record>(&self, id: i64) -> ApiResult<()> {
        let operation = match self.path {
            AccessPath::Structured => StructuredOp::delete(R::TABLE, Target::Id(id)).into(),
            AccessPath::Direct => Operation::raw(format!("DELETE FROM {} WHERE id = {id}", R::TABLE)),
        };
        let response = self.send(operation).await?;
        if response.rows_affected() == 0 {
            return Err(GatewayError::not_found(R::TABLE, id).into());
        }
        Ok(())
    }

    /// Run an arbitrary statement on the direct path.
    pub async fn raw(&self, statement: impl Into<String>) -> Result<GatewayResponse, GatewayError> {
        self.gateway.execute(Operation::raw(statement), self.ctx.clone()).await
    }

    async fn send(&self, operation: Operation) -> ApiResult<GatewayResponse> {
        Ok(self.gateway.execute(operation, self.ctx.clone()).await?)
    }
}

fn insert_statement(table: &str, row: &Row) -> String {
    let columns: Vec<&str> = row.keys().map(String::as_str).collect();
    let values: Vec<String> = row.values().map(json_literal).collect();
    format!(
        "INSERT INTO {table} ({}) VALUES ({}) RETURNING *",
        columns.join(", "),
        values.join(", ")
    )
}

fn update_statement(table: &str, id: i64, row: &Row) -> String {
    let assignments: Vec<String> = row
        .iter()
        .filter(|(column, _)| column.as_str() != "id")
        .map(|(column, value)| format!("{column} = {}", json_literal(value)))
        .collect();
    format!(
        "UPDATE {table} SET {} WHERE id = {id} RETURNING *",
        assignments.join(", ")
    )
}

fn decode_all<R: Record>(response: GatewayResponse) -> ApiResult<Vec<R>> {
    response
        .outcome
        .rows
        .into_iter()
        .map(|row| {
            serde_json::from_value(Value::Object(row)).map_err(|e| {
                AppError::Internal(format!("failed to decode '{}' row: {e}", R::TABLE))
            })
        })
        .collect()
}

fn first<R: Record>(response: GatewayResponse, id: i64) -> ApiResult<R> {
    decode_all::<R>(response)?
        .into_iter()
        .next()
        .ok_or_else(|| GatewayError::not_found(R::TABLE, id).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_insert_statement_escapes_literals() {
        let fields = row(json!({"name": "O'Reilly", "price": 12.5}));
        assert_eq!(
            insert_statement("products", &fields),
            "INSERT INTO products (name, price) VALUES ('O''Reilly', 12.5) RETURNING *"
        );
    }

    #[test]
    fn test_update_statement_skips_id() {
        let fields = row(json!({"id": 9, "card_type": "VISA"}));
        assert_eq!(
            update_statement("customer_payments", 3, &fields),
            "UPDATE customer_payments SET card_type = 'VISA' WHERE id = 3 RETURNING *"
        );
    }
}
