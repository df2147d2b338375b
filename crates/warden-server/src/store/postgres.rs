//! PostgreSQL store

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::{
    postgres::{PgPool, PgPoolOptions, PgRow},
    types::BigDecimal,
    Column, Row as _, TypeInfo,
};

use super::{DataStore, ExecOutcome, Row, StoreError};
use crate::config::DatabaseConfig;
use crate::sql::{parse, parse_one};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let mut options = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs));

        if let Some(idle_timeout) = config.idle_timeout_secs {
            options = options.idle_timeout(Duration::from_secs(idle_timeout));
        }

        let pool = options.connect(&config.url).await.map_err(map_sqlx_error)?;

        tracing::info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Database connection pool created"
        );

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Whether the statement produces a result set: reads, and writes with
/// `RETURNING`.
fn returns_rows(statement: &str) -> bool {
    parse_one(statement)
        .map(|parsed| parse::returns_rows(&parsed))
        .unwrap_or(false)
}

#[async_trait]
impl DataStore for PgStore {
    async fn execute(&self, statement: &str) -> Result<ExecOutcome, StoreError> {
        if returns_rows(statement) {
            let rows = sqlx::query(statement)
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
            let rows = rows.iter().map(row_to_json).collect();
            Ok(ExecOutcome::with_rows(rows))
        } else {
            let result = sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
            Ok(ExecOutcome::affected(result.rows_affected()))
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(map_sqlx_error)
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

fn row_to_json(row: &PgRow) -> Row {
    row.columns()
        .iter()
        .map(|column| {
            let idx = column.ordinal();
            (column.name().to_string(), decode_column(row, idx, column.type_info().name()))
        })
        .collect()
}

fn decode_column(row: &PgRow, idx: usize, type_name: &str) -> Value {
    fn get<'r, T>(row: &'r PgRow, idx: usize) -> Option<T>
    where
        T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
    {
        row.try_get::<Option<T>, _>(idx).ok().flatten()
    }

    let value = match type_name {
        "BOOL" => get::<bool>(row, idx).map(Value::from),
        "INT2" => get::<i16>(row, idx).map(Value::from),
        "INT4" => get::<i32>(row, idx).map(Value::from),
        "INT8" => get::<i64>(row, idx).map(Value::from),
        "FLOAT4" => get::<f32>(row, idx).map(|v| json!(v)),
        "FLOAT8" => get::<f64>(row, idx).map(|v| json!(v)),
        "NUMERIC" => get::<BigDecimal>(row, idx).map(|v| {
            v.to_string()
                .parse::<f64>()
                .map(|f| json!(f))
                .unwrap_or_else(|_| Value::String(v.to_string()))
        }),
        "TIMESTAMPTZ" => get::<chrono::DateTime<chrono::Utc>>(row, idx).map(|v| json!(v)),
        "TIMESTAMP" => get::<chrono::NaiveDateTime>(row, idx).map(|v| json!(v)),
        "DATE" => get::<chrono::NaiveDate>(row, idx).map(|v| json!(v)),
        "JSON" | "JSONB" => get::<Value>(row, idx),
        _ => get::<String>(row, idx).map(Value::String),
    };
    value.unwrap_or(Value::Null)
}

/// Translate SQLx failures into store errors by SQLSTATE class.
pub fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db) => {
            let message = db.message().to_string();
            match db.code().as_deref() {
                Some("42P01") => StoreError::UndefinedTable(undefined_name(&message)),
                Some("42703") => StoreError::UndefinedColumn(undefined_name(&message)),
                Some("57014") => StoreError::Timeout(message),
                Some("55000") | Some("42501") => StoreError::Rejected(message),
                Some(code) if code.starts_with("23") => StoreError::Constraint(message),
                Some(code) if code.starts_with("42") || code.starts_with("22") => {
                    StoreError::Syntax(message)
                },
                Some(code) if code.starts_with("08") => StoreError::Connection(message),
                _ => StoreError::Other(message),
            }
        },
        sqlx::Error::PoolTimedOut => StoreError::Connection("connection pool timed out".into()),
        sqlx::Error::PoolClosed => StoreError::Connection("connection pool closed".into()),
        sqlx::Error::Io(e) => StoreError::Connection(e.to_string()),
        sqlx::Error::Tls(e) => StoreError::Connection(e.to_string()),
        other => StoreError::Other(other.to_string()),
    }
}

/// Pulls `name` out of messages like `relation "name" does not exist`.
fn undefined_name(message: &str) -> String {
    message
        .split('"')
        .nth(1)
        .map(str::to_string)
        .unwrap_or_else(|| message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_returns_rows() {
        assert!(returns_rows("SELECT * FROM products"));
        assert!(returns_rows("DELETE FROM products WHERE id = 1 RETURNING *"));
        assert!(!returns_rows("DELETE FROM products WHERE id = 1"));
        assert!(!returns_rows("UPDATE products SET description = 'RETURNING'"));
    }

    #[test]
    fn test_undefined_name() {
        assert_eq!(undefined_name("relation \"nope\" does not exist"), "nope");
        assert_eq!(undefined_name("odd"), "odd");
    }

    #[test]
    fn test_pool_errors_are_connection_errors() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::PoolTimedOut),
            StoreError::Connection(_)
        ));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_execute_decodes_seeded_rows(pool: PgPool) {
        let store = PgStore::new(pool);
        let out = store
            .execute(
                "SELECT id, name, price, stock_quantity, description \
                 FROM products WHERE category = 'books' ORDER BY id",
            )
            .await
            .unwrap();

        assert_eq!(out.rows.len(), 2);
        let first = &out.rows[0];
        assert!(first["id"].is_i64());
        assert_eq!(first["name"], json!("Rust in Action"));
        assert_eq!(first["price"], json!(39.99));
        assert_eq!(first["stock_quantity"], json!(40));
        assert_eq!(first["description"], json!("Systems programming with Rust"));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_writes_report_affected_rows(pool: PgPool) {
        let store = PgStore::new(pool);
        let out = store
            .execute("UPDATE products SET stock_quantity = 0 WHERE category = 'furniture'")
            .await
            .unwrap();
        assert_eq!(out.rows_affected, 2);
        assert!(out.rows.is_empty());

        let out = store
            .execute("DELETE FROM customer_payments WHERE customer_name = 'Alice Popescu' RETURNING *")
            .await
            .unwrap();
        assert_eq!(out.rows.len(), 2);
        assert!(out.rows.iter().all(|r| r["card_type"].is_string()));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_errors_map_by_sqlstate(pool: PgPool) {
        let store = PgStore::new(pool);
        assert_eq!(
            store.execute("SELECT * FROM nope").await.unwrap_err(),
            StoreError::UndefinedTable("nope".into())
        );
        assert!(matches!(
            store
                .execute("INSERT INTO products (name, price) VALUES ('bad', -1)")
                .await
                .unwrap_err(),
            StoreError::Constraint(_)
        ));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_audit_table_rejects_rewrites(pool: PgPool) -> sqlx::Result<()> {
        sqlx::query(
            "INSERT INTO warden_operation_log \
             (id, operation_time, operation_type, table_name, status, user_name, query_text) \
             VALUES (1, NOW(), 'SELECT', 'products', 'ALLOWED', 'tester', 'SELECT 1')",
        )
        .execute(&pool)
        .await?;

        let store = PgStore::new(pool.clone());
        for statement in [
            "UPDATE warden_operation_log SET user_name = 'someone else'",
            "DELETE FROM warden_operation_log",
            "TRUNCATE warden_operation_log",
        ] {
            let err = store.execute(statement).await.unwrap_err();
            assert!(matches!(err, StoreError::Rejected(_)), "{statement}: {err:?}");
        }

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM warden_operation_log")
            .fetch_one(&pool)
            .await?;
        assert_eq!(count, 1);
        Ok(())
    }
}
