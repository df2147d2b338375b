//! In-memory store
//!
//! Executes the statement subset the gateway and the demo endpoints produce:
//! `SELECT` (projection, `WHERE`, `ORDER BY`, `LIMIT`), `INSERT ... VALUES`,
//! `UPDATE ... SET`, `DELETE`, `ALTER TABLE ... ADD/DROP COLUMN` and
//! `DROP TABLE`, with `RETURNING *` on writes. Predicates follow SQL
//! three-valued logic, so `id = 1 OR 1=1` matches every row exactly as it
//! would on PostgreSQL.

mod engine;
mod parser;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::RwLock;

pub use engine::{Catalog, Table};

use super::{DataStore, ExecOutcome, StoreError};

#[derive(Debug, Default)]
pub struct MemoryStore {
    catalog: RwLock<Catalog>,
    latency: Option<Duration>,
}

impl MemoryStore {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog: RwLock::new(catalog),
            latency: None,
        }
    }

    /// Store holding the `products` and `customer_payments` demo tables.
    pub fn with_demo_data() -> Self {
        Self::new(demo_catalog())
    }

    /// Delay every statement by `latency`, simulating a remote database.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of rows currently in `table`, if it exists.
    pub async fn row_count(&self, table: &str) -> Option<usize> {
        self.catalog.read().await.table(table).map(Table::len)
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn execute(&self, statement: &str) -> Result<ExecOutcome, StoreError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        match parser::parse(statement).map_err(StoreError::Syntax)? {
            parser::Statement::Select(select) => self.catalog.read().await.query(&select),
            other => self.catalog.write().await.execute(other),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

fn seed(table: &mut Table, rows: Vec<Vec<(&str, Value)>>) {
    for row in rows {
        let given: HashMap<String, Value> = row
            .into_iter()
            .map(|(column, value)| (column.to_string(), value))
            .collect();
        // Seed rows satisfy every constraint of the freshly built tables.
        let _ = table.insert_row(given);
    }
}

/// The catalog the demo console expects.
pub fn demo_catalog() -> Catalog {
    let mut products = Table::new(
        "products",
        &[
            ("name", true),
            ("category", false),
            ("price", true),
            ("stock_quantity", false),
            ("description", false),
        ],
    );
    seed(
        &mut products,
        [
            ("Laptop Pro 15", "electronics", 1299.99, 25, "15 inch laptop, 32 GB RAM"),
            ("Wireless Mouse", "electronics", 24.99, 150, "Bluetooth mouse"),
            ("Mechanical Keyboard", "electronics", 89.5, 60, "Brown switches"),
            ("Rust in Action", "books", 39.99, 40, "Systems programming with Rust"),
            ("Database Internals", "books", 45.0, 35, "How storage engines work"),
            ("Standing Desk", "furniture", 349.0, 10, "Electric height adjustment"),
            ("Ergonomic Chair", "furniture", 229.99, 15, "Mesh back"),
            ("Coffee Beans 1kg", "groceries", 18.75, 200, "Medium roast"),
        ]
        .into_iter()
        .map(|(name, category, price, stock, description)| {
            vec![
                ("name", json!(name)),
                ("category", json!(category)),
                ("price", json!(price)),
                ("stock_quantity", json!(stock)),
                ("description", json!(description)),
            ]
        })
        .collect(),
    );

    let mut payments = Table::new(
        "customer_payments",
        &[
            ("customer_name", true),
            ("card_last_four_digits", false),
            ("card_type", false),
            ("amount", true),
            ("payment_date", false),
        ],
    );
    seed(
        &mut payments,
        [
            ("Alice Popescu", "4242", "VISA", 120.5, "2024-05-01T09:15:00"),
            ("Bogdan Ionescu", "5555", "MASTERCARD", 75.0, "2024-05-02T14:40:00"),
            ("Alice Popescu", "1881", "AMEX", 310.25, "2024-05-03T11:05:00"),
            ("Carmen Dinu", "4000", "VISA", 42.1, "2024-05-04T16:20:00"),
            ("Dan Matei", "3782", "AMEX", 999.99, "2024-05-05T08:00:00"),
        ]
        .into_iter()
        .map(|(customer, digits, card, amount, date)| {
            vec![
                ("customer_name", json!(customer)),
                ("card_last_four_digits", json!(digits)),
                ("card_type", json!(card)),
                ("amount", json!(amount)),
                ("payment_date", json!(date)),
            ]
        })
        .collect(),
    );

    let mut catalog = Catalog::new();
    catalog.add_table(products);
    catalog.add_table(payments);
    catalog
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_demo_catalog_is_seeded() {
        let store = MemoryStore::with_demo_data();
        assert_eq!(store.row_count("products").await, Some(8));
        assert_eq!(store.row_count("customer_payments").await, Some(5));
        assert_eq!(store.row_count("warden_operation_log").await, None);
    }

    #[tokio::test]
    async fn test_execute_round_trip() {
        let store = MemoryStore::with_demo_data();
        let out = store
            .execute("SELECT * FROM products WHERE category = 'books' ORDER BY price")
            .await
            .unwrap();
        assert_eq!(out.rows.len(), 2);
        assert_eq!(out.rows[0]["name"], json!("Rust in Action"));

        let out = store
            .execute("DELETE FROM customer_payments WHERE customer_name = 'Alice Popescu'")
            .await
            .unwrap();
        assert_eq!(out.rows_affected, 2);
        assert_eq!(store.row_count("customer_payments").await, Some(3));
    }

    #[tokio::test]
    async fn test_syntax_errors_surface() {
        let store = MemoryStore::with_demo_data();
        let err = store.execute("SELEC * FROM products").await.unwrap_err();
        assert!(matches!(err, StoreError::Syntax(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_is_applied() {
        let store = MemoryStore::with_demo_data().with_latency(Duration::from_millis(250));
        let started = tokio::time::Instant::now();
        store.execute("SELECT 1").await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(250));
    }
}
