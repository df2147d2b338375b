//! Statement classification
//!
//! Maps a raw statement to one [`OperationType`] and one target table.
//! Anything outside that shape is [`Classification::Unrecognized`], which the
//! policy always blocks.

use sqlparser::ast::{
    FromTable, ObjectName, ObjectType, OnConflict, OnConflictAction, OnInsert, Query, SetExpr,
    Statement, TableFactor, TableWithJoins,
};
use warden_common::OperationType;

use super::parse::{parse_one, table_name};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Statement {
        operation: OperationType,
        /// Lowercased table name without schema; empty for a `SELECT` that
        /// reads no table.
        table: String,
    },
    Unrecognized {
        reason: String,
    },
}

impl Classification {
    fn statement(operation: OperationType, table: String) -> Self {
        Self::Statement { operation, table }
    }

    pub(crate) fn unrecognized(reason: impl Into<String>) -> Self {
        Self::Unrecognized {
            reason: reason.into(),
        }
    }

    pub fn operation(&self) -> OperationType {
        match self {
            Self::Statement { operation, .. } => *operation,
            Self::Unrecognized { .. } => OperationType::Unknown,
        }
    }

    pub fn table(&self) -> &str {
        match self {
            Self::Statement { table, .. } => table,
            Self::Unrecognized { .. } => "",
        }
    }
}

pub fn classify(statement: &str) -> Classification {
    match parse_one(statement) {
        Ok(parsed) => classify_statement(&parsed).unwrap_or_else(Classification::unrecognized),
        Err(e) => Classification::unrecognized(e.to_string()),
    }
}

fn classify_statement(statement: &Statement) -> Result<Classification, String> {
    match statement {
        Statement::Query(query) => {
            if !is_read_only(query) {
                return Err("query writes data".to_string());
            }
            let table = match first_table(&query.body) {
                Some(name) => table_name(name)?,
                None => String::new(),
            };
            Ok(Classification::statement(OperationType::Select, table))
        },
        Statement::Insert(insert) => {
            if insert.source.as_deref().is_some_and(|q| !is_read_only(q)) {
                return Err("INSERT source writes data".to_string());
            }
            // An upsert that can rewrite existing rows is an update.
            let operation = match &insert.on {
                None
                | Some(OnInsert::OnConflict(OnConflict {
                    action: OnConflictAction::DoNothing,
                    ..
                })) => OperationType::Insert,
                Some(_) => OperationType::Update,
            };
            Ok(Classification::statement(operation, table_name(&insert.table_name)?))
        },
        Statement::Update { table, .. } => {
            Ok(Classification::statement(OperationType::Update, single_table(table)?))
        },
        Statement::Delete(delete) => {
            let targets = match &delete.from {
                FromTable::WithFromKeyword(tables) if delete.tables.is_empty() => tables,
                _ => return Err("expected DELETE FROM".to_string()),
            };
            match targets.as_slice() {
                [target] => Ok(Classification::statement(OperationType::Delete, single_table(target)?)),
                _ => Err("DELETE with more than one table".to_string()),
            }
        },
        Statement::AlterTable { name, .. } => {
            Ok(Classification::statement(OperationType::Alter, table_name(name)?))
        },
        Statement::Drop {
            object_type: ObjectType::Table,
            names,
            ..
        } => match names.as_slice() {
            [name] => Ok(Classification::statement(OperationType::Drop, table_name(name)?)),
            _ => Err("DROP TABLE with more than one table".to_string()),
        },
        other => {
            let text = other.to_string();
            let verb = text.split_whitespace().next().unwrap_or_default();
            Err(format!("unsupported statement '{verb}'"))
        },
    }
}

/// Plain table without joins.
fn single_table(target: &TableWithJoins) -> Result<String, String> {
    match &target.relation {
        TableFactor::Table { name, .. } if target.joins.is_empty() => table_name(name),
        _ => Err("expected a single table".to_string()),
    }
}

/// The first table named by the outermost `FROM`, if any.
fn first_table(body: &SetExpr) -> Option<&ObjectName> {
    match body {
        SetExpr::Select(select) => match &select.from.first()?.relation {
            TableFactor::Table { name, .. } => Some(name),
            _ => None,
        },
        SetExpr::Query(query) => first_table(&query.body),
        SetExpr::SetOperation { left, .. } => first_table(left),
        _ => None,
    }
}

/// No data-modifying `WITH` entry, no `SELECT INTO`, no DML body.
fn is_read_only(query: &Query) -> bool {
    let ctes_read_only = query
        .with
        .as_ref()
        .map_or(true, |with| with.cte_tables.iter().all(|cte| is_read_only(&cte.query)));
    ctes_read_only && body_is_read_only(&query.body)
}

fn body_is_read_only(body: &SetExpr) -> bool {
    match body {
        SetExpr::Select(select) => select.into.is_none(),
        SetExpr::Values(_) => true,
        SetExpr::Query(query) => is_read_only(query),
        SetExpr::SetOperation { left, right, .. } => {
            body_is_read_only(left) && body_is_read_only(right)
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::quote_literal;
    use proptest::prelude::*;

    fn op_table(sql: &str) -> (OperationType, String) {
        match classify(sql) {
            Classification::Statement { operation, table } => (operation, table),
            Classification::Unrecognized { reason } => panic!("unrecognized {sql:?}: {reason}"),
        }
    }

    fn is_unrecognized(sql: &str) -> bool {
        matches!(classify(sql), Classification::Unrecognized { .. })
    }

    #[test]
    fn test_classifies_each_verb() {
        let cases = [
            ("SELECT * FROM products", OperationType::Select, "products"),
            ("select name from public.Products where id = 1", OperationType::Select, "products"),
            ("INSERT INTO customer_payments (amount) VALUES (1)", OperationType::Insert, "customer_payments"),
            ("UPDATE ONLY products SET price = 2", OperationType::Update, "products"),
            ("DELETE FROM customer_payments WHERE id = 3;", OperationType::Delete, "customer_payments"),
            ("ALTER TABLE IF EXISTS products ADD COLUMN sku text", OperationType::Alter, "products"),
            ("DROP TABLE IF EXISTS \"Products\"", OperationType::Drop, "products"),
        ];
        for (sql, op, table) in cases {
            assert_eq!(op_table(sql), (op, table.to_string()), "{sql}");
        }
    }

    #[test]
    fn test_select_without_table() {
        assert_eq!(op_table("SELECT 1"), (OperationType::Select, String::new()));
        assert_eq!(
            op_table("SELECT * FROM (SELECT 1) AS t"),
            (OperationType::Select, String::new())
        );
    }

    #[test]
    fn test_select_skips_nested_from() {
        let sql = "SELECT (SELECT max(id) FROM customer_payments) FROM products";
        assert_eq!(op_table(sql), (OperationType::Select, "products".to_string()));
    }

    #[test]
    fn test_fail_closed_cases() {
        assert!(is_unrecognized(""));
        assert!(is_unrecognized("   -- only a comment"));
        assert!(is_unrecognized("WITH d AS (DELETE FROM products RETURNING *) SELECT * FROM d"));
        assert!(is_unrecognized("SELECT 1; DELETE FROM products"));
        assert!(is_unrecognized("TRUNCATE products"));
        assert!(is_unrecognized("DROP TABLE products, customer_payments"));
        assert!(is_unrecognized("ALTER USER postgres PASSWORD 'x'"));
        assert!(is_unrecognized("DELETE products"));
        assert!(is_unrecognized("SELECT 'unterminated"));
        assert!(is_unrecognized("42"));
    }

    #[test]
    fn test_trailing_semicolons_are_one_statement() {
        assert_eq!(op_table("DELETE FROM products;;").0, OperationType::Delete);
    }

    #[test]
    fn test_injected_condition_stays_delete() {
        let sql = "DELETE FROM customer_payments WHERE id = 1 OR 1=1";
        assert_eq!(
            op_table(sql),
            (OperationType::Delete, "customer_payments".to_string())
        );
    }

    #[test]
    fn test_unicode_escape_identifiers_are_unrecognized() {
        assert!(is_unrecognized(r#"DELETE FROM U&"product\0073""#));
        assert!(is_unrecognized(r#"drop table u&"customer_payment\0073""#));
    }

    #[test]
    fn test_tokens_after_table_are_unrecognized() {
        assert!(is_unrecognized("DELETE FROM products x y z garbage ( ("));
        assert!(is_unrecognized("UPDATE products SET price = 1 WHERE"));
        assert!(is_unrecognized("DROP TABLE products products"));
    }

    #[test]
    fn test_upsert_is_update() {
        let upsert = "INSERT INTO customer_payments (id, amount) VALUES (1, 5) \
                      ON CONFLICT (id) DO UPDATE SET amount = 0";
        assert_eq!(
            op_table(upsert),
            (OperationType::Update, "customer_payments".to_string())
        );
        let ignore = "INSERT INTO customer_payments (id, amount) VALUES (1, 5) ON CONFLICT DO NOTHING";
        assert_eq!(op_table(ignore).0, OperationType::Insert);
    }

    #[test]
    fn test_with_clause() {
        assert_eq!(
            op_table("WITH recent AS (SELECT * FROM customer_payments) SELECT * FROM products"),
            (OperationType::Select, "products".to_string())
        );
        assert!(is_unrecognized(
            "WITH moved AS (SELECT 1) INSERT INTO products (name) SELECT 'x' FROM moved"
        ));
        assert!(is_unrecognized("SELECT * INTO archive FROM customer_payments"));
    }

    proptest! {
        #[test]
        fn prop_classify_never_panics(input in "\\PC{0,80}") {
            let _ = classify(&input);
        }

        #[test]
        fn prop_literal_contents_do_not_change_classification(payload in "\\PC{0,40}") {
            let sql = format!("SELECT * FROM products WHERE name = {}", quote_literal(&payload));
            prop_assert_eq!(op_table(&sql), (OperationType::Select, "products".to_string()));
        }

        #[test]
        fn prop_comment_contents_are_ignored(payload in "[^*/\n]{0,40}") {
            let sql = format!("/* {payload} */ DELETE -- {payload}\nFROM products");
            prop_assert_eq!(op_table(&sql), (OperationType::Delete, "products".to_string()));
        }

        #[test]
        fn prop_stacked_statements_are_unrecognized(
            first in "(SELECT \\* FROM products|INSERT INTO products \\(name\\) VALUES \\('a'\\))",
            second in "(DELETE FROM products|DROP TABLE products|SELECT 1)",
        ) {
            let sql = format!("{first}; {second}");
            prop_assert!(is_unrecognized(&sql));
        }
    }
}
