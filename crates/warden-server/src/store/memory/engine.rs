//! Table storage and statement execution for the in-memory store

use std::cmp::Ordering;
use std::collections::HashMap;

use serde_json::{json, Number, Value};

use super::parser::{AlterAction, ArithOp, CompareOp, Expr, Projection, Select, Statement};
use crate::store::{ExecOutcome, Row, StoreError};

#[derive(Debug, Clone)]
struct Column {
    name: String,
    not_null: bool,
}

#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
    next_id: i64,
}

impl Table {
    /// A table with an auto-assigned `id` column followed by `columns`.
    /// Columns marked with `true` are NOT NULL.
    pub fn new(name: &str, columns: &[(&str, bool)]) -> Self {
        let mut all = vec![Column {
            name: "id".to_string(),
            not_null: true,
        }];
        all.extend(columns.iter().map(|(name, not_null)| Column {
            name: name.to_string(),
            not_null: *not_null,
        }));
        Self {
            name: name.to_string(),
            columns: all,
            rows: Vec::new(),
            next_id: 1,
        }
    }

    fn column_index(&self, name: &str) -> Result<usize, StoreError> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| StoreError::UndefinedColumn(name.to_string()))
    }

    fn id_index(&self) -> Option<usize> {
        self.columns.iter().position(|c| c.name == "id")
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn to_row(&self, values: &[Value]) -> Row {
        self.columns
            .iter()
            .zip(values)
            .map(|(c, v)| (c.name.clone(), v.clone()))
            .collect()
    }

    fn check_row(&self, values: &[Value], skip: Option<usize>) -> Result<(), StoreError> {
        for (column, value) in self.columns.iter().zip(values) {
            if column.not_null && value.is_null() {
                return Err(StoreError::Constraint(format!(
                    "null value in column \"{}\" of relation \"{}\" violates not-null constraint",
                    column.name, self.name
                )));
            }
        }
        if let Some(idx) = self.id_index() {
            let id = &values[idx];
            let duplicate = self
                .rows
                .iter()
                .enumerate()
                .any(|(i, row)| Some(i) != skip && values_equal(&row[idx], id));
            if duplicate {
                return Err(StoreError::Constraint(format!(
                    "duplicate key value violates unique constraint \"{}_pkey\"",
                    self.name
                )));
            }
        }
        Ok(())
    }

    fn alter(&mut self, action: AlterAction) -> Result<(), StoreError> {
        match action {
            AlterAction::AddColumn {
                column,
                if_not_exists,
            } => {
                if self.column_index(&column).is_ok() {
                    if if_not_exists {
                        return Ok(());
                    }
                    return Err(StoreError::Syntax(format!(
                        "column \"{column}\" of relation \"{}\" already exists",
                        self.name
                    )));
                }
                self.columns.push(Column {
                    name: column,
                    not_null: false,
                });
                for row in &mut self.rows {
                    row.push(Value::Null);
                }
            },
            AlterAction::DropColumn { column, if_exists } => {
                let idx = match self.column_index(&column) {
                    Ok(idx) => idx,
                    Err(_) if if_exists => return Ok(()),
                    Err(e) => return Err(e),
                };
                self.columns.remove(idx);
                for row in &mut self.rows {
                    row.remove(idx);
                }
            },
        }
        Ok(())
    }

    /// Append a row given as column -> value, assigning `id` when absent.
    pub fn insert_row(&mut self, mut given: HashMap<String, Value>) -> Result<Row, StoreError> {
        for name in given.keys() {
            self.column_index(name)?;
        }

        let id_idx = self.id_index();
        let mut values: Vec<Value> = self
            .columns
            .iter()
            .map(|c| given.remove(&c.name).unwrap_or(Value::Null))
            .collect();

        if let Some(idx) = id_idx {
            if values[idx].is_null() {
                values[idx] = json!(self.next_id);
            }
        }

        self.check_row(&values, None)?;

        if let Some(id) = id_idx.and_then(|idx| values[idx].as_i64()) {
            let after = id.checked_add(1).ok_or_else(|| {
                StoreError::Constraint(format!(
                    "nextval: reached maximum value of sequence \"{}_id_seq\"",
                    self.name
                ))
            })?;
            self.next_id = self.next_id.max(after);
        }

        let row = self.to_row(&values);
        self.rows.push(values);
        Ok(row)
    }
}

/// All tables of one in-memory database.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tables: HashMap<String, Table>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&mut self, table: Table) {
        self.tables.insert(table.name.clone(), table);
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    fn table_ref(&self, name: &str) -> Result<&Table, StoreError> {
        self.tables
            .get(name)
            .ok_or_else(|| StoreError::UndefinedTable(name.to_string()))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut Table, StoreError> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| StoreError::UndefinedTable(name.to_string()))
    }

    /// Run a read-only statement.
    pub fn query(&self, select: &Select) -> Result<ExecOutcome, StoreError> {
        let Some(table_name) = &select.table else {
            return self.select_without_table(select);
        };
        let table = self.table_ref(table_name)?;

        if let Some(filter) = &select.filter {
            check_columns(filter, table)?;
        }
        if let Projection::Items(items) = &select.projection {
            for (expr, _) in items {
                check_columns(expr, table)?;
            }
        }

        let mut matched: Vec<&Vec<Value>> = Vec::new();
        for row in &table.rows {
            if matches_filter(select.filter.as_ref(), table, row)? {
                matched.push(row);
            }
        }

        if !select.order_by.is_empty() {
            let keys = select
                .order_by
                .iter()
                .map(|(name, desc)| Ok((table.column_index(name)?, *desc)))
                .collect::<Result<Vec<_>, StoreError>>()?;
            matched.sort_by(|a, b| {
                for (idx, desc) in &keys {
                    let ord = sort_order(&a[*idx], &b[*idx]);
                    let ord = if *desc { ord.reverse() } else { ord };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
        }

        if let Some(limit) = select.limit {
            matched.truncate(limit);
        }

        let rows = matched
            .into_iter()
            .map(|values| project(&select.projection, table, values))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ExecOutcome::with_rows(rows))
    }

    fn select_without_table(&self, select: &Select) -> Result<ExecOutcome, StoreError> {
        let Projection::Items(items) = &select.projection else {
            return Err(StoreError::Syntax(
                "SELECT * with no tables specified is not valid".to_string(),
            ));
        };
        let mut row = Row::new();
        for (expr, name) in items {
            row.insert(name.clone(), eval(expr, None, &[])?);
        }
        Ok(ExecOutcome::with_rows(vec![row]))
    }

    /// Run any statement, including reads.
    pub fn execute(&mut self, statement: Statement) -> Result<ExecOutcome, StoreError> {
        match statement {
            Statement::Select(select) => self.query(&select),
            Statement::Insert {
                table,
                columns,
                rows,
                returning,
            } => {
                let table = self.table_mut(&table)?;
                let columns = if columns.is_empty() {
                    table.columns.iter().map(|c| c.name.clone()).collect()
                } else {
                    columns
                };

                // Validate every row before inserting any of them.
                let mut staged = Vec::with_capacity(rows.len());
                for exprs in rows {
                    if exprs.len() != columns.len() {
                        return Err(StoreError::Syntax(
                            "INSERT has more expressions than target columns".to_string(),
                        ));
                    }
                    let mut given = HashMap::new();
                    for (column, expr) in columns.iter().zip(&exprs) {
                        given.insert(column.clone(), eval(expr, None, &[])?);
                    }
                    staged.push(given);
                }

                let snapshot = table.clone();
                let mut inserted = Vec::with_capacity(staged.len());
                for given in staged {
                    match table.insert_row(given) {
                        Ok(row) => inserted.push(row),
                        Err(e) => {
                            *table = snapshot;
                            return Err(e);
                        },
                    }
                }
                Ok(outcome(inserted, returning))
            },
            Statement::Update {
                table,
                assignments,
                filter,
                returning,
            } => {
                let table = self.table_mut(&table)?;
                if let Some(filter) = &filter {
                    check_columns(filter, table)?;
                }
                let targets = assignments
                    .iter()
                    .map(|(column, expr)| {
                        check_columns(expr, table)?;
                        Ok((table.column_index(column)?, expr))
                    })
                    .collect::<Result<Vec<_>, StoreError>>()?;

                let mut updates = Vec::new();
                for (i, row) in table.rows.iter().enumerate() {
                    if matches_filter(filter.as_ref(), table, row)? {
                        let mut new_row = row.clone();
                        for (idx, expr) in &targets {
                            new_row[*idx] = eval(expr, Some(&*table), row)?;
                        }
                        updates.push((i, new_row));
                    }
                }

                let snapshot = table.rows.clone();
                let mut changed = Vec::with_capacity(updates.len());
                for (i, new_row) in updates {
                    if let Err(e) = table.check_row(&new_row, Some(i)) {
                        table.rows = snapshot;
                        return Err(e);
                    }
                    changed.push(table.to_row(&new_row));
                    table.rows[i] = new_row;
                }
                Ok(outcome(changed, returning))
            },
            Statement::Delete {
                table,
                filter,
                returning,
            } => {
                let table = self.table_mut(&table)?;
                if let Some(filter) = &filter {
                    check_columns(filter, table)?;
                }

                let mut keep = Vec::with_capacity(table.rows.len());
                for row in &table.rows {
                    keep.push(!matches_filter(filter.as_ref(), table, row)?);
                }

                let mut deleted = Vec::new();
                let mut flags = keep.into_iter();
                let mut remaining = Vec::with_capacity(table.rows.len());
                for row in std::mem::take(&mut table.rows) {
                    if flags.next().unwrap_or(true) {
                        remaining.push(row);
                    } else {
                        deleted.push(table.to_row(&row));
                    }
                }
                table.rows = remaining;
                Ok(outcome(deleted, returning))
            },
            Statement::Alter { table, actions } => {
                let table = self.table_mut(&table)?;
                let snapshot = table.clone();
                for action in actions {
                    if let Err(e) = table.alter(action) {
                        *table = snapshot;
                        return Err(e);
                    }
                }
                Ok(ExecOutcome::default())
            },
            Statement::DropTable { table, if_exists } => {
                if self.tables.remove(&table).is_none() && !if_exists {
                    return Err(StoreError::UndefinedTable(table));
                }
                Ok(ExecOutcome::default())
            },
        }
    }
}

fn outcome(rows: Vec<Row>, returning: bool) -> ExecOutcome {
    if returning {
        ExecOutcome::with_rows(rows)
    } else {
        ExecOutcome::affected(rows.len() as u64)
    }
}

fn project(projection: &Projection, table: &Table, values: &[Value]) -> Result<Row, StoreError> {
    match projection {
        Projection::All => Ok(table.to_row(values)),
        Projection::Items(items) => {
            let mut row = Row::new();
            for (expr, name) in items {
                row.insert(name.clone(), eval(expr, Some(table), values)?);
            }
            Ok(row)
        },
    }
}

fn check_columns(expr: &Expr, table: &Table) -> Result<(), StoreError> {
    match expr {
        Expr::Literal(_) => Ok(()),
        Expr::Column(name) => table.column_index(name).map(|_| ()),
        Expr::Not(e) | Expr::Neg(e) | Expr::IsNull { expr: e, .. } => check_columns(e, table),
        Expr::And(a, b) | Expr::Or(a, b) | Expr::Compare(_, a, b) | Expr::Arith(_, a, b) => {
            check_columns(a, table)?;
            check_columns(b, table)
        },
        Expr::InList { expr, list, .. } => {
            check_columns(expr, table)?;
            list.iter().try_for_each(|e| check_columns(e, table))
        },
    }
}

fn matches_filter(filter: Option<&Expr>, table: &Table, row: &[Value]) -> Result<bool, StoreError> {
    match filter {
        None => Ok(true),
        Some(expr) => Ok(truth(&eval(expr, Some(table), row)?)? == Some(true)),
    }
}

/// SQL three-valued truth of a value.
fn truth(value: &Value) -> Result<Option<bool>, StoreError> {
    match value {
        Value::Bool(b) => Ok(Some(*b)),
        Value::Null => Ok(None),
        other => Err(StoreError::Syntax(format!(
            "argument of WHERE must be type boolean, not {other}"
        ))),
    }
}

fn from_truth(t: Option<bool>) -> Value {
    t.map(Value::Bool).unwrap_or(Value::Null)
}

fn eval(expr: &Expr, table: Option<&Table>, row: &[Value]) -> Result<Value, StoreError> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Column(name) => match table {
            Some(table) => Ok(row[table.column_index(name)?].clone()),
            None => Err(StoreError::UndefinedColumn(name.clone())),
        },
        Expr::Not(e) => Ok(from_truth(truth(&eval(e, table, row)?)?.map(|b| !b))),
        Expr::And(a, b) => {
            let left = truth(&eval(a, table, row)?)?;
            if left == Some(false) {
                return Ok(Value::Bool(false));
            }
            let right = truth(&eval(b, table, row)?)?;
            Ok(from_truth(match (left, right) {
                (_, Some(false)) => Some(false),
                (Some(true), Some(true)) => Some(true),
                _ => None,
            }))
        },
        Expr::Or(a, b) => {
            let left = truth(&eval(a, table, row)?)?;
            if left == Some(true) {
                return Ok(Value::Bool(true));
            }
            let right = truth(&eval(b, table, row)?)?;
            Ok(from_truth(match (left, right) {
                (_, Some(true)) => Some(true),
                (Some(false), Some(false)) => Some(false),
                _ => None,
            }))
        },
        Expr::Compare(op, a, b) => {
            let left = eval(a, table, row)?;
            let right = eval(b, table, row)?;
            Ok(from_truth(compare(&left, &right)?.map(|ord| match op {
                CompareOp::Eq => ord == Ordering::Equal,
                CompareOp::NotEq => ord != Ordering::Equal,
                CompareOp::Lt => ord == Ordering::Less,
                CompareOp::LtEq => ord != Ordering::Greater,
                CompareOp::Gt => ord == Ordering::Greater,
                CompareOp::GtEq => ord != Ordering::Less,
            })))
        },
        Expr::Arith(op, a, b) => arith(*op, &eval(a, table, row)?, &eval(b, table, row)?),
        Expr::Neg(e) => arith(ArithOp::Sub, &json!(0), &eval(e, table, row)?),
        Expr::IsNull { expr, negated } => {
            let is_null = eval(expr, table, row)?.is_null();
            Ok(Value::Bool(is_null != *negated))
        },
        Expr::InList {
            expr,
            list,
            negated,
        } => {
            let needle = eval(expr, table, row)?;
            let mut saw_null = needle.is_null();
            let mut found = false;
            for item in list {
                match compare(&needle, &eval(item, table, row)?)? {
                    Some(Ordering::Equal) => {
                        found = true;
                        break;
                    },
                    None => saw_null = true,
                    _ => {},
                }
            }
            let result = if found {
                Some(true)
            } else if saw_null {
                None
            } else {
                Some(false)
            };
            Ok(from_truth(result.map(|b| b != *negated)))
        },
    }
}

fn as_number(value: &Value) -> Result<Option<f64>, StoreError> {
    match value {
        Value::Number(n) => Ok(n.as_f64()),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| StoreError::Syntax(format!("invalid input syntax for type numeric: \"{s}\""))),
        _ => Ok(None),
    }
}

/// SQL comparison; `None` when either side is NULL.
fn compare(a: &Value, b: &Value) -> Result<Option<Ordering>, StoreError> {
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => Ok(None),
        (Value::String(x), Value::String(y)) => Ok(Some(x.cmp(y))),
        (Value::Bool(x), Value::Bool(y)) => Ok(Some(x.cmp(y))),
        (Value::Number(_), _) | (_, Value::Number(_)) => {
            match (as_number(a)?, as_number(b)?) {
                (Some(x), Some(y)) => Ok(x.partial_cmp(&y)),
                _ => Err(type_mismatch(a, b)),
            }
        },
        _ => Err(type_mismatch(a, b)),
    }
}

fn type_mismatch(a: &Value, b: &Value) -> StoreError {
    StoreError::Syntax(format!("operator does not exist: {a} = {b}"))
}

fn values_equal(a: &Value, b: &Value) -> bool {
    matches!(compare(a, b), Ok(Some(Ordering::Equal)))
}

/// Total order for ORDER BY: NULLs sort last, incomparable values keep
/// their relative order.
fn sort_order(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        _ => compare(a, b).ok().flatten().unwrap_or(Ordering::Equal),
    }
}

fn arith(op: ArithOp, a: &Value, b: &Value) -> Result<Value, StoreError> {
    if a.is_null() || b.is_null() {
        return Ok(Value::Null);
    }

    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        let exact = match op {
            ArithOp::Add => x.checked_add(y),
            ArithOp::Sub => x.checked_sub(y),
            ArithOp::Mul => x.checked_mul(y),
            ArithOp::Div if y == 0 => return Err(StoreError::Other("division by zero".into())),
            ArithOp::Div => x.checked_div(y),
        };
        return exact
            .map(Value::from)
            .ok_or_else(|| StoreError::Other("integer out of range".to_string()));
    }

    let (Some(x), Some(y)) = (as_number(a)?, as_number(b)?) else {
        return Err(type_mismatch(a, b));
    };
    let result = match op {
        ArithOp::Add => x + y,
        ArithOp::Sub => x - y,
        ArithOp::Mul => x * y,
        ArithOp::Div if y == 0.0 => return Err(StoreError::Other("division by zero".into())),
        ArithOp::Div => x / y,
    };
    Ok(Number::from_f64(result).map(Value::Number).unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::super::parser::parse;
    use super::*;

    fn catalog() -> Catalog {
        let mut catalog = Catalog::new();
        let mut items = Table::new("items", &[("name", true), ("qty", false)]);
        for (name, qty) in [("a", json!(1)), ("b", json!(5)), ("c", Value::Null)] {
            items
                .insert_row(HashMap::from([
                    ("name".to_string(), json!(name)),
                    ("qty".to_string(), qty),
                ]))
                .unwrap();
        }
        catalog.add_table(items);
        catalog
    }

    fn run(catalog: &mut Catalog, sql: &str) -> Result<ExecOutcome, StoreError> {
        catalog.execute(parse(sql).map_err(StoreError::Syntax)?)
    }

    #[test]
    fn test_select_with_filter_and_order() {
        let mut c = catalog();
        let out = run(&mut c, "SELECT name FROM items WHERE qty >= 1 ORDER BY qty DESC").unwrap();
        let names: Vec<_> = out.rows.iter().map(|r| r["name"].clone()).collect();
        assert_eq!(names, vec![json!("b"), json!("a")]);
    }

    #[test]
    fn test_null_comparisons_are_unknown() {
        let mut c = catalog();
        let out = run(&mut c, "SELECT * FROM items WHERE NOT qty = 1").unwrap();
        assert_eq!(out.rows.len(), 1);
        let out = run(&mut c, "SELECT * FROM items WHERE qty IS NULL").unwrap();
        assert_eq!(out.rows[0]["name"], json!("c"));
    }

    #[test]
    fn test_tautology_matches_every_row() {
        let mut c = catalog();
        let out = run(&mut c, "DELETE FROM items WHERE id = 1 OR 1=1").unwrap();
        assert_eq!(out.rows_affected, 3);
        assert!(c.table("items").unwrap().is_empty());
    }

    #[test]
    fn test_insert_assigns_ids_and_enforces_not_null() {
        let mut c = catalog();
        let out = run(&mut c, "INSERT INTO items (name, qty) VALUES ('d', 2) RETURNING *").unwrap();
        assert_eq!(out.rows[0]["id"], json!(4));
        let err = run(&mut c, "INSERT INTO items (qty) VALUES (2)").unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
        let err = run(&mut c, "INSERT INTO items (id, name) VALUES (1, 'dup')").unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
        assert_eq!(c.table("items").unwrap().len(), 4);
    }

    #[test]
    fn test_insert_at_maximum_id_is_an_error() {
        let mut c = catalog();
        let err = run(&mut c, "INSERT INTO items (id, name) VALUES (9223372036854775807, 'max')")
            .unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
        assert_eq!(c.table("items").unwrap().len(), 3);
    }

    #[test]
    fn test_update_uses_old_row_values() {
        let mut c = catalog();
        let out = run(&mut c, "UPDATE items SET qty = qty * 2 + 1 WHERE name IN ('a', 'b') RETURNING *")
            .unwrap();
        let qtys: Vec<_> = out.rows.iter().map(|r| r["qty"].clone()).collect();
        assert_eq!(qtys, vec![json!(3), json!(11)]);
    }

    #[test]
    fn test_undefined_relations() {
        let mut c = catalog();
        assert_eq!(
            run(&mut c, "SELECT * FROM missing").unwrap_err(),
            StoreError::UndefinedTable("missing".into())
        );
        assert_eq!(
            run(&mut c, "SELECT * FROM items WHERE nope = 1").unwrap_err(),
            StoreError::UndefinedColumn("nope".into())
        );
    }

    #[test]
    fn test_alter_and_drop() {
        let mut c = catalog();
        run(&mut c, "ALTER TABLE items ADD COLUMN note TEXT").unwrap();
        let out = run(&mut c, "SELECT * FROM items WHERE id = 1").unwrap();
        assert_eq!(out.rows[0]["note"], Value::Null);
        run(&mut c, "ALTER TABLE items DROP COLUMN note").unwrap();
        run(&mut c, "DROP TABLE items").unwrap();
        assert!(c.table("items").is_none());
        assert!(run(&mut c, "DROP TABLE IF EXISTS items").is_ok());
    }

    #[test]
    fn test_alter_applies_all_actions_or_none() {
        let mut c = catalog();
        run(&mut c, "ALTER TABLE items ADD COLUMN sku TEXT, ADD COLUMN note TEXT").unwrap();
        let out = run(&mut c, "SELECT * FROM items WHERE id = 1").unwrap();
        assert!(out.rows[0].contains_key("sku") && out.rows[0].contains_key("note"));

        let err = run(&mut c, "ALTER TABLE items ADD COLUMN extra TEXT, DROP COLUMN nope").unwrap_err();
        assert_eq!(err, StoreError::UndefinedColumn("nope".into()));
        let out = run(&mut c, "SELECT * FROM items WHERE id = 1").unwrap();
        assert!(!out.rows[0].contains_key("extra"));
    }

    #[test]
    fn test_select_without_table() {
        let mut c = catalog();
        let out = run(&mut c, "SELECT 1").unwrap();
        assert_eq!(out.rows[0]["?column?"], json!(1));
    }
}
