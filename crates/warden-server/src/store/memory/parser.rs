//! Lowering of parsed statements into the subset the in-memory engine
//! executes

use serde_json::Value;
use sqlparser::ast::{
    self, AlterTableOperation, AssignmentTarget, BinaryOperator, FromTable, ObjectName, ObjectType,
    Query, SelectItem, SetExpr, TableFactor, TableWithJoins, UnaryOperator,
};

use crate::sql::parse::{ident_name, parse_one};

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(Select),
    Insert {
        table: String,
        columns: Vec<String>,
        rows: Vec<Vec<Expr>>,
        returning: bool,
    },
    Update {
        table: String,
        assignments: Vec<(String, Expr)>,
        filter: Option<Expr>,
        returning: bool,
    },
    Delete {
        table: String,
        filter: Option<Expr>,
        returning: bool,
    },
    Alter {
        table: String,
        actions: Vec<AlterAction>,
    },
    DropTable {
        table: String,
        if_exists: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlterAction {
    AddColumn { column: String, if_not_exists: bool },
    DropColumn { column: String, if_exists: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub projection: Projection,
    pub table: Option<String>,
    pub filter: Option<Expr>,
    pub order_by: Vec<(String, bool)>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    All,
    Items(Vec<(Expr, String)>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Column(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare(CompareOp, Box<Expr>, Box<Expr>),
    Arith(ArithOp, Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
    IsNull { expr: Box<Expr>, negated: bool },
    InList { expr: Box<Expr>, list: Vec<Expr>, negated: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

pub fn parse(sql: &str) -> Result<Statement, String> {
    let statement = parse_one(sql).map_err(|e| e.to_string())?;
    lower(statement)
}

fn lower(statement: ast::Statement) -> Result<Statement, String> {
    match statement {
        ast::Statement::Query(query) => select(*query).map(Statement::Select),
        ast::Statement::Insert(insert) => {
            if insert.on.is_some() {
                return Err("ON CONFLICT is not supported".to_string());
            }
            let source = insert
                .source
                .ok_or_else(|| "INSERT requires VALUES".to_string())?;
            let rows = match *source.body {
                SetExpr::Values(values) => values
                    .rows
                    .into_iter()
                    .map(|row| row.into_iter().map(expr).collect())
                    .collect::<Result<_, _>>()?,
                _ => return Err("INSERT requires VALUES".to_string()),
            };
            Ok(Statement::Insert {
                table: object_name(&insert.table_name)?,
                columns: insert.columns.iter().map(ident_name).collect(),
                rows,
                returning: returning(insert.returning)?,
            })
        },
        ast::Statement::Update {
            table,
            assignments,
            from,
            selection,
            returning: returned,
            ..
        } => {
            if from.is_some() {
                return Err("UPDATE ... FROM is not supported".to_string());
            }
            let assignments = assignments
                .into_iter()
                .map(|assignment| match assignment.target {
                    AssignmentTarget::ColumnName(column) => {
                        Ok((object_name(&column)?, expr(assignment.value)?))
                    },
                    AssignmentTarget::Tuple(_) => {
                        Err("tuple assignment is not supported".to_string())
                    },
                })
                .collect::<Result<_, String>>()?;
            Ok(Statement::Update {
                table: single_table(&table)?,
                assignments,
                filter: selection.map(expr).transpose()?,
                returning: returning(returned)?,
            })
        },
        ast::Statement::Delete(delete) => {
            let table = match &delete.from {
                FromTable::WithFromKeyword(tables) if delete.tables.is_empty() => {
                    match tables.as_slice() {
                        [target] => single_table(target)?,
                        _ => return Err("DELETE with more than one table".to_string()),
                    }
                },
                _ => return Err("expected DELETE FROM".to_string()),
            };
            if delete.using.is_some() {
                return Err("DELETE ... USING is not supported".to_string());
            }
            Ok(Statement::Delete {
                table,
                filter: delete.selection.map(expr).transpose()?,
                returning: returning(delete.returning)?,
            })
        },
        ast::Statement::AlterTable {
            name, operations, ..
        } => {
            let actions = operations
                .into_iter()
                .map(|operation| match operation {
                    // Column type and constraints are accepted but not enforced.
                    AlterTableOperation::AddColumn {
                        if_not_exists,
                        column_def,
                        ..
                    } => Ok(AlterAction::AddColumn {
                        column: ident_name(&column_def.name),
                        if_not_exists,
                    }),
                    AlterTableOperation::DropColumn {
                        column_name,
                        if_exists,
                        ..
                    } => Ok(AlterAction::DropColumn {
                        column: ident_name(&column_name),
                        if_exists,
                    }),
                    other => Err(format!("unsupported ALTER TABLE action: {other}")),
                })
                .collect::<Result<_, String>>()?;
            Ok(Statement::Alter {
                table: object_name(&name)?,
                actions,
            })
        },
        ast::Statement::Drop {
            object_type: ObjectType::Table,
            if_exists,
            names,
            ..
        } => match names.as_slice() {
            [name] => Ok(Statement::DropTable {
                table: object_name(name)?,
                if_exists,
            }),
            _ => Err("DROP TABLE with more than one table".to_string()),
        },
        other => Err(format!("unsupported statement: {other}")),
    }
}

/// Last part of a possibly qualified name; the schema is dropped.
fn object_name(name: &ObjectName) -> Result<String, String> {
    name.0
        .last()
        .map(ident_name)
        .ok_or_else(|| "missing name".to_string())
}

fn single_table(target: &TableWithJoins) -> Result<String, String> {
    match &target.relation {
        TableFactor::Table { name, .. } if target.joins.is_empty() => object_name(name),
        _ => Err("expected a single table".to_string()),
    }
}

/// Only `RETURNING *` is supported.
fn returning(items: Option<Vec<SelectItem>>) -> Result<bool, String> {
    match items.as_deref() {
        None => Ok(false),
        Some([SelectItem::Wildcard(_)]) => Ok(true),
        Some(_) => Err("only RETURNING * is supported".to_string()),
    }
}

fn select(query: Query) -> Result<Select, String> {
    if query.with.is_some() {
        return Err("WITH is not supported".to_string());
    }
    let ast::Select {
        projection,
        from,
        selection,
        into,
        having,
        distinct,
        ..
    } = match *query.body {
        SetExpr::Select(select) => *select,
        _ => return Err("only simple SELECT is supported".to_string()),
    };
    if into.is_some() || having.is_some() || distinct.is_some() {
        return Err("unsupported SELECT clause".to_string());
    }

    let projection = match projection.as_slice() {
        [SelectItem::Wildcard(_)] => Projection::All,
        _ => Projection::Items(
            projection
                .into_iter()
                .map(|item| match item {
                    SelectItem::UnnamedExpr(e) => {
                        let name = match &e {
                            ast::Expr::Identifier(ident) => ident_name(ident),
                            ast::Expr::CompoundIdentifier(parts) => {
                                parts.last().map(ident_name).unwrap_or_default()
                            },
                            _ => "?column?".to_string(),
                        };
                        Ok((expr(e)?, name))
                    },
                    SelectItem::ExprWithAlias { expr: e, alias } => {
                        Ok((expr(e)?, ident_name(&alias)))
                    },
                    other => Err(format!("unsupported select item {other}")),
                })
                .collect::<Result<_, String>>()?,
        ),
    };

    let table = match from.as_slice() {
        [] => None,
        [target] => Some(single_table(target)?),
        _ => return Err("only one table per SELECT is supported".to_string()),
    };

    let order_by = query
        .order_by
        .map(|order| order.exprs)
        .unwrap_or_default()
        .into_iter()
        .map(|item| {
            let column = match &item.expr {
                ast::Expr::Identifier(ident) => ident_name(ident),
                ast::Expr::CompoundIdentifier(parts) => {
                    parts.last().map(ident_name).unwrap_or_default()
                },
                other => return Err(format!("ORDER BY supports columns only, got {other}")),
            };
            Ok((column, item.asc == Some(false)))
        })
        .collect::<Result<_, String>>()?;

    let limit = match query.limit {
        None => None,
        Some(ast::Expr::Value(ast::Value::Number(n, _))) => Some(
            n.parse::<usize>()
                .map_err(|_| format!("invalid LIMIT value {n}"))?,
        ),
        Some(other) => return Err(format!("LIMIT requires a number, got {other}")),
    };

    Ok(Select {
        projection,
        table,
        filter: selection.map(expr).transpose()?,
        order_by,
        limit,
    })
}

fn expr(e: ast::Expr) -> Result<Expr, String> {
    let boxed = |e: Box<ast::Expr>| expr(*e).map(Box::new);
    match e {
        ast::Expr::Identifier(ident) => Ok(Expr::Column(ident_name(&ident))),
        ast::Expr::CompoundIdentifier(parts) => parts
            .last()
            .map(|ident| Expr::Column(ident_name(ident)))
            .ok_or_else(|| "empty identifier".to_string()),
        ast::Expr::Value(value) => literal(value).map(Expr::Literal),
        ast::Expr::Nested(inner) => expr(*inner),
        ast::Expr::UnaryOp { op, expr: inner } => match op {
            UnaryOperator::Not => Ok(Expr::Not(boxed(inner)?)),
            UnaryOperator::Minus => Ok(Expr::Neg(boxed(inner)?)),
            UnaryOperator::Plus => expr(*inner),
            other => Err(format!("unsupported operator {other}")),
        },
        ast::Expr::BinaryOp { left, op, right } => {
            let (left, right) = (boxed(left)?, boxed(right)?);
            Ok(match op {
                BinaryOperator::And => Expr::And(left, right),
                BinaryOperator::Or => Expr::Or(left, right),
                BinaryOperator::Eq => Expr::Compare(CompareOp::Eq, left, right),
                BinaryOperator::NotEq => Expr::Compare(CompareOp::NotEq, left, right),
                BinaryOperator::Lt => Expr::Compare(CompareOp::Lt, left, right),
                BinaryOperator::LtEq => Expr::Compare(CompareOp::LtEq, left, right),
                BinaryOperator::Gt => Expr::Compare(CompareOp::Gt, left, right),
                BinaryOperator::GtEq => Expr::Compare(CompareOp::GtEq, left, right),
                BinaryOperator::Plus => Expr::Arith(ArithOp::Add, left, right),
                BinaryOperator::Minus => Expr::Arith(ArithOp::Sub, left, right),
                BinaryOperator::Multiply => Expr::Arith(ArithOp::Mul, left, right),
                BinaryOperator::Divide => Expr::Arith(ArithOp::Div, left, right),
                other => return Err(format!("unsupported operator {other}")),
            })
        },
        ast::Expr::IsNull(inner) => Ok(Expr::IsNull {
            expr: boxed(inner)?,
            negated: false,
        }),
        ast::Expr::IsNotNull(inner) => Ok(Expr::IsNull {
            expr: boxed(inner)?,
            negated: true,
        }),
        ast::Expr::InList {
            expr: inner,
            list,
            negated,
        } => Ok(Expr::InList {
            expr: boxed(inner)?,
            list: list.into_iter().map(expr).collect::<Result<_, _>>()?,
            negated,
        }),
        other => Err(format!("unsupported expression {other}")),
    }
}

fn literal(value: ast::Value) -> Result<Value, String> {
    match value {
        ast::Value::Number(text, _) => parse_number(&text),
        ast::Value::SingleQuotedString(s)
        | ast::Value::EscapedStringLiteral(s)
        | ast::Value::NationalStringLiteral(s) => Ok(Value::String(s)),
        ast::Value::Boolean(b) => Ok(Value::Bool(b)),
        ast::Value::Null => Ok(Value::Null),
        other => Err(format!("unsupported literal {other}")),
    }
}

fn parse_number(text: &str) -> Result<Value, String> {
    if let Ok(i) = text.parse::<i64>() {
        return Ok(Value::from(i));
    }
    text.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| format!("invalid number {text}"))
}
