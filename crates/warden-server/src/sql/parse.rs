//! Statement parsing on the PostgreSQL dialect
//!
//! Every statement the gateway sees goes through [`parse_one`]. Exactly one
//! statement is accepted; an empty input, a stacked second statement or any
//! token the grammar does not expect is an error.

use sqlparser::ast::{Ident, ObjectName, Statement};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Token, Tokenizer};
use thiserror::Error;

use super::is_valid_identifier;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("{0}")]
    Syntax(String),

    #[error("unicode escape identifiers are not accepted")]
    UnicodeEscape,

    #[error("empty statement")]
    Empty,

    #[error("multiple statements")]
    Multiple,
}

/// Parse `sql` as a single PostgreSQL statement. Trailing semicolons are
/// allowed.
pub fn parse_one(sql: &str) -> Result<Statement, ParseError> {
    let dialect = PostgreSqlDialect {};

    // PostgreSQL reads `U&"d\0061ta"` as the identifier `data`; the parser
    // would read it as `U` followed by an operator.
    let tokens = Tokenizer::new(&dialect, sql)
        .tokenize()
        .map_err(|e| ParseError::Syntax(e.to_string()))?;
    if has_unicode_escape_identifier(&tokens) {
        return Err(ParseError::UnicodeEscape);
    }

    let mut statements =
        Parser::parse_sql(&dialect, sql).map_err(|e| ParseError::Syntax(e.to_string()))?;
    match statements.len() {
        0 => Err(ParseError::Empty),
        1 => Ok(statements.remove(0)),
        _ => Err(ParseError::Multiple),
    }
}

fn has_unicode_escape_identifier(tokens: &[Token]) -> bool {
    tokens.windows(2).any(|pair| match pair {
        [Token::Word(word), Token::Ampersand] => {
            word.quote_style.is_none() && word.value.eq_ignore_ascii_case("u")
        },
        _ => false,
    })
}

/// Identifier as PostgreSQL resolves it: unquoted names fold to lowercase.
pub fn ident_name(ident: &Ident) -> String {
    match ident.quote_style {
        Some(_) => ident.value.clone(),
        None => ident.value.to_lowercase(),
    }
}

/// Table a policy decision applies to: the last name part, lowercased,
/// with any schema or catalog dropped.
///
/// Quoted names are folded as well, so `"Products"` is attributed to
/// `products`. Names that are not plain identifiers after folding are an
/// error.
pub fn table_name(name: &ObjectName) -> Result<String, String> {
    let last = name
        .0
        .last()
        .ok_or_else(|| "missing table name".to_string())?;
    let table = last.value.to_lowercase();
    if !is_valid_identifier(&table) {
        return Err(format!("unsupported table name {name}"));
    }
    Ok(table)
}

/// Whether executing the statement produces a result set: reads, and
/// writes with `RETURNING`.
pub fn returns_rows(statement: &Statement) -> bool {
    match statement {
        Statement::Query(_) => true,
        Statement::Insert(insert) => insert.returning.is_some(),
        Statement::Update { returning, .. } => returning.is_some(),
        Statement::Delete(delete) => delete.returning.is_some(),
        _ => false,
    }
}
