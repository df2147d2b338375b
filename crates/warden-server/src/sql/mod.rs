//! SQL text handling
//!
//! Statements are parsed with `sqlparser` on the PostgreSQL dialect and
//! attributed to one verb and one target table; anything that does not fit
//! that shape is refused rather than guessed at. Rendering helpers produce
//! statements for structured operations with escaped literals and validated
//! identifiers.

pub mod classify;
pub mod parse;

pub use classify::{classify, Classification};
pub use parse::{parse_one, ParseError};

/// Maximum identifier length PostgreSQL keeps without truncation.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Whether `name` can be emitted unquoted as an identifier.
///
/// Accepts lowercase ASCII letters, digits and underscores, not starting with
/// a digit. Anything else is rejected rather than quoted.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {},
        _ => return false,
    }
    name.len() <= MAX_IDENTIFIER_LEN
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Render `value` as a standard SQL string literal.
pub fn quote_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        if c == '\'' {
            out.push('\'');
        }
        out.push(c);
    }
    out.push('\'');
    out
}

/// Render a JSON scalar as a SQL literal. Arrays and objects are stored as
/// their JSON text.
pub fn json_literal(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "NULL".to_string(),
        serde_json::Value::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => quote_literal(s),
        other => quote_literal(&other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identifier_validation() {
        assert!(is_valid_identifier("customer_payments"));
        assert!(is_valid_identifier("_tmp1"));
        assert!(!is_valid_identifier("1table"));
        assert!(!is_valid_identifier("Products"));
        assert!(!is_valid_identifier("products; drop table x"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier(&"a".repeat(64)));
    }

    #[test]
    fn test_quote_literal_doubles_quotes() {
        assert_eq!(quote_literal("O'Brien"), "'O''Brien'");
        assert_eq!(quote_literal(""), "''");
    }

    #[test]
    fn test_json_literal() {
        assert_eq!(json_literal(&json!(null)), "NULL");
        assert_eq!(json_literal(&json!(true)), "TRUE");
        assert_eq!(json_literal(&json!(12.5)), "12.5");
        assert_eq!(json_literal(&json!("it's")), "'it''s'");
    }
}
