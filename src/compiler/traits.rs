//! Dialect generator trait.

use super::Dialect;
use crate::ast::LockMode;
use crate::value::Value;

/// Trait for dialect-specific SQL generation.
pub trait SqlGenerator: Send + Sync {
    fn dialect(&self) -> Dialect;
    /// Quote a single identifier part (no dots).
    fn quote_identifier(&self, name: &str) -> String;
    /// Generate the parameter placeholder (e.g. $1, ?, @p1) for a 1-based index.
    fn placeholder(&self, index: usize) -> String;
    /// Operator used for case-insensitive LIKE.
    fn ilike_operator(&self) -> &'static str {
        "LIKE"
    }
    /// Get the boolean literal (true/false vs 1/0).
    fn bool_literal(&self, val: bool) -> String {
        if val { "true".to_string() } else { "false".to_string() }
    }
    /// Trailing LIMIT/OFFSET clause, with a leading space. `ordered` tells
    /// whether the statement already has an ORDER BY.
    fn limit_offset(&self, limit: Option<u64>, offset: Option<u64>, ordered: bool) -> String {
        let _ = ordered;
        let mut sql = String::new();
        if let Some(n) = limit {
            sql.push_str(&format!(" LIMIT {}", n));
        }
        if let Some(n) = offset {
            sql.push_str(&format!(" OFFSET {}", n));
        }
        sql
    }
    /// Row-count prefix placed right after `SELECT [DISTINCT]` (T-SQL TOP).
    fn select_top(&self, limit: Option<u64>, offset: Option<u64>) -> Option<String> {
        let _ = (limit, offset);
        None
    }
    fn supports_returning(&self) -> bool {
        false
    }
    fn supports_full_join(&self) -> bool {
        true
    }
    /// Lock suffix for a SELECT, `None` when the dialect has no row locks.
    fn lock_clause(&self, mode: LockMode) -> Option<&'static str> {
        match mode {
            LockMode::Update => Some(" FOR UPDATE"),
            LockMode::Share => Some(" FOR SHARE"),
        }
    }
    /// Value used for a column missing from one row of a multi-row insert.
    fn missing_insert_value(&self) -> &'static str {
        "DEFAULT"
    }
    /// Suffix of an INSERT without any column.
    fn empty_insert(&self) -> &'static str {
        " DEFAULT VALUES"
    }
    /// Full TRUNCATE statement for an already quoted table.
    fn truncate(&self, table: &str) -> String {
        format!("TRUNCATE {}", table)
    }
    /// Render a value as an inline SQL literal.
    fn literal(&self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(v) => self.bool_literal(*v),
            Value::Int(v) => v.to_string(),
            Value::Float(v) => v.to_string(),
            Value::Text(v) => self.string_literal(v),
            Value::Bytes(v) => self.bytes_literal(v),
        }
    }
    fn string_literal(&self, s: &str) -> String {
        format!("'{}'", s.replace('\'', "''"))
    }
    fn bytes_literal(&self, bytes: &[u8]) -> String {
        format!("X'{}'", hex(bytes))
    }
}

pub(crate) fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
