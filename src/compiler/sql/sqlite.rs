use crate::ast::LockMode;
use crate::compiler::Dialect;
use crate::compiler::traits::SqlGenerator;

pub struct SqliteGenerator;

impl SqlGenerator for SqliteGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn bool_literal(&self, val: bool) -> String {
        if val { "1".to_string() } else { "0".to_string() }
    }

    fn limit_offset(&self, limit: Option<u64>, offset: Option<u64>, _ordered: bool) -> String {
        // OFFSET is only valid after a LIMIT
        match (limit, offset) {
            (Some(l), Some(o)) => format!(" LIMIT {} OFFSET {}", l, o),
            (Some(l), None) => format!(" LIMIT {}", l),
            (None, Some(o)) => format!(" LIMIT -1 OFFSET {}", o),
            (None, None) => String::new(),
        }
    }

    fn supports_returning(&self) -> bool {
        true
    }

    fn lock_clause(&self, _mode: LockMode) -> Option<&'static str> {
        None
    }

    fn missing_insert_value(&self) -> &'static str {
        "NULL"
    }

    fn truncate(&self, table: &str) -> String {
        format!("DELETE FROM {}", table)
    }
}
