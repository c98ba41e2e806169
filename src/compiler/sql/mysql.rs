use crate::ast::LockMode;
use crate::compiler::Dialect;
use crate::compiler::traits::SqlGenerator;

/// Largest row count MySQL accepts, used when only OFFSET is requested.
const MAX_ROWS: u64 = 18446744073709551615;

pub struct MysqlGenerator;

impl SqlGenerator for MysqlGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::Mysql
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn limit_offset(&self, limit: Option<u64>, offset: Option<u64>, _ordered: bool) -> String {
        match (limit, offset) {
            (Some(l), Some(o)) => format!(" LIMIT {} OFFSET {}", l, o),
            (Some(l), None) => format!(" LIMIT {}", l),
            (None, Some(o)) => format!(" LIMIT {} OFFSET {}", MAX_ROWS, o),
            (None, None) => String::new(),
        }
    }

    fn supports_full_join(&self) -> bool {
        false
    }

    fn lock_clause(&self, mode: LockMode) -> Option<&'static str> {
        match mode {
            LockMode::Update => Some(" FOR UPDATE"),
            LockMode::Share => Some(" LOCK IN SHARE MODE"),
        }
    }

    fn empty_insert(&self) -> &'static str {
        " () VALUES ()"
    }

    fn string_literal(&self, s: &str) -> String {
        format!("'{}'", s.replace('\\', "\\\\").replace('\'', "''"))
    }
}
