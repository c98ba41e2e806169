use crate::ast::LockMode;
use crate::compiler::Dialect;
use crate::compiler::traits::SqlGenerator;

pub struct MssqlGenerator;

impl SqlGenerator for MssqlGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::Mssql
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("[{}]", name.replace(']', "]]"))
    }

    fn placeholder(&self, index: usize) -> String {
        format!("@p{}", index)
    }

    fn bool_literal(&self, val: bool) -> String {
        if val { "1".to_string() } else { "0".to_string() }
    }

    fn select_top(&self, limit: Option<u64>, offset: Option<u64>) -> Option<String> {
        match (limit, offset) {
            (Some(n), None) => Some(format!("TOP ({})", n)),
            _ => None,
        }
    }

    fn limit_offset(&self, limit: Option<u64>, offset: Option<u64>, ordered: bool) -> String {
        // Plain limits are rendered as TOP; OFFSET/FETCH needs an ORDER BY.
        let Some(off) = offset else {
            return String::new();
        };
        let mut sql = String::new();
        if !ordered {
            sql.push_str(" ORDER BY (SELECT 0)");
        }
        sql.push_str(&format!(" OFFSET {} ROWS", off));
        if let Some(lim) = limit {
            sql.push_str(&format!(" FETCH NEXT {} ROWS ONLY", lim));
        }
        sql
    }

    fn lock_clause(&self, _mode: LockMode) -> Option<&'static str> {
        None
    }

    fn truncate(&self, table: &str) -> String {
        format!("TRUNCATE TABLE {}", table)
    }
}
