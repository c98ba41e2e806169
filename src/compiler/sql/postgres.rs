use crate::compiler::Dialect;
use crate::compiler::traits::{SqlGenerator, hex};

pub struct PostgresGenerator;

impl SqlGenerator for PostgresGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn ilike_operator(&self) -> &'static str {
        "ILIKE"
    }

    fn supports_returning(&self) -> bool {
        true
    }

    fn truncate(&self, table: &str) -> String {
        format!("TRUNCATE {} RESTART IDENTITY", table)
    }

    fn bytes_literal(&self, bytes: &[u8]) -> String {
        format!("'\\x{}'", hex(bytes))
    }
}
