use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::sql::mssql::MssqlGenerator;
use super::sql::mysql::MysqlGenerator;
use super::sql::postgres::PostgresGenerator;
use super::sql::sqlite::SqliteGenerator;
use super::traits::SqlGenerator;
use crate::error::Error;

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    #[serde(alias = "pg", alias = "postgresql")]
    Postgres,
    #[serde(alias = "sqlite3")]
    Sqlite,
    #[serde(alias = "mysql2", alias = "mariadb")]
    Mysql,
    #[serde(alias = "sqlserver", alias = "tedious")]
    Mssql,
}

impl Dialect {
    pub fn generator(&self) -> Box<dyn SqlGenerator> {
        match self {
            Dialect::Postgres => Box::new(PostgresGenerator),
            Dialect::Sqlite => Box::new(SqliteGenerator),
            Dialect::Mysql => Box::new(MysqlGenerator),
            Dialect::Mssql => Box::new(MssqlGenerator),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
            Dialect::Mysql => "mysql",
            Dialect::Mssql => "mssql",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            "mysql" | "mysql2" | "mariadb" => Ok(Dialect::Mysql),
            "mssql" | "sqlserver" | "tedious" => Ok(Dialect::Mssql),
            other => Err(Error::Config(format!("unknown client '{}'", other))),
        }
    }
}
