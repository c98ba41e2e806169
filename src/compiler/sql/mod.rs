pub mod mssql;
pub mod mysql;
pub mod postgres;
pub mod sqlite;
