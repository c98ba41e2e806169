//! Backend client capability.
//!
//! The pool, transaction manager and execution surface only talk to the
//! [`Backend`] and [`Connection`] traits. [`SqlxBackend`] implements them
//! for URL-configured Postgres, MySQL and SQLite databases through the sqlx
//! Any driver.

pub mod any;

pub use any::SqlxBackend;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::compiler::{Dialect, SqlQuery};
use crate::error::Result;
use crate::value::Value;

/// A boxed backend connection.
pub type BoxConnection = Box<dyn Connection>;

/// Opens connections for one database.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Dialect the connections speak.
    fn dialect(&self) -> Dialect;

    /// Open a fresh connection.
    async fn connect(&self) -> Result<BoxConnection>;
}

/// One live backend connection. Never used by two callers at once.
#[async_trait]
pub trait Connection: Send {
    /// Run a compiled statement to completion.
    async fn execute(&mut self, query: &SqlQuery) -> Result<QueryResult>;

    /// Run a compiled statement, yielding rows as the backend produces them.
    fn stream<'c>(&'c mut self, query: &'c SqlQuery) -> BoxStream<'c, Result<Row>>;

    /// Run a parameterless control statement.
    async fn batch(&mut self, sql: &str) -> Result<()>;

    async fn begin(&mut self) -> Result<()> {
        self.batch("BEGIN").await
    }

    async fn commit(&mut self) -> Result<()> {
        self.batch("COMMIT").await
    }

    async fn rollback(&mut self) -> Result<()> {
        self.batch("ROLLBACK").await
    }

    async fn savepoint(&mut self, name: &str) -> Result<()> {
        self.batch(&format!("SAVEPOINT {}", name)).await
    }

    async fn release_savepoint(&mut self, name: &str) -> Result<()> {
        self.batch(&format!("RELEASE SAVEPOINT {}", name)).await
    }

    async fn rollback_to_savepoint(&mut self, name: &str) -> Result<()> {
        self.batch(&format!("ROLLBACK TO SAVEPOINT {}", name)).await
    }
}

/// A result row: column names and values in select order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    pub columns: Vec<String>,
    pub values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// Value of the named column.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The row as a JSON object.
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .columns
            .iter()
            .zip(&self.values)
            .map(|(c, v)| (c.clone(), v.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, value) in self.columns.iter().zip(&self.values) {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// Outcome of [`Connection::execute`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryResult {
    pub rows: Vec<Row>,
    pub rows_affected: u64,
    pub last_insert_id: Option<i64>,
}
