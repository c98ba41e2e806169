//! # quarry
//!
//! A dialect-aware SQL query builder with a connection pool, transactions
//! and three ways to run a statement.
//!
//! ## Quick Example
//!
//! ```rust
//! use quarry::{Dialect, QueryBuilder};
//!
//! let q = QueryBuilder::new(Dialect::Postgres)
//!     .table("users")
//!     .select(["id", "email"])
//!     .where_eq("active", true)
//!     .limit(10)
//!     .to_sql()
//!     .unwrap();
//!
//! assert_eq!(q.sql, r#"SELECT "id", "email" FROM "users" WHERE "active" = $1 LIMIT 10"#);
//! ```
//!
//! ## Running statements
//!
//! ```rust,ignore
//! use quarry::prelude::*;
//!
//! let client = Client::connect(ClientConfig::from_toml(&config)?).await?;
//!
//! // deferred
//! let rows = client.table("users").where_eq("id", 1).first().await?;
//!
//! // stream
//! let mut rows = client.table("events").stream();
//! while let Some(row) = rows.next().await {
//!     println!("{}", row?.to_json());
//! }
//!
//! // transaction
//! client
//!     .transaction(|trx| async move {
//!         trx.table("accounts").where_eq("id", 1).decrement("balance", 10).await?;
//!         trx.table("accounts").where_eq("id", 2).increment("balance", 10).await?;
//!         Ok::<_, quarry::Error>(())
//!     })
//!     .await?;
//! ```
//!
//! ## Dialects
//!
//! | Dialect    | Identifiers | Placeholders | RETURNING |
//! |------------|-------------|--------------|-----------|
//! | `Postgres` | `"x"`       | `$1`         | yes       |
//! | `Sqlite`   | `"x"`       | `?`          | yes       |
//! | `Mysql`    | `` `x` ``   | `?`          | no        |
//! | `Mssql`    | `[x]`       | `@p1`        | no        |

pub mod ast;
pub mod backend;
pub mod builder;
pub mod client;
pub mod compiler;
pub mod config;
pub mod error;
pub mod execution;
pub mod hooks;
pub mod pool;
pub mod raw;
pub mod transaction;
pub mod value;

pub use ast::{Expr, JoinKind, Method, Operand, Operator, SortDir};
pub use backend::{Backend, BoxConnection, Connection, QueryResult, Row, SqlxBackend};
pub use builder::{IntoInList, JoinOn, QueryBuilder, query};
pub use client::{Client, ClientBuilder, Queryable};
pub use compiler::{Dialect, QueryOptions, SqlQuery, compile};
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use execution::{Response, RowStream, StreamOptions};
pub use hooks::QueryEvent;
pub use pool::{Pool, PoolConfig, PoolStats, PooledConnection};
pub use raw::Raw;
pub use transaction::{Transaction, TransactionState};
pub use value::Value;

pub mod prelude {
    pub use crate::ast::{JoinKind, Operator, SortDir};
    pub use crate::builder::{QueryBuilder, query};
    pub use crate::client::{Client, ClientBuilder, Queryable};
    pub use crate::compiler::Dialect;
    pub use crate::config::ClientConfig;
    pub use crate::error::{Error, Result};
    pub use crate::execution::{Response, StreamOptions};
    pub use crate::pool::PoolConfig;
    pub use crate::raw::Raw;
    pub use crate::transaction::Transaction;
    pub use crate::value::Value;
    pub use futures::StreamExt;
}
