//! Error types for quarry.

use std::time::Duration;

use thiserror::Error;

use crate::compiler::Dialect;
use crate::transaction::TransactionState;

/// Boxed backend diagnostic, kept verbatim as the error source.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The main error type for quarry operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed builder chain (e.g. no table bound).
    #[error("Builder state error: {0}")]
    BuilderState(String),

    /// A clause that the current statement kind cannot carry.
    #[error("Statement kind mismatch: {clause} is not valid on a {kind} statement")]
    StatementKindMismatch { kind: &'static str, clause: String },

    /// The target dialect cannot express a requested clause.
    #[error("Unsupported feature: {feature} is not available on {dialect}")]
    UnsupportedFeature { feature: String, dialect: Dialect },

    /// Non-blocking acquire found every connection in use.
    #[error("Pool exhausted: all {0} connections are acquired")]
    PoolExhausted(usize),

    /// Acquire waited longer than the configured timeout.
    #[error("Timed out after {0:?} waiting for a pooled connection")]
    AcquireTimeout(Duration),

    /// The pool has been destroyed.
    #[error("Pool closed")]
    PoolClosed,

    /// A `before_create` hook rejected a freshly opened connection.
    #[error("Connection init failed: {0}")]
    ConnectionInit(anyhow::Error),

    /// Query issued on a transaction that already committed or rolled back.
    #[error("Transaction closed: transaction is already {0}")]
    TransactionClosed(TransactionState),

    /// The backend rejected a statement.
    #[error("Query execution failed: {source} (sql: {sql})")]
    QueryExecution {
        sql: String,
        #[source]
        source: BoxError,
    },

    /// Execution exceeded the builder's timeout.
    #[error("Query timed out after {0:?}")]
    QueryTimeout(Duration),

    /// Opening or talking to a backend connection failed.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A registered query hook failed.
    #[error("Hook failed: {0}")]
    Hook(anyhow::Error),
}

impl Error {
    /// Create a builder state error.
    pub fn builder(message: impl Into<String>) -> Self {
        Self::BuilderState(message.into())
    }

    /// Create a statement kind mismatch error.
    pub fn mismatch(kind: &'static str, clause: impl Into<String>) -> Self {
        Self::StatementKindMismatch {
            kind,
            clause: clause.into(),
        }
    }

    /// Create an unsupported feature error.
    pub fn unsupported(feature: impl Into<String>, dialect: Dialect) -> Self {
        Self::UnsupportedFeature {
            feature: feature.into(),
            dialect,
        }
    }

    /// Wrap a backend diagnostic together with the SQL that produced it.
    pub fn query(sql: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::QueryExecution {
            sql: sql.into(),
            source: source.into(),
        }
    }

    /// True for errors raised before any I/O happened.
    pub fn is_build_error(&self) -> bool {
        matches!(
            self,
            Self::BuilderState(_) | Self::StatementKindMismatch { .. } | Self::UnsupportedFeature { .. }
        )
    }
}

/// Result type alias for quarry operations.
pub type Result<T> = std::result::Result<T, Error>;
