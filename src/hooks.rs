//! Query event handlers registered on a client.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::compiler::SqlQuery;
use crate::error::{Error, Result};
use crate::execution::Response;

/// Something that happened to one executed statement.
#[derive(Debug)]
pub enum QueryEvent<'a> {
    /// About to run.
    Query { query: &'a SqlQuery },
    /// Finished successfully.
    Response {
        query: &'a SqlQuery,
        response: &'a Response,
        elapsed: Duration,
    },
    /// Failed, before or during execution.
    Error { query: &'a SqlQuery, error: &'a Error },
}

impl QueryEvent<'_> {
    pub fn query(&self) -> &SqlQuery {
        match self {
            Self::Query { query } | Self::Response { query, .. } | Self::Error { query, .. } => query,
        }
    }
}

/// A registered handler. Returning an error aborts the query.
pub type QueryHook = Arc<dyn Fn(&QueryEvent<'_>) -> anyhow::Result<()> + Send + Sync>;

/// Handlers in registration order.
#[derive(Clone, Default)]
pub struct Hooks {
    handlers: Vec<QueryHook>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl Hooks {
    pub fn push(&mut self, hook: QueryHook) {
        self.handlers.push(hook);
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run every handler in order, stopping at the first failure.
    pub fn dispatch(&self, event: &QueryEvent<'_>) -> Result<()> {
        for handler in &self.handlers {
            handler(event).map_err(Error::Hook)?;
        }
        Ok(())
    }

    /// Report a failed query. Handler failures here are logged, since the
    /// caller already receives the original error.
    pub fn dispatch_error(&self, query: &SqlQuery, error: &Error) {
        let event = QueryEvent::Error { query, error };
        if let Err(err) = self.dispatch(&event) {
            tracing::warn!("query error hook failed: {}", err);
        }
    }
}
