//! The database handle: dialect, pool and hooks behind one cheap clone.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::ast::TableRef;
use crate::backend::{Backend, QueryResult, Row, SqlxBackend};
use crate::builder::QueryBuilder;
use crate::compiler::{Dialect, SqlQuery};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::execution::{Pumped, Runner, pump_rows, send_error};
use crate::hooks::{Hooks, QueryEvent};
use crate::pool::{Pool, PoolConfig};
use crate::raw::Raw;
use crate::transaction::{self, Transaction};

/// Entry points for building statements bound to a runner.
pub trait Queryable {
    /// An empty builder that executes through `self`.
    fn query_builder(&self) -> QueryBuilder;

    /// Start a chain on `table`.
    fn table(&self, table: impl Into<TableRef>) -> QueryBuilder {
        self.query_builder().table(table)
    }

    /// A runnable raw statement.
    fn raw(&self, raw: impl Into<Raw>) -> QueryBuilder {
        self.query_builder().from_raw_statement(raw.into())
    }
}

struct ClientInner {
    dialect: Dialect,
    pool: Pool,
    hooks: Hooks,
    debug: bool,
}

/// A configured database handle. Clones share the pool.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("dialect", &self.inner.dialect)
            .field("pool", &self.inner.pool)
            .field("hooks", &self.inner.hooks)
            .field("debug", &self.inner.debug)
            .finish()
    }
}

/// Builder for [`Client`].
pub struct ClientBuilder {
    backend: Arc<dyn Backend>,
    pool: PoolConfig,
    hooks: Hooks,
    debug: bool,
}

impl ClientBuilder {
    pub fn new(backend: impl Backend) -> Self {
        Self::from_arc(Arc::new(backend))
    }

    pub fn from_arc(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            pool: PoolConfig::default(),
            hooks: Hooks::default(),
            debug: false,
        }
    }

    pub fn pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Log every query at `info`.
    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    /// Register a query event handler. Handlers run in registration order.
    pub fn hook<F>(mut self, handler: F) -> Self
    where
        F: Fn(&QueryEvent<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.hooks.push(Arc::new(handler));
        self
    }

    /// Create the pool and the client.
    pub async fn build(self) -> Result<Client> {
        let dialect = self.backend.dialect();
        let pool = Pool::new(self.backend, self.pool).await?;
        tracing::debug!("client ready ({})", dialect);
        Ok(Client {
            inner: Arc::new(ClientInner {
                dialect,
                pool,
                hooks: self.hooks,
                debug: self.debug,
            }),
        })
    }
}

impl Client {
    pub fn builder(backend: impl Backend) -> ClientBuilder {
        ClientBuilder::new(backend)
    }

    /// Open a client over sqlx from a config.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let url = config
            .connection
            .ok_or_else(|| Error::Config("missing connection url".to_string()))?;
        ClientBuilder::new(SqlxBackend::new(url, config.client))
            .pool(config.pool)
            .debug(config.debug)
            .build()
            .await
    }

    pub fn dialect(&self) -> Dialect {
        self.inner.dialect
    }

    pub fn pool(&self) -> &Pool {
        &self.inner.pool
    }

    pub(crate) fn hooks(&self) -> &Hooks {
        &self.inner.hooks
    }

    pub(crate) fn debug(&self) -> bool {
        self.inner.debug
    }

    /// Start a transaction on a freshly reserved connection.
    pub async fn begin(&self) -> Result<Transaction> {
        Transaction::start(self.clone()).await
    }

    /// Run `work` in a new transaction, committing on `Ok` and rolling back
    /// on `Err`. The error returned by `work` is passed through unchanged.
    ///
    /// ```ignore
    /// let id = client
    ///     .transaction(|trx| async move {
    ///         trx.table("books").insert([("title", "Dune")]).await?;
    ///         trx.table("books").max("id as id").first().await
    ///     })
    ///     .await?;
    /// ```
    pub async fn transaction<F, Fut, T, E>(&self, work: F) -> std::result::Result<T, E>
    where
        F: FnOnce(Transaction) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: From<Error>,
    {
        let trx = self.begin().await?;
        transaction::run_work(trx, work).await
    }

    /// Wait for lent connections to return, then close the pool.
    pub async fn destroy(&self) {
        self.inner.pool.destroy().await;
    }

    /// Run a compiled statement on a pooled connection.
    pub(crate) async fn run_pooled(&self, query: &SqlQuery) -> Result<QueryResult> {
        let mut conn = self.pool().acquire().await?;
        let Some(limit) = query.options.timeout else {
            return conn.execute(query).await;
        };

        match tokio::time::timeout(limit, conn.execute(query)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("query timed out after {:?}, discarding its connection", limit);
                conn.discard();
                Err(Error::QueryTimeout(limit))
            }
        }
    }

    /// Stream rows of a compiled statement from a pooled connection.
    pub(crate) async fn stream_pooled(
        &self,
        query: &SqlQuery,
        tx: &tokio::sync::mpsc::Sender<Result<Row>>,
    ) {
        let hooks = self.hooks();
        let mut conn = match self.pool().acquire().await {
            Ok(conn) => conn,
            Err(err) => {
                send_error(hooks, query, tx, err).await;
                return;
            }
        };
        if pump_rows(conn.stream(query), query, hooks, tx).await == Pumped::TimedOut {
            conn.discard();
        }
    }
}

impl Queryable for Client {
    fn query_builder(&self) -> QueryBuilder {
        QueryBuilder::bound(self.dialect(), Runner::Client(self.clone()))
    }
}

impl Queryable for Transaction {
    fn query_builder(&self) -> QueryBuilder {
        QueryBuilder::bound(self.client().dialect(), Runner::Transaction(self.clone()))
    }
}
