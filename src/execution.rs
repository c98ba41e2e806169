//! Execution surfaces for a bound [`QueryBuilder`].
//!
//! - deferred: `builder.await` (or [`QueryBuilder::execute`])
//! - callback: [`QueryBuilder::as_callback`]
//! - stream: [`QueryBuilder::stream`], a [`RowStream`] fed through a bounded
//!   channel so a slow consumer suspends the producer
//!
//! All three report failures through their own channel; nothing panics or
//! escapes across a suspension point. Query and error hooks fire on every
//! surface; a stream has no single response, so it skips the response hook.

use std::fmt;
use std::future::IntoFuture;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use futures::future::BoxFuture;
use futures::stream::{BoxStream, Stream, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::ast::{Method, split_alias};
use crate::backend::{QueryResult, Row};
use crate::builder::QueryBuilder;
use crate::client::Client;
use crate::compiler::SqlQuery;
use crate::error::{Error, Result};
use crate::hooks::{Hooks, QueryEvent};
use crate::transaction::Transaction;
use crate::value::Value;

/// Where a bound builder sends its statement.
#[derive(Clone)]
pub(crate) enum Runner {
    Client(Client),
    Transaction(Transaction),
}

impl fmt::Debug for Runner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client(_) => f.write_str("Runner::Client"),
            Self::Transaction(trx) => write!(f, "Runner::Transaction({:?})", trx),
        }
    }
}

impl Runner {
    fn client(&self) -> &Client {
        match self {
            Self::Client(client) => client,
            Self::Transaction(trx) => trx.client(),
        }
    }

    async fn execute(&self, query: &SqlQuery) -> Result<QueryResult> {
        match self {
            Self::Client(client) => client.run_pooled(query).await,
            Self::Transaction(trx) => trx.execute(query).await,
        }
    }

    async fn stream_into(&self, query: &SqlQuery, tx: &mpsc::Sender<Result<Row>>) {
        match self {
            Self::Client(client) => client.stream_pooled(query, tx).await,
            Self::Transaction(trx) => trx.stream_into(query, tx).await,
        }
    }

    fn log(&self, query: &SqlQuery) {
        if query.options.debug || self.client().debug() {
            tracing::info!("{} {:?}", query.sql, query.bindings);
        } else {
            tracing::debug!("{} {:?}", query.sql, query.bindings);
        }
    }
}

/// Result of a completed statement, shaped by its method.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    /// `select`, raw queries and writes with RETURNING.
    Rows(Vec<Row>),
    /// `first()`: the first row, if any.
    Row(Option<Row>),
    /// `pluck(column)`: that column from every row.
    Values(Vec<Value>),
    /// Writes without RETURNING.
    Affected {
        rows: u64,
        last_insert_id: Option<i64>,
    },
}

impl Response {
    fn shape(query: &SqlQuery, result: QueryResult) -> Self {
        let affected = Self::Affected {
            rows: result.rows_affected,
            last_insert_id: result.last_insert_id,
        };
        match &query.method {
            Method::Select => Self::Rows(result.rows),
            Method::First => Self::Row(result.rows.into_iter().next()),
            Method::Pluck(column) => {
                let (name, alias) = split_alias(column);
                let key = alias.unwrap_or_else(|| {
                    name.rsplit('.').next().unwrap_or(name).to_string()
                });
                let values = result
                    .rows
                    .iter()
                    .map(|row| {
                        row.get(&key)
                            .or_else(|| row.values.first())
                            .cloned()
                            .unwrap_or(Value::Null)
                    })
                    .collect();
                Self::Values(values)
            }
            Method::Insert | Method::Update | Method::Delete if query.returning.is_some() => {
                Self::Rows(result.rows)
            }
            Method::Raw if !result.rows.is_empty() || query.returns_rows() => {
                Self::Rows(result.rows)
            }
            _ => affected,
        }
    }

    /// Every row carried by the response; empty for `Affected`.
    pub fn into_rows(self) -> Vec<Row> {
        match self {
            Self::Rows(rows) => rows,
            Self::Row(row) => row.into_iter().collect(),
            Self::Values(_) | Self::Affected { .. } => Vec::new(),
        }
    }

    /// The single row of a `first()` query, or the first of a row set.
    pub fn into_row(self) -> Option<Row> {
        self.into_rows().into_iter().next()
    }

    pub fn into_values(self) -> Vec<Value> {
        match self {
            Self::Values(values) => values,
            _ => Vec::new(),
        }
    }

    /// Rows written, or rows returned for row-producing statements.
    pub fn rows_affected(&self) -> u64 {
        match self {
            Self::Rows(rows) => rows.len() as u64,
            Self::Row(row) => row.is_some() as u64,
            Self::Values(values) => values.len() as u64,
            Self::Affected { rows, .. } => *rows,
        }
    }

    /// The response as JSON (rows become objects).
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

async fn run(runner: Runner, query: SqlQuery) -> Result<Response> {
    let hooks = runner.client().hooks().clone();
    hooks.dispatch(&QueryEvent::Query { query: &query })?;
    runner.log(&query);

    let started = Instant::now();
    match runner.execute(&query).await {
        Ok(result) => {
            let response = Response::shape(&query, result);
            hooks.dispatch(&QueryEvent::Response {
                query: &query,
                response: &response,
                elapsed: started.elapsed(),
            })?;
            Ok(response)
        }
        Err(err) => {
            tracing::debug!("query failed after {:?}: {}", started.elapsed(), err);
            hooks.dispatch_error(&query, &err);
            Err(err)
        }
    }
}

fn unbound() -> Error {
    Error::builder("builder is not bound to a client or transaction")
}

/// Report a stream failure to the error hooks, then to the consumer.
pub(crate) async fn send_error(
    hooks: &Hooks,
    query: &SqlQuery,
    tx: &mpsc::Sender<Result<Row>>,
    err: Error,
) {
    hooks.dispatch_error(query, &err);
    let _ = tx.send(Err(err)).await;
}

/// How a [`pump_rows`] run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pumped {
    Finished,
    /// No row arrived within the query timeout; the connection is still
    /// busy with the statement and must not be reused.
    TimedOut,
}

/// Forward rows into `tx` until the source ends, fails or the receiver
/// goes away. The query timeout bounds the wait for each row.
pub(crate) async fn pump_rows(
    mut rows: BoxStream<'_, Result<Row>>,
    query: &SqlQuery,
    hooks: &Hooks,
    tx: &mpsc::Sender<Result<Row>>,
) -> Pumped {
    loop {
        let next = match query.options.timeout {
            Some(limit) => match tokio::time::timeout(limit, rows.next()).await {
                Ok(next) => next,
                Err(_) => {
                    tracing::warn!("no row within {:?}, abandoning the stream", limit);
                    send_error(hooks, query, tx, Error::QueryTimeout(limit)).await;
                    return Pumped::TimedOut;
                }
            },
            None => rows.next().await,
        };
        let row = match next {
            Some(Ok(row)) => row,
            Some(Err(err)) => {
                send_error(hooks, query, tx, err).await;
                return Pumped::Finished;
            }
            None => return Pumped::Finished,
        };
        if tx.send(Ok(row)).await.is_err() {
            tracing::debug!("row stream receiver closed, releasing connection");
            return Pumped::Finished;
        }
    }
}

impl QueryBuilder {
    /// Compile and run. Builder errors are returned before any connection
    /// is acquired.
    pub async fn execute(self) -> Result<Response> {
        let query = self.to_sql()?;
        let runner = self.runner.ok_or_else(unbound)?;
        run(runner, query).await
    }

    /// Run on a spawned task and hand the outcome to `callback` exactly once.
    pub fn as_callback<F>(self, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<Response>) + Send + 'static,
    {
        tokio::spawn(async move { callback(self.execute().await) })
    }

    /// Stream result rows with the default buffer.
    pub fn stream(self) -> RowStream {
        self.stream_with(StreamOptions::default())
    }

    /// Stream result rows. At most `high_water_mark` rows are buffered
    /// before the producer waits for the consumer. Must be called inside a
    /// tokio runtime.
    pub fn stream_with(self, options: StreamOptions) -> RowStream {
        let (tx, rx) = mpsc::channel(options.high_water_mark.max(1));

        let task = tokio::spawn(async move {
            let prepared = self
                .to_sql()
                .and_then(|query| Ok((self.runner.ok_or_else(unbound)?, query)));
            let (runner, query) = match prepared {
                Ok(prepared) => prepared,
                Err(err) => {
                    let _ = tx.send(Err(err)).await;
                    return;
                }
            };

            let hooks = runner.client().hooks().clone();
            if let Err(err) = hooks.dispatch(&QueryEvent::Query { query: &query }) {
                send_error(&hooks, &query, &tx, err).await;
                return;
            }
            runner.log(&query);
            runner.stream_into(&query, &tx).await;
        });

        RowStream { rx, task }
    }
}

impl IntoFuture for QueryBuilder {
    type Output = Result<Response>;
    type IntoFuture = BoxFuture<'static, Result<Response>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.execute())
    }
}

/// Buffering for [`QueryBuilder::stream_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOptions {
    pub high_water_mark: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self { high_water_mark: 16 }
    }
}

/// Rows of a streaming query. Dropping it (or calling [`close`](Self::close))
/// stops the producer and releases its connection.
pub struct RowStream {
    rx: mpsc::Receiver<Result<Row>>,
    task: JoinHandle<()>,
}

impl RowStream {
    /// Stop reading and wait until the connection has been released.
    pub async fn close(mut self) {
        self.rx.close();
        self.task.abort();
        let _ = (&mut self.task).await;
    }
}

impl fmt::Debug for RowStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowStream")
            .field("finished", &self.task.is_finished())
            .finish()
    }
}

impl Stream for RowStream {
    type Item = Result<Row>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for RowStream {
    fn drop(&mut self) {
        self.task.abort();
    }
}
