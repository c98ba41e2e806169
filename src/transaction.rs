//! Transactions and savepoints.
//!
//! A root [`Transaction`] reserves one pooled connection from `BEGIN` until
//! `COMMIT`/`ROLLBACK`; every query issued through it (or through a builder
//! passed to [`QueryBuilder::transacting`](crate::QueryBuilder::transacting))
//! runs on that connection in issuance order. Nested transactions are
//! savepoints on the same connection and close in LIFO order: finishing a
//! transaction also closes every savepoint opened after it.
//!
//! # Deadlock risk
//!
//! Calling [`Client::transaction`] (not [`Transaction::transaction`]) from
//! inside a transaction's work acquires a second connection. With a pool
//! `max` of 1, or with `max` concurrent outer transactions doing the same,
//! that acquire never resolves. Nest through the transaction handle, or set
//! an acquire timeout on the pool.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

use tokio::sync::{Mutex, mpsc};

use crate::backend::{QueryResult, Row};
use crate::client::Client;
use crate::compiler::SqlQuery;
use crate::error::{Error, Result};
use crate::execution::{Pumped, pump_rows, send_error};
use crate::pool::PooledConnection;

static NEXT_TRX_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle of a transaction or savepoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Pending,
    Running,
    Committed,
    RolledBack,
}

impl TransactionState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Pending,
            1 => Self::Running,
            2 => Self::Committed,
            _ => Self::RolledBack,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Running => 1,
            Self::Committed => 2,
            Self::RolledBack => 3,
        }
    }

    pub fn is_completed(self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack)
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Committed => "committed",
            Self::RolledBack => "rolled back",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Commit,
    Rollback,
}

impl Outcome {
    fn state(self) -> TransactionState {
        match self {
            Self::Commit => TransactionState::Committed,
            Self::Rollback => TransactionState::RolledBack,
        }
    }
}

/// One level of the transaction stack: the root or a savepoint.
#[derive(Clone)]
struct Frame {
    id: u64,
    depth: usize,
    savepoint: Option<String>,
    state: Arc<AtomicU8>,
}

impl Frame {
    fn state(&self) -> TransactionState {
        TransactionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set(&self, state: TransactionState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }

    fn label(&self) -> String {
        match &self.savepoint {
            Some(name) => format!("savepoint {}", name),
            None => format!("transaction {}", self.id),
        }
    }
}

/// The connection shared by a root transaction and its savepoints.
struct Reserved {
    conn: Option<PooledConnection>,
    frames: Vec<Frame>,
    savepoints: usize,
}

impl Reserved {
    /// Close every frame as rolled back and drop the connection without
    /// returning it to the pool.
    fn abandon(&mut self) {
        for frame in self.frames.drain(..) {
            frame.set(TransactionState::RolledBack);
        }
        if let Some(conn) = self.conn.take() {
            conn.discard();
        }
    }
}

impl Drop for Reserved {
    fn drop(&mut self) {
        if self.conn.is_some() {
            tracing::warn!("transaction connection dropped mid-transaction, discarding it");
            self.abandon();
        }
    }
}

/// Roll back savepoints whose handles were dropped while running.
///
/// A dropped savepoint marks its frame rolled back but stays on the stack
/// until the next operation on the connection issues the rollback, so a
/// parent finishing first never commits its writes.
async fn settle(reserved: &mut Reserved) -> Result<()> {
    let Some(pos) = reserved
        .frames
        .iter()
        .position(|f| f.savepoint.is_some() && f.state() != TransactionState::Running)
    else {
        return Ok(());
    };

    let dropped = reserved.frames.split_off(pos);
    for frame in &dropped {
        frame.set(TransactionState::RolledBack);
    }
    let (Some(name), Some(conn)) = (&dropped[0].savepoint, reserved.conn.as_mut()) else {
        return Ok(());
    };
    match conn.rollback_to_savepoint(name).await {
        Ok(()) => {
            tracing::debug!("{} rolled back after its handle was dropped", dropped[0].label());
            Ok(())
        }
        Err(err) => {
            tracing::warn!("{} failed to roll back: {}", dropped[0].label(), err);
            reserved.abandon();
            Err(err)
        }
    }
}

async fn finish(shared: &Mutex<Reserved>, frame: &Frame, outcome: Outcome) -> Result<()> {
    let mut reserved = shared.lock().await;
    settle(&mut reserved).await?;

    let current = frame.state();
    if current != TransactionState::Running {
        return Err(Error::TransactionClosed(current));
    }
    let Some(pos) = reserved.frames.iter().position(|f| f.id == frame.id) else {
        return Err(Error::TransactionClosed(TransactionState::RolledBack));
    };

    for child in reserved.frames.split_off(pos + 1) {
        tracing::debug!("{} closed by its parent", child.label());
        child.set(outcome.state());
    }
    reserved.frames.pop();

    let Some(conn) = reserved.conn.as_mut() else {
        frame.set(TransactionState::RolledBack);
        return Err(Error::TransactionClosed(TransactionState::RolledBack));
    };

    let result = match (&frame.savepoint, outcome) {
        (None, Outcome::Commit) => conn.commit().await,
        (None, Outcome::Rollback) => conn.rollback().await,
        (Some(name), Outcome::Commit) => conn.release_savepoint(name).await,
        (Some(name), Outcome::Rollback) => conn.rollback_to_savepoint(name).await,
    };

    match result {
        Ok(()) => {
            frame.set(outcome.state());
            tracing::debug!("{} {}", frame.label(), outcome.state());
            if frame.savepoint.is_none() {
                reserved.conn.take();
            }
            Ok(())
        }
        Err(err) => {
            tracing::warn!("{} failed to {:?}: {}", frame.label(), outcome, err);
            frame.set(TransactionState::RolledBack);
            match &frame.savepoint {
                None => {
                    if outcome == Outcome::Commit {
                        let _ = conn.rollback().await;
                    }
                    reserved.abandon();
                }
                Some(name) => {
                    if outcome == Outcome::Commit {
                        let _ = conn.rollback_to_savepoint(name).await;
                    }
                }
            }
            Err(err)
        }
    }
}

struct TrxInner {
    client: Client,
    frame: Frame,
    shared: Arc<Mutex<Reserved>>,
}

impl Drop for TrxInner {
    fn drop(&mut self) {
        if self.frame.state() != TransactionState::Running {
            return;
        }

        tracing::warn!("{} dropped while running, rolling back", self.frame.label());
        let shared = self.shared.clone();
        let frame = self.frame.clone();
        let handle = tokio::runtime::Handle::try_current();

        if frame.savepoint.is_some() {
            // Settled by the next operation on the connection at the latest.
            frame.set(TransactionState::RolledBack);
            if let Ok(handle) = handle {
                handle.spawn(async move {
                    let mut reserved = shared.lock().await;
                    if let Err(err) = settle(&mut reserved).await {
                        tracing::warn!("background rollback failed: {}", err);
                    }
                });
            }
            return;
        }

        match handle {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = finish(&shared, &frame, Outcome::Rollback).await {
                        tracing::warn!("background rollback failed: {}", err);
                    }
                });
            }
            Err(_) => {
                frame.set(TransactionState::RolledBack);
                if let Ok(mut reserved) = shared.try_lock() {
                    reserved.abandon();
                }
            }
        }
    }
}

/// Handle to a running transaction or savepoint. Clones refer to the same
/// transaction; it is rolled back once the last handle drops while running.
#[derive(Clone)]
pub struct Transaction {
    inner: Arc<TrxInner>,
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.inner.frame.id)
            .field("depth", &self.inner.frame.depth)
            .field("savepoint", &self.inner.frame.savepoint)
            .field("state", &self.state())
            .finish()
    }
}

impl Transaction {
    /// Reserve a connection and issue `BEGIN`.
    pub(crate) async fn start(client: Client) -> Result<Self> {
        let mut conn = client.pool().acquire().await?;
        let frame = Frame {
            id: NEXT_TRX_ID.fetch_add(1, Ordering::SeqCst),
            depth: 0,
            savepoint: None,
            state: Arc::new(AtomicU8::new(TransactionState::Pending.as_u8())),
        };

        if let Err(err) = conn.begin().await {
            conn.discard();
            return Err(err);
        }
        frame.set(TransactionState::Running);
        tracing::debug!("{} started", frame.label());

        let shared = Reserved {
            conn: Some(conn),
            frames: vec![frame.clone()],
            savepoints: 0,
        };
        Ok(Self {
            inner: Arc::new(TrxInner {
                client,
                frame,
                shared: Arc::new(Mutex::new(shared)),
            }),
        })
    }

    pub fn client(&self) -> &Client {
        &self.inner.client
    }

    pub fn state(&self) -> TransactionState {
        self.inner.frame.state()
    }

    /// True once committed or rolled back.
    pub fn is_completed(&self) -> bool {
        self.state().is_completed()
    }

    /// Nesting level; 0 for the root transaction.
    pub fn depth(&self) -> usize {
        self.inner.frame.depth
    }

    fn ensure_running(&self) -> Result<()> {
        match self.state() {
            TransactionState::Running => Ok(()),
            state => Err(Error::TransactionClosed(state)),
        }
    }

    /// Open a nested transaction backed by a savepoint.
    pub async fn savepoint(&self) -> Result<Transaction> {
        let mut reserved = self.inner.shared.lock().await;
        settle(&mut reserved).await?;
        self.ensure_running()?;

        reserved.savepoints += 1;
        let name = format!("trx{}", reserved.savepoints);
        let conn = reserved
            .conn
            .as_mut()
            .ok_or(Error::TransactionClosed(TransactionState::RolledBack))?;
        conn.savepoint(&name).await?;

        let frame = Frame {
            id: NEXT_TRX_ID.fetch_add(1, Ordering::SeqCst),
            depth: self.depth() + 1,
            savepoint: Some(name),
            state: Arc::new(AtomicU8::new(TransactionState::Running.as_u8())),
        };
        reserved.frames.push(frame.clone());
        tracing::debug!("{} started", frame.label());

        Ok(Self {
            inner: Arc::new(TrxInner {
                client: self.inner.client.clone(),
                frame,
                shared: self.inner.shared.clone(),
            }),
        })
    }

    /// Commit (or release the savepoint). Closes any savepoint still open
    /// above this one.
    pub async fn commit(&self) -> Result<()> {
        finish(&self.inner.shared, &self.inner.frame, Outcome::Commit).await
    }

    /// Roll back (to the savepoint, when nested).
    pub async fn rollback(&self) -> Result<()> {
        finish(&self.inner.shared, &self.inner.frame, Outcome::Rollback).await
    }

    /// Run `work` in a savepoint, committing on `Ok` and rolling back on `Err`.
    pub async fn transaction<F, Fut, T, E>(&self, work: F) -> std::result::Result<T, E>
    where
        F: FnOnce(Transaction) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: From<Error>,
    {
        let trx = self.savepoint().await?;
        run_work(trx, work).await
    }

    /// Run a compiled statement on the reserved connection.
    pub(crate) async fn execute(&self, query: &SqlQuery) -> Result<QueryResult> {
        let mut reserved = self.inner.shared.lock().await;
        settle(&mut reserved).await?;
        self.ensure_running()?;
        let conn = reserved
            .conn
            .as_mut()
            .ok_or(Error::TransactionClosed(TransactionState::RolledBack))?;

        let Some(limit) = query.options.timeout else {
            return conn.execute(query).await;
        };
        let outcome = tokio::time::timeout(limit, conn.execute(query)).await;
        match outcome {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    "query timed out after {:?} inside {}, abandoning the transaction",
                    limit,
                    self.inner.frame.label()
                );
                reserved.abandon();
                Err(Error::QueryTimeout(limit))
            }
        }
    }

    /// Stream rows of a compiled statement into `tx`, holding the reserved
    /// connection until the stream ends or the receiver goes away.
    pub(crate) async fn stream_into(&self, query: &SqlQuery, tx: &mpsc::Sender<Result<Row>>) {
        let hooks = self.client().hooks();
        let mut reserved = self.inner.shared.lock().await;
        if let Err(err) = settle(&mut reserved).await.and_then(|()| self.ensure_running()) {
            send_error(hooks, query, tx, err).await;
            return;
        }
        let Some(conn) = reserved.conn.as_mut() else {
            send_error(hooks, query, tx, Error::TransactionClosed(TransactionState::RolledBack)).await;
            return;
        };

        if pump_rows(conn.stream(query), query, hooks, tx).await == Pumped::TimedOut {
            tracing::warn!("{} abandoned after a stream timeout", self.inner.frame.label());
            reserved.abandon();
        }
    }
}

/// Drive `work` to completion on `trx`, then commit or roll back.
pub(crate) async fn run_work<F, Fut, T, E>(trx: Transaction, work: F) -> std::result::Result<T, E>
where
    F: FnOnce(Transaction) -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: From<Error>,
{
    match work(trx.clone()).await {
        Ok(value) => {
            if !trx.is_completed() {
                trx.commit().await?;
            }
            Ok(value)
        }
        Err(err) => {
            if !trx.is_completed() {
                if let Err(rollback) = trx.rollback().await {
                    tracing::warn!("rollback after failed work also failed: {}", rollback);
                }
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(TransactionState::Running.to_string(), "running");
        assert_eq!(TransactionState::RolledBack.to_string(), "rolled back");
        assert!(TransactionState::Committed.is_completed());
        assert!(!TransactionState::Pending.is_completed());
    }

    #[test]
    fn test_state_roundtrip() {
        for state in [
            TransactionState::Pending,
            TransactionState::Running,
            TransactionState::Committed,
            TransactionState::RolledBack,
        ] {
            assert_eq!(TransactionState::from_u8(state.as_u8()), state);
        }
    }
}
