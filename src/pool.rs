//! Connection pool.
//!
//! Lends backend connections to one caller at a time. A semaphore with `max`
//! permits bounds the number of live connections; callers past the limit
//! suspend in `acquire()` until a [`PooledConnection`] is dropped.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::{Notify, Semaphore, TryAcquireError};

use crate::backend::{Backend, BoxConnection, Connection};
use crate::error::{Error, Result};

/// Hook run once on every newly opened connection, before first use.
pub type BeforeCreate = Arc<
    dyn for<'c> Fn(&'c mut BoxConnection) -> BoxFuture<'c, anyhow::Result<()>> + Send + Sync,
>;

/// Pool sizing and lifecycle options.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    /// Connections opened when the pool is created.
    pub min: usize,
    /// Upper bound on live connections.
    pub max: usize,
    /// Give up on `acquire()` after this many milliseconds. Waits forever when unset.
    pub acquire_timeout_ms: Option<u64>,
    #[serde(skip)]
    pub before_create: Option<BeforeCreate>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min: 2,
            max: 10,
            acquire_timeout_ms: None,
            before_create: None,
        }
    }
}

impl fmt::Debug for PoolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolConfig")
            .field("min", &self.min)
            .field("max", &self.max)
            .field("acquire_timeout_ms", &self.acquire_timeout_ms)
            .field("before_create", &self.before_create.is_some())
            .finish()
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min(mut self, min: usize) -> Self {
        self.min = min;
        self
    }

    pub fn max(mut self, max: usize) -> Self {
        self.max = max;
        self
    }

    /// Fail `acquire()` with [`Error::AcquireTimeout`] after `timeout`.
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Run `hook` on each new connection; an error fails the acquire that
    /// triggered the connect.
    ///
    /// ```
    /// use quarry::PoolConfig;
    ///
    /// let config = PoolConfig::new().min(0).before_create(|conn| {
    ///     Box::pin(async move {
    ///         conn.batch("SET TIME ZONE 'UTC'").await?;
    ///         Ok::<_, anyhow::Error>(())
    ///     })
    /// });
    /// assert!(config.before_create.is_some());
    /// ```
    pub fn before_create<F>(mut self, hook: F) -> Self
    where
        F: for<'c> Fn(&'c mut BoxConnection) -> BoxFuture<'c, anyhow::Result<()>>
            + Send
            + Sync
            + 'static,
    {
        self.before_create = Some(Arc::new(hook));
        self
    }

    pub(crate) fn acquire_limit(&self) -> Option<Duration> {
        self.acquire_timeout_ms.map(Duration::from_millis)
    }

    /// Check sizing bounds.
    pub fn validate(&self) -> Result<()> {
        if self.max == 0 {
            return Err(Error::Config("pool max must be at least 1".to_string()));
        }
        if self.min > self.max {
            return Err(Error::Config(format!(
                "pool min ({}) exceeds max ({})",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

/// Point-in-time pool counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub idle: usize,
    pub acquired: usize,
    pub max: usize,
    pub total_created: usize,
}

struct PoolInner {
    backend: Arc<dyn Backend>,
    config: PoolConfig,
    idle: Mutex<Vec<BoxConnection>>,
    semaphore: Semaphore,
    closed: AtomicBool,
    acquired: AtomicUsize,
    total_created: AtomicUsize,
    released: Notify,
}

impl PoolInner {
    fn lock_idle(&self) -> MutexGuard<'_, Vec<BoxConnection>> {
        self.idle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn create(&self) -> Result<BoxConnection> {
        let mut conn = self.backend.connect().await?;
        if let Some(hook) = &self.config.before_create {
            hook(&mut conn).await.map_err(Error::ConnectionInit)?;
        }
        let total = self.total_created.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!("pool opened connection ({} created so far)", total);
        Ok(conn)
    }

    fn release(&self, conn: Option<BoxConnection>) {
        let closed = self.closed.load(Ordering::SeqCst);
        match conn {
            Some(conn) if !closed => self.lock_idle().push(conn),
            Some(_) => tracing::debug!("pool closed, dropping released connection"),
            None => tracing::debug!("pool slot released without a connection"),
        }
        self.acquired.fetch_sub(1, Ordering::SeqCst);
        if !closed {
            self.semaphore.add_permits(1);
        }
        self.released.notify_waiters();
    }
}

/// A shared connection pool. Clones share the same connections.
///
/// # Example
/// ```ignore
/// let pool = Pool::new(Arc::new(backend), PoolConfig::new().min(1).max(4)).await?;
/// let mut conn = pool.acquire().await?;
/// conn.batch("SELECT 1").await?;
/// ```
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("config", &self.inner.config)
            .field("stats", &self.stats())
            .finish()
    }
}

impl Pool {
    /// Create a pool and open `min` connections up front.
    pub async fn new(backend: Arc<dyn Backend>, config: PoolConfig) -> Result<Self> {
        config.validate()?;

        let inner = Arc::new(PoolInner {
            backend,
            semaphore: Semaphore::new(config.max),
            idle: Mutex::new(Vec::with_capacity(config.max)),
            closed: AtomicBool::new(false),
            acquired: AtomicUsize::new(0),
            total_created: AtomicUsize::new(0),
            released: Notify::new(),
            config,
        });

        for _ in 0..inner.config.min {
            let conn = inner.create().await?;
            inner.lock_idle().push(conn);
        }

        tracing::debug!(
            "pool created (min {}, max {})",
            inner.config.min,
            inner.config.max
        );
        Ok(Self { inner })
    }

    /// Borrow a connection, suspending while all `max` are in use.
    pub async fn acquire(&self) -> Result<PooledConnection> {
        if self.is_closed() {
            return Err(Error::PoolClosed);
        }

        let permit = match self.inner.config.acquire_limit() {
            Some(limit) => tokio::time::timeout(limit, self.inner.semaphore.acquire())
                .await
                .map_err(|_| Error::AcquireTimeout(limit))?,
            None => self.inner.semaphore.acquire().await,
        }
        .map_err(|_| Error::PoolClosed)?;
        permit.forget();

        self.checkout().await
    }

    /// Borrow a connection without waiting.
    pub async fn try_acquire(&self) -> Result<PooledConnection> {
        if self.is_closed() {
            return Err(Error::PoolClosed);
        }

        let permit = self.inner.semaphore.try_acquire().map_err(|e| match e {
            TryAcquireError::Closed => Error::PoolClosed,
            TryAcquireError::NoPermits => Error::PoolExhausted(self.inner.config.max),
        })?;
        permit.forget();

        self.checkout().await
    }

    /// Hand out an idle connection or open a new one. The caller holds a
    /// forgotten permit; the guard gives it back if anything below fails.
    async fn checkout(&self) -> Result<PooledConnection> {
        self.inner.acquired.fetch_add(1, Ordering::SeqCst);
        let mut guard = PooledConnection {
            conn: None,
            pool: self.inner.clone(),
        };

        if self.is_closed() {
            return Err(Error::PoolClosed);
        }

        let idle = self.inner.lock_idle().pop();
        let conn = match idle {
            Some(conn) => conn,
            None => self.inner.create().await?,
        };
        guard.conn = Some(conn);

        tracing::debug!(
            "pool connection acquired ({} in use)",
            self.inner.acquired.load(Ordering::SeqCst)
        );
        Ok(guard)
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            idle: self.inner.lock_idle().len(),
            acquired: self.inner.acquired.load(Ordering::SeqCst),
            max: self.inner.config.max,
            total_created: self.inner.total_created.load(Ordering::SeqCst),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Reject new acquisitions, wait for every lent connection to come back,
    /// then close them all. Waiters still suspended in `acquire()` fail with
    /// [`Error::PoolClosed`].
    pub async fn destroy(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.semaphore.close();
        tracing::debug!("pool draining");

        loop {
            let notified = self.inner.released.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.inner.acquired.load(Ordering::SeqCst) == 0 {
                break;
            }
            notified.await;
        }

        let drained = std::mem::take(&mut *self.inner.lock_idle());
        tracing::debug!("pool destroyed, closed {} idle connections", drained.len());
    }
}

/// A borrowed connection, returned to the pool when dropped.
pub struct PooledConnection {
    conn: Option<BoxConnection>,
    pool: Arc<PoolInner>,
}

impl PooledConnection {
    /// Close the connection instead of returning it for reuse, e.g. after a
    /// failure that may have left it in an unknown state.
    pub fn discard(mut self) {
        if self.conn.take().is_some() {
            tracing::debug!("pool connection discarded");
        }
    }
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("live", &self.conn.is_some())
            .finish()
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        self.pool.release(self.conn.take());
    }
}

impl std::ops::Deref for PooledConnection {
    type Target = dyn Connection;

    fn deref(&self) -> &Self::Target {
        self.conn
            .as_deref()
            .expect("Connection should always be present")
    }
}

impl std::ops::DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn
            .as_deref_mut()
            .expect("Connection should always be present")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_config() {
        let config = PoolConfig::new()
            .min(1)
            .max(4)
            .acquire_timeout(Duration::from_millis(250));

        assert_eq!(config.min, 1);
        assert_eq!(config.max, 4);
        assert_eq!(config.acquire_limit(), Some(Duration::from_millis(250)));
        assert!(config.before_create.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_pool_config_defaults() {
        let config = PoolConfig::default();
        assert_eq!((config.min, config.max), (2, 10));
        assert_eq!(config.acquire_limit(), None);
    }

    #[test]
    fn test_pool_config_validation() {
        assert!(matches!(
            PoolConfig::new().min(0).max(0).validate(),
            Err(Error::Config(_))
        ));
        let err = PoolConfig::new().min(5).max(2).validate().unwrap_err();
        assert_eq!(err.to_string(), "Configuration error: pool min (5) exceeds max (2)");
    }
}
