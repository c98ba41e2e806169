//! In-memory transactional backend for integration tests.
//!
//! Every connection keeps its own stack of uncommitted frames; `COMMIT`
//! moves them into a journal shared by all connections. `INSERT` appends its
//! first binding, `SELECT` returns one `value` row per visible entry. SQL
//! containing `fail` errors, `sleepy` takes 200ms, streaming `slow`
//! yields rows forever and streaming `stall` hangs after its first row.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use quarry::{
    Backend, BoxConnection, Client, Connection, Dialect, Error, PoolConfig, QueryResult, Result,
    Row, SqlQuery, Value,
};

#[derive(Default)]
pub struct MockState {
    journal: Mutex<Vec<Value>>,
    statements: Mutex<Vec<String>>,
    connects: AtomicUsize,
    live: AtomicUsize,
}

#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<MockState>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed values, in insertion order.
    pub fn journal(&self) -> Vec<Value> {
        self.state.journal.lock().unwrap().clone()
    }

    /// Every statement seen by any connection, in order.
    pub fn statements(&self) -> Vec<String> {
        self.state.statements.lock().unwrap().clone()
    }

    pub fn connects(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    /// Connections opened and not yet dropped.
    pub fn live(&self) -> usize {
        self.state.live.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for MockBackend {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn connect(&self) -> Result<BoxConnection> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        self.state.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockConnection {
            state: self.state.clone(),
            frames: Vec::new(),
        }))
    }
}

struct MockConnection {
    state: Arc<MockState>,
    frames: Vec<(Option<String>, Vec<Value>)>,
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.state.live.fetch_sub(1, Ordering::SeqCst);
    }
}

pub fn value_row(value: Value) -> Row {
    Row::new(vec!["value".into()], vec![value])
}

impl MockConnection {
    fn log(&self, sql: &str) {
        self.state.statements.lock().unwrap().push(sql.to_string());
    }

    fn visible_rows(&self) -> Vec<Row> {
        let mut values = self.state.journal.lock().unwrap().clone();
        for (_, frame) in &self.frames {
            values.extend(frame.iter().cloned());
        }
        values.into_iter().map(value_row).collect()
    }

    fn unwind_to(&mut self, name: &str) -> Option<Vec<Value>> {
        let pos = self
            .frames
            .iter()
            .rposition(|(n, _)| n.as_deref() == Some(name))?;
        let mut popped = self.frames.split_off(pos);
        let mut values = Vec::new();
        for (_, frame) in popped.drain(..) {
            values.extend(frame);
        }
        Some(values)
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn execute(&mut self, query: &SqlQuery) -> Result<QueryResult> {
        self.log(&query.sql);
        if query.sql.contains("sleepy") {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        if query.sql.contains("fail") {
            return Err(Error::query(query.sql.as_str(), "mock failure"));
        }

        let head = query.sql.trim_start().to_ascii_uppercase();
        if head.starts_with("INSERT") {
            let value = query.bindings.first().cloned().unwrap_or(Value::Null);
            match self.frames.last_mut() {
                Some((_, frame)) => frame.push(value),
                None => self.state.journal.lock().unwrap().push(value),
            }
            return Ok(QueryResult {
                rows: Vec::new(),
                rows_affected: 1,
                last_insert_id: None,
            });
        }
        if head.starts_with("SELECT") {
            let rows = self.visible_rows();
            return Ok(QueryResult {
                rows_affected: rows.len() as u64,
                rows,
                last_insert_id: None,
            });
        }
        Ok(QueryResult::default())
    }

    fn stream<'c>(&'c mut self, query: &'c SqlQuery) -> BoxStream<'c, Result<Row>> {
        self.log(&query.sql);
        if query.sql.contains("slow") {
            return futures::stream::unfold(0i64, |n| async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Some((Ok(value_row(Value::Int(n))), n + 1))
            })
            .boxed();
        }
        if query.sql.contains("stall") {
            return futures::stream::iter([Ok(value_row(Value::Int(0)))])
                .chain(futures::stream::pending())
                .boxed();
        }
        if query.sql.contains("fail") {
            let items = vec![
                Ok(value_row(Value::Int(0))),
                Err(Error::query(query.sql.as_str(), "mock stream failure")),
            ];
            return futures::stream::iter(items).boxed();
        }
        futures::stream::iter(self.visible_rows().into_iter().map(Ok)).boxed()
    }

    async fn batch(&mut self, sql: &str) -> Result<()> {
        self.log(sql);
        if sql == "BEGIN" {
            self.frames.push((None, Vec::new()));
        } else if sql == "COMMIT" {
            let mut journal = self.state.journal.lock().unwrap();
            for (_, frame) in self.frames.drain(..) {
                journal.extend(frame);
            }
        } else if sql == "ROLLBACK" {
            self.frames.clear();
        } else if let Some(name) = sql.strip_prefix("ROLLBACK TO SAVEPOINT ") {
            self.unwind_to(name)
                .ok_or_else(|| Error::query(sql, "no such savepoint"))?;
        } else if let Some(name) = sql.strip_prefix("RELEASE SAVEPOINT ") {
            let values = self
                .unwind_to(name)
                .ok_or_else(|| Error::query(sql, "no such savepoint"))?;
            match self.frames.last_mut() {
                Some((_, frame)) => frame.extend(values),
                None => self.state.journal.lock().unwrap().extend(values),
            }
        } else if let Some(name) = sql.strip_prefix("SAVEPOINT ") {
            self.frames.push((Some(name.to_string()), Vec::new()));
        }
        Ok(())
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A client over `backend` with no eager connections.
pub async fn client(backend: &MockBackend, max: usize) -> Client {
    init_tracing();
    Client::builder(backend.clone())
        .pool(PoolConfig::new().min(0).max(max))
        .build()
        .await
        .unwrap()
}

/// Poll `check` until it holds, failing after one second.
pub async fn eventually<F: Fn() -> bool>(check: F) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within 1s");
}
