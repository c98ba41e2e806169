//! Execution surfaces and query hooks against the in-memory backend.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{MockBackend, value_row};
use futures::StreamExt;
use pretty_assertions::assert_eq;
use quarry::{
    Client, Error, PoolConfig, QueryEvent, Queryable, Response, StreamOptions, Value,
};

async fn seeded(backend: &MockBackend, max: usize) -> Client {
    let client = common::client(backend, max).await;
    client
        .table("items")
        .insert([("value", 1)])
        .await
        .unwrap();
    client
        .table("items")
        .insert([("value", 2)])
        .await
        .unwrap();
    client
}

#[tokio::test]
async fn test_deferred_execution_shapes_response() {
    let backend = MockBackend::new();
    let client = seeded(&backend, 2).await;

    let all = client.table("items").select(["value"]).await.unwrap();
    assert_eq!(
        all,
        Response::Rows(vec![value_row(Value::Int(1)), value_row(Value::Int(2))])
    );

    let first = client.table("items").first().await.unwrap();
    assert_eq!(first, Response::Row(Some(value_row(Value::Int(1)))));

    let values = client.table("items").pluck("value").await.unwrap();
    assert_eq!(values.into_values(), vec![Value::Int(1), Value::Int(2)]);

    let inserted = client.table("items").insert([("value", 3)]).await.unwrap();
    assert_eq!(
        inserted,
        Response::Affected {
            rows: 1,
            last_insert_id: None
        }
    );
}

#[tokio::test]
async fn test_builder_error_fails_before_io() {
    let backend = MockBackend::new();
    let client = common::client(&backend, 1).await;

    let err = client.query_builder().insert([("value", 1)]).await.unwrap_err();
    assert!(matches!(err, Error::BuilderState(_)));

    let err = client
        .table("items")
        .delete()
        .limit(1)
        .execute()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::StatementKindMismatch { .. }));

    assert_eq!(backend.connects(), 0);
    assert!(backend.statements().is_empty());
}

#[tokio::test]
async fn test_query_error_keeps_backend_diagnostic() {
    let backend = MockBackend::new();
    let client = common::client(&backend, 1).await;

    let err = client.raw("select fail").await.unwrap_err();
    match &err {
        Error::QueryExecution { sql, source } => {
            assert_eq!(sql, "select fail");
            assert_eq!(source.to_string(), "mock failure");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(client.pool().stats().acquired, 0);
}

#[tokio::test]
async fn test_callback_invoked_once() {
    let backend = MockBackend::new();
    let client = seeded(&backend, 1).await;

    let (tx, rx) = tokio::sync::oneshot::channel();
    client
        .table("items")
        .select(["value"])
        .as_callback(move |result| {
            let _ = tx.send(result);
        })
        .await
        .unwrap();

    let response = rx.await.unwrap().unwrap();
    assert_eq!(response.into_rows().len(), 2);

    let (tx, rx) = tokio::sync::oneshot::channel();
    client.raw("select fail").as_callback(move |result| {
        let _ = tx.send(result);
    });
    assert!(matches!(rx.await.unwrap(), Err(Error::QueryExecution { .. })));
}

#[tokio::test]
async fn test_stream_yields_rows() {
    let backend = MockBackend::new();
    let client = seeded(&backend, 1).await;

    let rows: Vec<_> = client.table("items").stream().collect().await;
    let rows: Vec<_> = rows.into_iter().map(|r| r.unwrap()).collect();

    assert_eq!(rows, vec![value_row(Value::Int(1)), value_row(Value::Int(2))]);
    let pool = client.pool().clone();
    common::eventually(|| pool.stats().acquired == 0).await;
}

#[tokio::test]
async fn test_stream_close_releases_connection() {
    let backend = MockBackend::new();
    let client = common::client(&backend, 1).await;

    let mut stream = client
        .raw("select slow")
        .stream_with(StreamOptions { high_water_mark: 1 });
    for expected in 0..3 {
        let row = stream.next().await.unwrap().unwrap();
        assert_eq!(row.get("value"), Some(&Value::Int(expected)));
    }
    assert_eq!(client.pool().stats().acquired, 1);

    stream.close().await;
    assert_eq!(client.pool().stats().acquired, 0);

    // The released connection is usable again.
    client.raw("select 1").await.unwrap();
}

#[tokio::test]
async fn test_dropped_stream_releases_connection() {
    let backend = MockBackend::new();
    let client = common::client(&backend, 1).await;

    let mut stream = client.raw("select slow").stream();
    stream.next().await.unwrap().unwrap();
    drop(stream);

    let pool = client.pool().clone();
    common::eventually(|| pool.stats().acquired == 0).await;
    assert_eq!(pool.stats().idle, 1);
}

#[tokio::test]
async fn test_stream_error_ends_stream_and_releases() {
    let backend = MockBackend::new();
    let client = common::client(&backend, 1).await;

    let mut stream = client.raw("select fail").stream();
    assert!(stream.next().await.unwrap().is_ok());
    assert!(matches!(
        stream.next().await,
        Some(Err(Error::QueryExecution { .. }))
    ));
    assert!(stream.next().await.is_none());

    let pool = client.pool().clone();
    common::eventually(|| pool.stats().acquired == 0).await;
}

#[tokio::test]
async fn test_stream_inside_transaction() {
    let backend = MockBackend::new();
    let client = common::client(&backend, 1).await;

    let trx = client.begin().await.unwrap();
    trx.table("items").insert([("value", 5)]).await.unwrap();

    let rows: Vec<_> = trx.table("items").stream().collect().await;
    assert_eq!(rows.len(), 1);

    trx.rollback().await.unwrap();
    assert!(backend.journal().is_empty());
}

#[tokio::test]
async fn test_query_timeout_discards_connection() {
    let backend = MockBackend::new();
    let client = common::client(&backend, 1).await;

    let err = client
        .raw("select sleepy")
        .timeout(Duration::from_millis(20))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::QueryTimeout(_)));
    assert_eq!(client.pool().stats().acquired, 0);
    assert_eq!(client.pool().stats().idle, 0);
    assert_eq!(backend.live(), 0);
}

fn event_name(event: &QueryEvent<'_>) -> &'static str {
    match event {
        QueryEvent::Query { .. } => "query",
        QueryEvent::Response { .. } => "response",
        QueryEvent::Error { .. } => "error",
    }
}

#[tokio::test]
async fn test_hooks_run_in_order() {
    let backend = MockBackend::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let first = seen.clone();
    let second = seen.clone();
    let client = Client::builder(backend.clone())
        .pool(PoolConfig::new().min(0).max(1))
        .hook(move |event| {
            first.lock().unwrap().push(format!("a:{}", event_name(event)));
            Ok(())
        })
        .hook(move |event| {
            second.lock().unwrap().push(format!("b:{}", event_name(event)));
            Ok(())
        })
        .build()
        .await
        .unwrap();

    client.table("items").await.unwrap();
    client.raw("select fail").await.unwrap_err();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            "a:query", "b:query", "a:response", "b:response", "a:query", "b:query", "a:error",
            "b:error",
        ]
    );
}

#[tokio::test]
async fn test_failing_hook_aborts_query() {
    let backend = MockBackend::new();
    let client = Client::builder(backend.clone())
        .pool(PoolConfig::new().min(0).max(1))
        .hook(|event| match event {
            QueryEvent::Query { query } if query.sql.starts_with("DELETE") => {
                anyhow::bail!("deletes are disabled")
            }
            _ => Ok(()),
        })
        .build()
        .await
        .unwrap();

    let err = client.table("items").delete().await.unwrap_err();
    assert_eq!(err.to_string(), "Hook failed: deletes are disabled");
    assert!(backend.statements().is_empty());

    client.table("items").await.unwrap();
    assert_eq!(backend.statements(), vec![r#"SELECT * FROM "items""#]);
}

#[tokio::test]
async fn test_stream_timeout_discards_connection() {
    let backend = MockBackend::new();
    let client = common::client(&backend, 1).await;

    let mut stream = client
        .raw("select stall")
        .timeout(Duration::from_millis(20))
        .stream();
    assert!(stream.next().await.unwrap().is_ok());
    assert!(matches!(stream.next().await, Some(Err(Error::QueryTimeout(_)))));
    assert!(stream.next().await.is_none());

    let pool = client.pool().clone();
    common::eventually(|| pool.stats().acquired == 0).await;
    assert_eq!(pool.stats().idle, 0);
    assert_eq!(backend.live(), 0);
}

#[tokio::test]
async fn test_stream_failure_reaches_error_hook() {
    let backend = MockBackend::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let log = seen.clone();
    let client = Client::builder(backend.clone())
        .pool(PoolConfig::new().min(0).max(1))
        .hook(move |event| {
            log.lock().unwrap().push(event_name(event));
            Ok(())
        })
        .build()
        .await
        .unwrap();

    let rows: Vec<_> = client.raw("select fail").stream().collect().await;
    assert_eq!(rows.len(), 2);
    assert!(rows[1].is_err());

    let rows: Vec<_> = client.table("items").stream().collect().await;
    assert!(rows.is_empty());

    assert_eq!(*seen.lock().unwrap(), vec!["query", "error", "query"]);
}
