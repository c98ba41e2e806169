//! Transaction manager behavior against the in-memory backend.

mod common;

use common::MockBackend;
use pretty_assertions::assert_eq;
use quarry::{Error, Queryable, TransactionState, Value};

#[tokio::test]
async fn test_transaction_commits_on_ok() {
    let backend = MockBackend::new();
    let client = common::client(&backend, 2).await;

    let affected = client
        .transaction(|trx| async move {
            trx.table("items").insert([("value", 1)]).await?;
            let response = trx.table("items").insert([("value", 2)]).await?;
            Ok::<_, Error>(response.rows_affected())
        })
        .await
        .unwrap();

    assert_eq!(affected, 1);
    assert_eq!(backend.journal(), vec![Value::Int(1), Value::Int(2)]);
    assert_eq!(
        backend.statements(),
        vec![
            "BEGIN",
            r#"INSERT INTO "items" ("value") VALUES (?)"#,
            r#"INSERT INTO "items" ("value") VALUES (?)"#,
            "COMMIT",
        ]
    );
    assert_eq!(client.pool().stats().acquired, 0);
}

#[tokio::test]
async fn test_transaction_rolls_back_on_error() {
    let backend = MockBackend::new();
    let client = common::client(&backend, 2).await;

    let result = client
        .transaction(|trx| async move {
            trx.table("items").insert([("value", 1)]).await?;
            trx.raw("select fail").await?;
            Ok::<_, Error>(())
        })
        .await;

    let err = result.unwrap_err();
    assert!(matches!(err, Error::QueryExecution { .. }));
    assert!(backend.journal().is_empty());
    assert_eq!(backend.statements().last().map(String::as_str), Some("ROLLBACK"));
    assert_eq!(client.pool().stats().acquired, 0);
    assert_eq!(client.pool().stats().idle, 1);
}

#[derive(Debug)]
enum AppError {
    Db(Error),
    Rejected(&'static str),
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        AppError::Db(err)
    }
}

#[tokio::test]
async fn test_transaction_passes_caller_error_through() {
    let backend = MockBackend::new();
    let client = common::client(&backend, 1).await;

    let result = client
        .transaction(|trx| async move {
            trx.table("items").insert([("value", 9)]).await?;
            Err::<(), _>(AppError::Rejected("over limit"))
        })
        .await;

    assert!(matches!(result, Err(AppError::Rejected("over limit"))));
    assert!(backend.journal().is_empty());

    let result = client
        .transaction(|trx| async move {
            trx.table("items").insert([("value", 9)]).order_by("value", Default::default()).await?;
            Ok::<_, AppError>(())
        })
        .await;
    assert!(matches!(
        result,
        Err(AppError::Db(Error::StatementKindMismatch { .. }))
    ));
}

#[tokio::test]
async fn test_nested_savepoint_failure_keeps_outer_work() {
    let backend = MockBackend::new();
    let client = common::client(&backend, 1).await;

    client
        .transaction(|outer| async move {
            outer.table("items").insert([("value", 1)]).await?;
            outer
                .transaction(|middle| async move {
                    assert_eq!(middle.depth(), 1);
                    middle.table("items").insert([("value", 2)]).await?;
                    let inner = middle
                        .transaction(|inner| async move {
                            assert_eq!(inner.depth(), 2);
                            inner.table("items").insert([("value", 3)]).await?;
                            inner.raw("select fail").await?;
                            Ok::<_, Error>(())
                        })
                        .await;
                    assert!(inner.is_err());
                    Ok::<_, Error>(())
                })
                .await?;
            Ok::<_, Error>(())
        })
        .await
        .unwrap();

    assert_eq!(backend.journal(), vec![Value::Int(1), Value::Int(2)]);

    let control: Vec<String> = backend
        .statements()
        .into_iter()
        .filter(|s| !s.starts_with("INSERT") && !s.contains("fail"))
        .collect();
    assert_eq!(
        control,
        vec![
            "BEGIN",
            "SAVEPOINT trx1",
            "SAVEPOINT trx2",
            "ROLLBACK TO SAVEPOINT trx2",
            "RELEASE SAVEPOINT trx1",
            "COMMIT",
        ]
    );
}

#[tokio::test]
async fn test_outer_rollback_discards_released_savepoint() {
    let backend = MockBackend::new();
    let client = common::client(&backend, 1).await;

    let trx = client.begin().await.unwrap();
    let child = trx.savepoint().await.unwrap();
    child.table("items").insert([("value", 5)]).await.unwrap();
    child.commit().await.unwrap();
    trx.rollback().await.unwrap();

    assert!(backend.journal().is_empty());
    assert_eq!(child.state(), TransactionState::Committed);
    assert_eq!(trx.state(), TransactionState::RolledBack);
}

#[tokio::test]
async fn test_closed_transaction_rejects_queries() {
    let backend = MockBackend::new();
    let client = common::client(&backend, 1).await;

    let trx = client.begin().await.unwrap();
    assert_eq!(trx.state(), TransactionState::Running);
    trx.commit().await.unwrap();
    assert!(trx.is_completed());

    let err = trx.table("items").insert([("value", 1)]).await.unwrap_err();
    assert!(matches!(err, Error::TransactionClosed(TransactionState::Committed)));

    let err = trx.rollback().await.unwrap_err();
    assert_eq!(err.to_string(), "Transaction closed: transaction is already committed");

    let err = trx.savepoint().await.unwrap_err();
    assert!(matches!(err, Error::TransactionClosed(_)));
}

#[tokio::test]
async fn test_parent_commit_closes_open_children() {
    let backend = MockBackend::new();
    let client = common::client(&backend, 1).await;

    let trx = client.begin().await.unwrap();
    let child = trx.savepoint().await.unwrap();
    let grandchild = child.savepoint().await.unwrap();
    grandchild.table("items").insert([("value", 7)]).await.unwrap();

    trx.commit().await.unwrap();

    assert_eq!(child.state(), TransactionState::Committed);
    assert_eq!(grandchild.state(), TransactionState::Committed);
    assert_eq!(backend.journal(), vec![Value::Int(7)]);

    let err = grandchild.raw("select 1").await.unwrap_err();
    assert!(matches!(err, Error::TransactionClosed(TransactionState::Committed)));
    assert!(matches!(
        child.commit().await,
        Err(Error::TransactionClosed(TransactionState::Committed))
    ));
}

#[tokio::test]
async fn test_child_rollback_closes_later_savepoints() {
    let backend = MockBackend::new();
    let client = common::client(&backend, 1).await;

    let trx = client.begin().await.unwrap();
    let first = trx.savepoint().await.unwrap();
    let second = first.savepoint().await.unwrap();

    first.rollback().await.unwrap();
    assert_eq!(second.state(), TransactionState::RolledBack);
    assert_eq!(trx.state(), TransactionState::Running);

    trx.commit().await.unwrap();
    assert!(
        backend
            .statements()
            .contains(&"ROLLBACK TO SAVEPOINT trx1".to_string())
    );
}

#[tokio::test]
async fn test_transacting_builder_runs_on_reserved_connection() {
    let backend = MockBackend::new();
    let client = common::client(&backend, 2).await;

    let trx = client.begin().await.unwrap();
    client
        .table("items")
        .insert([("value", 4)])
        .transacting(&trx)
        .await
        .unwrap();

    let inside = trx.table("items").await.unwrap().into_rows();
    assert_eq!(inside.len(), 1);
    assert!(backend.journal().is_empty());

    trx.rollback().await.unwrap();
    assert!(backend.journal().is_empty());
    assert_eq!(backend.connects(), 1);
}

#[tokio::test]
async fn test_dropped_transaction_rolls_back() {
    let backend = MockBackend::new();
    let client = common::client(&backend, 1).await;

    {
        let trx = client.begin().await.unwrap();
        trx.table("items").insert([("value", 3)]).await.unwrap();
    }

    let pool = client.pool().clone();
    common::eventually(|| pool.stats().acquired == 0).await;

    assert!(backend.journal().is_empty());
    assert_eq!(backend.statements().last().map(String::as_str), Some("ROLLBACK"));

    client.table("items").insert([("value", 8)]).await.unwrap();
    assert_eq!(backend.journal(), vec![Value::Int(8)]);
}

#[tokio::test]
async fn test_query_timeout_abandons_transaction() {
    let backend = MockBackend::new();
    let client = common::client(&backend, 1).await;

    let trx = client.begin().await.unwrap();
    let err = trx
        .raw("select sleepy")
        .timeout(std::time::Duration::from_millis(20))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::QueryTimeout(_)));
    assert_eq!(trx.state(), TransactionState::RolledBack);
    assert_eq!(client.pool().stats().acquired, 0);
    assert_eq!(backend.live(), 0);
}

#[tokio::test]
async fn test_dropped_savepoint_is_not_committed_by_parent() {
    let backend = MockBackend::new();
    let client = common::client(&backend, 1).await;

    let trx = client.begin().await.unwrap();
    let child = trx.savepoint().await.unwrap();
    child.table("items").insert([("value", 9)]).await.unwrap();
    drop(child);

    trx.table("items").insert([("value", 1)]).await.unwrap();
    trx.commit().await.unwrap();

    assert_eq!(backend.journal(), vec![Value::Int(1)]);
    assert_eq!(
        backend.statements(),
        vec![
            "BEGIN",
            "SAVEPOINT trx1",
            r#"INSERT INTO "items" ("value") VALUES (?)"#,
            "ROLLBACK TO SAVEPOINT trx1",
            r#"INSERT INTO "items" ("value") VALUES (?)"#,
            "COMMIT",
        ]
    );
    assert_eq!(trx.state(), TransactionState::Committed);
}

#[tokio::test]
async fn test_dropped_savepoint_settled_by_immediate_commit() {
    let backend = MockBackend::new();
    let client = common::client(&backend, 1).await;

    let trx = client.begin().await.unwrap();
    let child = trx.savepoint().await.unwrap();
    let grandchild = child.savepoint().await.unwrap();
    grandchild.table("items").insert([("value", 9)]).await.unwrap();
    drop(child);

    assert_eq!(grandchild.state(), TransactionState::Running);
    trx.commit().await.unwrap();

    assert!(backend.journal().is_empty());
    assert_eq!(grandchild.state(), TransactionState::RolledBack);
    assert!(
        backend
            .statements()
            .contains(&"ROLLBACK TO SAVEPOINT trx1".to_string())
    );
}
