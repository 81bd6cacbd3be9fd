//! Batch execution tests against the recording mock connection.
//!
//! Run with: cargo test --test models_mock --features test-utils

use std::sync::Arc;

use modelsql::connection::mock::{Call, MockConnection, MockError};
use modelsql::{
    transact, transact_rollback, Capabilities, ConnectionError, Error, Expect, Models, Sqlite,
    Value,
};

#[derive(Debug, Default, Clone)]
struct Order {
    id: i64,
    customer: String,
    total: i64,
}

modelsql::record! {
    Order, table = "orders", {
        id: "key,auto",
        customer: "",
        total: "",
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("MODELSQL_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

fn models() -> Models {
    init_tracing();
    let mut models = Models::new(Arc::new(Sqlite));
    models.register::<Order>().expect("register orders");
    models
}

fn orders(n: i64) -> Vec<Order> {
    (1..=n)
        .map(|i| Order {
            id: 0,
            customer: format!("customer-{i}"),
            total: i * 100,
        })
        .collect()
}

fn generated(id: i64) -> Option<Vec<Value>> {
    Some(vec![Value::Int(id)])
}

fn mock_error(err: &Error) -> Option<&MockError> {
    match err {
        Error::Connection(ConnectionError::Other(e)) => e.downcast_ref::<MockError>(),
        _ => None,
    }
}

#[tokio::test]
async fn test_batch_insert_prepares_once_and_commits() {
    let models = models();
    let insert = models.lookup::<Order>().unwrap().statements().insert.clone().unwrap();
    assert_eq!(insert.scan, vec!["id"]);
    assert_eq!(insert.expect, Expect::Row);

    let mut conn = MockConnection::with_capabilities(Capabilities::all());
    for id in 1..=3 {
        conn.push_row(generated(id)).await;
    }

    let mut values = orders(3);
    models.insert_all(&mut conn, &mut values).await.unwrap();

    let ids: Vec<i64> = values.iter().map(|o| o.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(
        conn.calls().await,
        vec![
            Call::Begin,
            Call::Prepare { sql: insert.sql },
            Call::StatementQueryRow {
                args: vec![Value::Text("customer-1".into()), Value::Int(100)]
            },
            Call::StatementQueryRow {
                args: vec![Value::Text("customer-2".into()), Value::Int(200)]
            },
            Call::StatementQueryRow {
                args: vec![Value::Text("customer-3".into()), Value::Int(300)]
            },
            Call::StatementClose,
            Call::Commit,
        ]
    );
}

#[tokio::test]
async fn test_batch_insert_failure_rolls_back() {
    let models = models();
    let mut conn = MockConnection::with_capabilities(Capabilities::all());
    conn.push_row(generated(1)).await;
    conn.set_fail_on_execution(2).await;

    let mut values = orders(3);
    let err = models.insert_all(&mut conn, &mut values).await.unwrap_err();
    assert_eq!(mock_error(&err), Some(&MockError::Execution(2)));

    let calls = conn.calls().await;
    assert_eq!(conn.count(|c| *c == Call::Begin).await, 1);
    assert_eq!(conn.count(|c| matches!(c, Call::Prepare { .. })).await, 1);
    assert_eq!(conn.count(Call::is_execution).await, 2);
    assert_eq!(conn.count(|c| *c == Call::Rollback).await, 1);
    assert!(!calls.contains(&Call::Commit));
    assert_eq!(calls.last(), Some(&Call::Rollback));

    // The third element was never sent.
    assert_eq!(values[2].id, 0);
}

#[tokio::test]
async fn test_batch_insert_without_prepare_runs_full_sql() {
    let models = models();
    let insert = models.lookup::<Order>().unwrap().statements().insert.clone().unwrap();
    let mut conn = MockConnection::with_capabilities(Capabilities {
        transactions: true,
        prepared_statements: false,
    });
    conn.push_row(generated(10)).await;
    conn.push_row(generated(11)).await;

    let mut values = orders(2);
    models.insert_all(&mut conn, &mut values).await.unwrap();

    let calls = conn.calls().await;
    assert_eq!(calls.len(), 4);
    assert_eq!(calls[0], Call::Begin);
    for call in &calls[1..3] {
        match call {
            Call::QueryRow { sql, .. } => assert_eq!(sql, &insert.sql),
            other => panic!("unexpected call: {other:?}"),
        }
    }
    assert_eq!(calls[3], Call::Commit);
    assert_eq!(values[1].id, 11);
}

#[tokio::test]
async fn test_single_element_batch_skips_transaction() {
    let models = models();
    let mut conn = MockConnection::with_capabilities(Capabilities::all());
    conn.push_row(generated(1)).await;

    let mut values = orders(1);
    models.insert_all(&mut conn, &mut values).await.unwrap();

    let calls = conn.calls().await;
    assert_eq!(calls.len(), 1);
    assert!(matches!(calls[0], Call::QueryRow { .. }));
}

#[tokio::test]
async fn test_batch_update_exec_path() {
    let models = models();
    let update = models.lookup::<Order>().unwrap().statements().update.clone().unwrap();
    assert!(update.scan.is_empty());

    let mut conn = MockConnection::with_capabilities(Capabilities::all());
    let mut values: Vec<Order> = orders(2)
        .into_iter()
        .enumerate()
        .map(|(i, o)| Order { id: i as i64 + 1, ..o })
        .collect();
    models.save_all(&mut conn, &mut values).await.unwrap();

    assert_eq!(
        conn.calls().await,
        vec![
            Call::Begin,
            Call::Prepare { sql: update.sql },
            Call::StatementExec {
                args: vec![
                    Value::Text("customer-1".into()),
                    Value::Int(100),
                    Value::Int(1)
                ]
            },
            Call::StatementExec {
                args: vec![
                    Value::Text("customer-2".into()),
                    Value::Int(200),
                    Value::Int(2)
                ]
            },
            Call::StatementClose,
            Call::Commit,
        ]
    );
}

#[tokio::test]
async fn test_batch_delete() {
    let models = models();
    let mut conn = MockConnection::new();
    let mut values = vec![
        Order {
            id: 4,
            ..Default::default()
        },
        Order {
            id: 5,
            ..Default::default()
        },
    ];
    models.delete_all(&mut conn, &mut values).await.unwrap();

    let calls = conn.calls().await;
    assert_eq!(
        calls[1],
        Call::Exec {
            sql: "DELETE FROM orders\n\tWHERE\n\t\tid = ?".into(),
            args: vec![Value::Int(5)]
        }
    );
}

#[tokio::test]
async fn test_transact_commits() {
    let models = Arc::new(models());
    let mut conn = MockConnection::with_capabilities(Capabilities::all());
    let handle = conn.clone();
    conn.push_row(generated(1)).await;
    conn.push_row(generated(2)).await;

    let saved = transact(&mut conn, move |tx| {
        Box::pin(async move {
            let mut first = Order {
                customer: "a".into(),
                ..Default::default()
            };
            let mut second = Order {
                customer: "b".into(),
                ..Default::default()
            };
            models.save(tx, &mut first).await?;
            models.save(tx, &mut second).await?;
            Ok(vec![first, second])
        })
    })
    .await
    .unwrap();

    assert_eq!(saved[1].id, 2);
    let calls = handle.calls().await;
    assert_eq!(calls.first(), Some(&Call::Begin));
    assert_eq!(calls.last(), Some(&Call::Commit));
    assert_eq!(calls.len(), 4);
}

#[tokio::test]
async fn test_transact_rolls_back_on_error() {
    let models = Arc::new(models());
    let mut conn = MockConnection::with_capabilities(Capabilities::all());
    let handle = conn.clone();
    conn.set_fail_on_execution(1).await;

    let err = transact(&mut conn, move |tx| {
        Box::pin(async move {
            let mut order = Order::default();
            models.insert(tx, &mut order).await
        })
    })
    .await
    .unwrap_err();

    assert_eq!(mock_error(&err), Some(&MockError::Execution(1)));
    assert_eq!(handle.calls().await.last(), Some(&Call::Rollback));
}

#[tokio::test]
async fn test_transact_without_transactions_runs_directly() {
    let mut conn = MockConnection::new();
    let handle = conn.clone();

    let affected = transact(&mut conn, |c| {
        Box::pin(async move { Ok(c.exec("DELETE FROM orders", &[]).await?) })
    })
    .await
    .unwrap();

    assert_eq!(affected, 0);
    assert_eq!(handle.calls().await.len(), 1);
}

#[tokio::test]
async fn test_transact_rollback_always_rolls_back() {
    let mut conn = MockConnection::with_capabilities(Capabilities::all());
    let handle = conn.clone();

    transact_rollback(&mut conn, |c| {
        Box::pin(async move {
            c.exec("DELETE FROM orders", &[]).await?;
            Ok(())
        })
    })
    .await
    .unwrap();

    let calls = handle.calls().await;
    assert_eq!(calls.first(), Some(&Call::Begin));
    assert_eq!(calls.last(), Some(&Call::Rollback));
    assert!(!calls.contains(&Call::Commit));
}

#[tokio::test]
async fn test_transact_rollback_requires_transactions() {
    let mut conn = MockConnection::new();
    let err = transact_rollback(&mut conn, |_| Box::pin(async { Ok(()) }))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Connection(ConnectionError::Unsupported(_))
    ));
}
