//! The `*_async` wrappers on a tokio runtime.

use crate::common::{params, service};
use tabula::{ErrorKind, Params, Value};

#[tokio::test]
async fn test_async_lifecycle() {
    let service = service();
    let msg = service
        .connect_async("k".into(), String::new(), false)
        .await
        .unwrap();
    assert_eq!(msg, "Successfully connected to the database with key 'k'.");

    service
        .update_async("k".into(), "CREATE TABLE t (v TEXT)".into(), Vec::new())
        .await
        .unwrap();
    service
        .update_async(
            "k".into(),
            "INSERT INTO t VALUES (:v)".into(),
            vec![params(&[("v", "a".into())]), params(&[("v", "b".into())])],
        )
        .await
        .unwrap();

    let rows = service
        .query_async("k".into(), "SELECT v FROM t ORDER BY v".into(), Params::new())
        .await
        .unwrap();
    let values: Vec<_> = rows.iter().filter_map(|r| r.get("v").cloned()).collect();
    assert_eq!(values, vec![Value::Text("a".into()), Value::Text("b".into())]);

    service.disconnect_async("k".into()).await.unwrap();
}

#[tokio::test]
async fn test_async_errors_propagate() {
    let service = service();
    let err = service
        .query_async("missing".into(), "SELECT 1".into(), Params::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotConnected);

    let err = service
        .connect_async("k".into(), "data.csv".into(), false)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedExtension);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_async_concurrent_connect_one_winner() {
    let service = service();
    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .connect_async("shared".into(), String::new(), false)
                    .await
                    .is_ok()
            })
        })
        .collect();

    let mut winners = 0;
    for task in tasks {
        if task.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}
