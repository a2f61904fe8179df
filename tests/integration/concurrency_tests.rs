//! Races between callers sharing one service.

use crate::common::service;
use std::sync::{Arc, Barrier};
use std::thread;
use tabula::{ErrorKind, Params, Value};

const THREADS: usize = 8;

#[test]
fn test_concurrent_connect_same_key_has_one_winner() {
    let service = service();
    let barrier = Arc::new(Barrier::new(THREADS));

    let outcomes: Vec<Result<String, ErrorKind>> = (0..THREADS)
        .map(|_| {
            let service = service.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                service.connect("shared", "", false).map_err(|e| e.kind())
            })
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|t| t.join().unwrap())
        .collect();

    assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1);
    assert!(
        outcomes
            .iter()
            .filter_map(|o| o.as_ref().err())
            .all(|kind| *kind == ErrorKind::AlreadyExists)
    );
    assert_eq!(service.list_connections().len(), 1);
}

#[test]
fn test_concurrent_connect_distinct_keys() {
    let service = service();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let service = service.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                service.connect(&format!("k{i}"), "", false)
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    assert_eq!(service.list_connections().len(), THREADS);
}

#[test]
fn test_query_racing_disconnect_sees_result_or_not_connected() {
    let service = service();
    service.connect("k", "", false).unwrap();
    let barrier = Arc::new(Barrier::new(THREADS + 1));

    let queriers: Vec<_> = (0..THREADS)
        .map(|_| {
            let service = service.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let mut disconnected = false;
                for _ in 0..200 {
                    match service.query("k", "SELECT 1 AS one", &Params::new()) {
                        Ok(rows) => {
                            assert!(!disconnected, "query succeeded after NotConnected");
                            assert_eq!(rows[0].get("one"), Some(&Value::Integer(1)));
                        },
                        Err(e) => {
                            assert_eq!(e.kind(), ErrorKind::NotConnected, "{e}");
                            disconnected = true;
                        },
                    }
                }
            })
        })
        .collect();

    barrier.wait();
    service.disconnect("k").unwrap();

    for querier in queriers {
        querier.join().unwrap();
    }
    assert!(service.list_connections().is_empty());
}

#[test]
fn test_updates_on_one_handle_are_serialized() {
    let service = service();
    service.connect("k", "", false).unwrap();
    service
        .update("k", "CREATE TABLE hits (n INTEGER)", &[])
        .unwrap();
    let barrier = Arc::new(Barrier::new(THREADS));

    let writers: Vec<_> = (0..THREADS)
        .map(|_| {
            let service = service.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..25 {
                    service
                        .update("k", "INSERT INTO hits VALUES (1)", &[])
                        .unwrap();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    let rows = service
        .query("k", "SELECT COUNT(*) AS n FROM hits", &Params::new())
        .unwrap();
    assert_eq!(rows[0].get("n"), Some(&Value::Integer(THREADS as i64 * 25)));
}
