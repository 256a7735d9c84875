//! Pool behavior when the factory fails.

#![allow(clippy::unwrap_used, clippy::panic)]

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use conn_pool::{Pool, PoolConfig, PoolError, ResourceId};
use conn_pool_testing::{MockError, MockFactory};

#[test]
fn failure_is_reported_and_slot_reused() {
    let factory = MockFactory::new().failing_first(2);
    let pool = Pool::new(PoolConfig::new().capacity(2), factory.clone()).unwrap();

    for attempt in 0..2 {
        match pool.acquire() {
            Err(PoolError::ResourceCreationFailed { source, .. }) => {
                let mock = source.downcast_ref::<MockError>().unwrap();
                assert!(matches!(mock, MockError::Refused { attempt: a } if *a == attempt));
            }
            other => panic!("expected creation failure, got {other:?}"),
        }
        assert_eq!(pool.alive_count(), 0);
    }

    let a = pool.acquire().unwrap();
    let b = pool.acquire().unwrap();
    assert_eq!(pool.alive_count(), 2);
    assert_eq!((a.id(), b.id()), (ResourceId::new(2), ResourceId::new(3)));

    let metrics = pool.metrics();
    assert_eq!(metrics.creation_failures, 2);
    assert_eq!(metrics.resources_created, 2);
    assert_eq!(factory.created(), 2);
}

#[test]
fn waiter_proceeds_after_pending_creation_fails() {
    let factory = MockFactory::new()
        .failing_first(1)
        .with_latency(Duration::from_millis(50));
    let pool = Pool::new(PoolConfig::new().capacity(1), factory).unwrap();

    let first = {
        let pool = pool.clone();
        thread::spawn(move || pool.acquire().map(|conn| conn.id()))
    };
    thread::sleep(Duration::from_millis(10));

    let (tx, rx) = mpsc::channel();
    let second = {
        let pool = pool.clone();
        thread::spawn(move || {
            let id = pool.acquire().map(|conn| conn.id());
            tx.send(id).unwrap();
        })
    };

    assert!(first.join().unwrap().is_err());
    let id = rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();
    assert_eq!(id, ResourceId::new(1));
    second.join().unwrap();

    assert_eq!(pool.alive_count(), 1);
    assert_eq!(pool.in_use_count(), 0);
}

#[test]
fn concurrent_retries_respect_capacity() {
    let factory = MockFactory::new().failing_first(5);
    let pool = Pool::new(PoolConfig::new().capacity(3), factory.clone()).unwrap();

    thread::scope(|s| {
        for _ in 0..10 {
            s.spawn(|| {
                let conn = loop {
                    match pool.acquire() {
                        Ok(conn) => break conn,
                        Err(PoolError::ResourceCreationFailed { .. }) => continue,
                        Err(other) => panic!("unexpected error: {other}"),
                    }
                };
                thread::sleep(Duration::from_millis(1));
                drop(conn);
            });
        }
    });

    let status = pool.status();
    assert!(status.alive <= 3);
    assert_eq!(status.in_use, 0);
    assert_eq!(factory.created(), status.alive);
    assert_eq!(pool.metrics().creation_failures, 5);
}
