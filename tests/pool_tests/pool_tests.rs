//! Pool Tests
//!
//! Tests for borrow/release bookkeeping of both strategies.

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use common::{closed_port, wait_until, MockServer};
use tarantool_connector::{Config, ConnectorError, Pool, PoolState, PoolStrategy};

fn elastic_config(server: &MockServer, min: usize, max: usize, latency: Duration) -> Config {
    let mut config = server.config();
    config.strategy = PoolStrategy::Elastic;
    config.min_pool_size = min;
    config.max_pool_size = max;
    config.idle_latency_period = latency;
    config
}

// =============================================================================
// Fixed Strategy Tests
// =============================================================================

#[test]
fn test_fixed_opens_all_workers() {
    let server = MockServer::start();
    let pool = Pool::new(server.config()).unwrap();

    let stats = pool.stats();
    assert_eq!(stats.state, PoolState::Running);
    assert_eq!((stats.idle, stats.borrowed, stats.total), (2, 0, 2));
    assert!(wait_until(Duration::from_secs(1), || server.accepted() == 2));
}

#[test]
fn test_fixed_borrow_and_release() {
    let server = MockServer::start();
    let pool = Pool::new(server.config()).unwrap();

    let first = pool.borrow().unwrap();
    let second = pool.borrow().unwrap();
    assert_ne!(first.id(), second.id());
    assert_eq!(pool.stats().borrowed, 2);
    assert_eq!(pool.stats().idle, 0);

    first.release();
    drop(second);
    let stats = pool.stats();
    assert_eq!((stats.idle, stats.borrowed), (2, 0));
}

#[test]
fn test_fixed_reuses_most_recent_worker() {
    let server = MockServer::start();
    let pool = Pool::new(server.config()).unwrap();

    let id = {
        let worker = pool.borrow().unwrap();
        worker.id()
    };
    assert_eq!(pool.borrow().unwrap().id(), id);
}

#[test]
fn test_fixed_borrow_times_out() {
    let server = MockServer::start();
    let pool = Pool::new(server.config()).unwrap();
    let _a = pool.borrow().unwrap();
    let _b = pool.borrow().unwrap();

    let started = Instant::now();
    let err = pool.borrow().unwrap_err();
    assert!(matches!(err, ConnectorError::PoolTimeout(_)));
    assert!(started.elapsed() >= Duration::from_millis(450));
}

#[test]
fn test_fixed_waiter_gets_released_worker() {
    let server = MockServer::start();
    let mut config = server.config();
    config.max_pool_size = 1;
    config.waiting_timeout = Duration::from_secs(2);
    let pool = Arc::new(Pool::new(config).unwrap());

    let held = pool.borrow().unwrap();
    let held_id = held.id();
    let waiter = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || pool.borrow().map(|w| w.id()))
    };

    thread::sleep(Duration::from_millis(100));
    drop(held);
    assert_eq!(waiter.join().unwrap().unwrap(), held_id);
}

#[test]
fn test_concurrent_borrowers_never_exceed_size() {
    let server = MockServer::start();
    let mut config = server.config();
    config.max_pool_size = 3;
    config.waiting_timeout = Duration::from_secs(5);
    let pool = Arc::new(Pool::new(config).unwrap());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                for _ in 0..20 {
                    let worker = pool.borrow().unwrap();
                    let stats = pool.stats();
                    assert!(stats.borrowed <= 3);
                    assert!(worker.is_connected());
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    let stats = pool.stats();
    assert_eq!((stats.idle, stats.borrowed, stats.total), (3, 0, 3));
}

// =============================================================================
// Elastic Strategy Tests
// =============================================================================

#[test]
fn test_elastic_starts_at_min() {
    let server = MockServer::start();
    let pool = Pool::new(elastic_config(&server, 1, 3, Duration::from_secs(60))).unwrap();

    let stats = pool.stats();
    assert_eq!((stats.idle, stats.borrowed, stats.total), (1, 0, 1));
}

#[test]
fn test_elastic_grows_to_max() {
    let server = MockServer::start();
    let pool = Pool::new(elastic_config(&server, 1, 3, Duration::from_secs(60))).unwrap();

    let workers: Vec<_> = (0..3).map(|_| pool.borrow().unwrap()).collect();
    let stats = pool.stats();
    assert_eq!((stats.idle, stats.borrowed, stats.total), (0, 3, 3));

    let err = pool.borrow().unwrap_err();
    assert!(matches!(err, ConnectorError::PoolTimeout(_)));

    drop(workers);
    let stats = pool.stats();
    assert_eq!((stats.idle, stats.borrowed, stats.total), (3, 0, 3));
}

#[test]
fn test_elastic_reaper_shrinks_to_min() {
    let server = MockServer::start();
    let pool = Pool::new(elastic_config(&server, 1, 3, Duration::from_millis(100))).unwrap();

    let workers: Vec<_> = (0..3).map(|_| pool.borrow().unwrap()).collect();
    drop(workers);
    assert_eq!(pool.stats().total, 3);

    assert!(wait_until(Duration::from_secs(3), || pool.stats().total == 1));
    assert_eq!(pool.stats().idle, 1);
}

#[test]
fn test_elastic_evict_idle_keeps_fresh_workers() {
    let server = MockServer::start();
    let pool = Pool::new(elastic_config(&server, 0, 2, Duration::from_secs(60))).unwrap();

    let a = pool.borrow().unwrap();
    let b = pool.borrow().unwrap();
    drop((a, b));

    assert_eq!(pool.evict_idle(), 0);
    assert_eq!(pool.stats().total, 2);
}

#[test]
fn test_elastic_evicts_least_recently_used_first() {
    let server = MockServer::start();
    let pool = Pool::new(elastic_config(&server, 2, 3, Duration::from_millis(100))).unwrap();

    let a = pool.borrow().unwrap();
    let b = pool.borrow().unwrap();
    let c = pool.borrow().unwrap();
    let (b_id, c_id) = (b.id(), c.id());

    drop(a);
    thread::sleep(Duration::from_millis(30));
    drop((b, c));

    // Only one worker sits above min, and it is the oldest release
    assert!(wait_until(Duration::from_secs(2), || pool.stats().total == 2));
    let first = pool.borrow().unwrap();
    let second = pool.borrow().unwrap();
    let mut ids = vec![first.id(), second.id()];
    ids.sort_unstable();
    let mut expected = vec![b_id, c_id];
    expected.sort_unstable();
    assert_eq!(ids, expected);
}

#[test]
fn test_elastic_borrowed_workers_are_not_evicted() {
    let server = MockServer::start();
    let pool = Pool::new(elastic_config(&server, 0, 3, Duration::from_millis(50))).unwrap();

    let workers: Vec<_> = (0..3).map(|_| pool.borrow().unwrap()).collect();
    thread::sleep(Duration::from_millis(400));
    assert_eq!(pool.evict_idle(), 0);
    let stats = pool.stats();
    assert_eq!((stats.borrowed, stats.total), (3, 3));

    drop(workers);
    assert!(wait_until(Duration::from_secs(2), || pool.stats().total == 0));
}

#[test]
fn test_elastic_open_failure_is_unavailable() {
    let server = MockServer::start();
    let mut config = elastic_config(&server, 0, 2, Duration::from_secs(60));
    config.port = closed_port();

    // min 0 means warm-up opens nothing, so construction succeeds
    let pool = Pool::new(config).unwrap();
    let err = pool.borrow().unwrap_err();
    assert!(matches!(err, ConnectorError::PoolUnavailable(_)));
    assert_eq!(pool.stats().total, 0);
}

#[test]
fn test_fixed_evict_idle_is_noop() {
    let server = MockServer::start();
    let pool = Pool::new(server.config()).unwrap();
    assert_eq!(pool.evict_idle(), 0);
    assert_eq!(pool.stats().idle, 2);
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_init_timeout_without_server() {
    let config = Config::builder()
        .port(closed_port())
        .socket_read_timeout(Duration::from_millis(200))
        .max_pool_size(1)
        .reconnect_timeout(Duration::from_millis(50))
        .initialize_timeout(Duration::from_millis(300))
        .build()
        .unwrap();

    let started = Instant::now();
    let err = Pool::new(config).err().unwrap();
    assert!(matches!(err, ConnectorError::PoolTimeout(_)));
    assert!(started.elapsed() >= Duration::from_millis(300));
}

#[test]
fn test_invalid_config_rejected() {
    let mut config = Config::default();
    config.max_pool_size = 0;
    assert!(matches!(
        Pool::new(config).err().unwrap(),
        ConnectorError::Configuration(_)
    ));

    let mut config = Config::default();
    config.strategy = PoolStrategy::Elastic;
    config.min_pool_size = 5;
    config.max_pool_size = 2;
    assert!(matches!(
        Pool::new(config).err().unwrap(),
        ConnectorError::Configuration(_)
    ));
}

#[test]
fn test_close_rejects_borrow() {
    let server = MockServer::start();
    let pool = Pool::new(server.config()).unwrap();

    pool.close();
    assert_eq!(pool.state(), PoolState::Closed);
    assert!(matches!(pool.borrow().unwrap_err(), ConnectorError::PoolClosed));
    assert_eq!(pool.stats().idle, 0);

    // Idempotent
    pool.close();
    assert_eq!(pool.state(), PoolState::Closed);
}

#[test]
fn test_close_wakes_waiters() {
    let server = MockServer::start();
    let mut config = server.config();
    config.max_pool_size = 1;
    config.waiting_timeout = Duration::from_secs(10);
    let pool = Arc::new(Pool::new(config).unwrap());

    let held = pool.borrow().unwrap();
    let waiter = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || pool.borrow().map(|_| ()))
    };

    thread::sleep(Duration::from_millis(100));
    let started = Instant::now();
    pool.close();
    let result = waiter.join().unwrap();
    assert!(matches!(result, Err(ConnectorError::PoolClosed)));
    assert!(started.elapsed() < Duration::from_secs(5));

    // Released after close: closed, not pooled
    drop(held);
    let stats = pool.stats();
    assert_eq!((stats.idle, stats.borrowed), (0, 0));
}
