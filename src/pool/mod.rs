//! Pool Module
//!
//! A managed set of live sockets shared by many caller threads.
//!
//! ## Ownership
//! A worker is always in exactly one place: the strategy's idle set, a
//! borrower's `PooledWorker`, or the reconnect queue.
//!
//! ```text
//!             borrow()                     release() [connected]
//!   idle ───────────────▶ PooledWorker ───────────────────────▶ idle
//!    ▲                         │
//!    │ restore()               │ release() [disconnected]
//!    │                         ▼
//!    └──── Reconnector ◀── reconnect queue ◀── evacuate (disconnect storm)
//! ```
//!
//! ## Background threads
//! - `pool-reconnector`: drains the reconnect queue
//! - `pool-idle-reaper`: elastic strategy only, closes stale idle workers
//!
//! Both observe cancellation through a channel whose sender is dropped by
//! `Pool::close`.

mod detector;
mod elastic;
mod fixed;
mod reaper;
mod reconnector;
mod state;

pub use detector::DisconnectDetector;
pub use state::{PoolState, StateMachine};

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::config::{Config, PoolStrategy};
use crate::error::{ConnectorError, Result};
use crate::network::{TransportWorker, WorkerFactory};

use elastic::ElasticStrategy;
use fixed::FixedStrategy;

/// Snapshot of pool bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub state: PoolState,
    pub idle: usize,
    pub borrowed: usize,
    /// Workers owned by the pool, including those awaiting reconnection
    pub total: usize,
    pub reconnecting: usize,
}

enum Strategy {
    Fixed(FixedStrategy),
    Elastic(ElasticStrategy),
}

impl Strategy {
    fn borrow(&self, factory: &WorkerFactory, state: &StateMachine, timeout: Duration) -> Result<TransportWorker> {
        match self {
            Strategy::Fixed(s) => s.borrow(state, timeout),
            Strategy::Elastic(s) => s.borrow(factory, state, timeout),
        }
    }

    fn release(&self, worker: TransportWorker) {
        match self {
            Strategy::Fixed(s) => s.release(worker),
            Strategy::Elastic(s) => s.release(worker),
        }
    }

    fn detach(&self) {
        match self {
            Strategy::Fixed(s) => s.detach(),
            Strategy::Elastic(s) => s.detach(),
        }
    }

    fn restore(&self, worker: TransportWorker) {
        match self {
            Strategy::Fixed(s) => s.restore(worker),
            Strategy::Elastic(s) => s.restore(worker),
        }
    }

    fn forget(&self) {
        match self {
            Strategy::Fixed(s) => s.detach(),
            Strategy::Elastic(s) => s.forget(),
        }
    }

    fn evacuate_idle(&self) -> Vec<TransportWorker> {
        match self {
            Strategy::Fixed(s) => s.evacuate_idle(),
            Strategy::Elastic(s) => s.evacuate_idle(),
        }
    }

    fn wake_all(&self) {
        match self {
            Strategy::Fixed(s) => s.wake_all(),
            Strategy::Elastic(s) => s.wake_all(),
        }
    }

    fn counts(&self) -> (usize, usize, usize) {
        match self {
            Strategy::Fixed(s) => s.counts(),
            Strategy::Elastic(s) => s.counts(),
        }
    }
}

/// State shared between the pool handle, borrowed workers and the
/// background threads
pub(crate) struct PoolShared {
    config: Config,
    factory: WorkerFactory,
    state: StateMachine,
    detector: DisconnectDetector,
    strategy: Strategy,
    reconnect_tx: Sender<TransportWorker>,
    reconnect_rx: Receiver<TransportWorker>,
}

impl PoolShared {
    /// The only way a borrowed worker gets back into the pool
    fn release(&self, mut worker: TransportWorker) {
        worker.touch();

        if self.state.is_closed() {
            tracing::debug!("Pool is closed, closing returned worker {}", worker.id());
            worker.close();
            self.strategy.forget();
            return;
        }

        if worker.is_connected() {
            self.detector.record_success();
            self.strategy.release(worker);
            return;
        }

        tracing::debug!("Worker {} returned disconnected, queued for reconnect", worker.id());
        self.strategy.detach();

        // Flip the state before queueing so the reconnector sees RECONNECTING
        // for every worker queued by this storm and ends it itself
        if self.detector.record_disconnect() {
            self.enter_reconnecting();
        }
        // The receiver lives in `self`, so the queue can't be disconnected
        let _ = self.reconnect_tx.send(worker);
    }

    fn enter_reconnecting(&self) {
        match self.state.disconnect() {
            Ok(PoolState::Running) => {
                tracing::warn!("Disconnect storm detected, pool state RECONNECTING")
            }
            Ok(_) => {}
            Err(_) => return,
        }

        let evacuated = self.strategy.evacuate_idle();
        tracing::info!("Moving {} idle workers to the reconnect queue", evacuated.len());
        for worker in evacuated {
            let _ = self.reconnect_tx.send(worker);
        }
    }

    /// Reconnected worker back into the idle set
    fn restore(&self, mut worker: TransportWorker) {
        if self.state.is_closed() {
            worker.close();
            return;
        }
        worker.touch();
        self.strategy.restore(worker);
    }

    fn evict_idle(&self) -> (usize, Duration) {
        match &self.strategy {
            Strategy::Elastic(s) => s.evict_idle(Instant::now()),
            Strategy::Fixed(_) => (0, self.config.idle_latency_period),
        }
    }
}

/// Fail fast unless the pool is RUNNING
pub(crate) fn check_borrowable(state: &StateMachine) -> Result<()> {
    match state.current() {
        PoolState::Running => Ok(()),
        PoolState::Reconnecting => Err(ConnectorError::PoolUnavailable(
            "Pool is reconnecting, borrow rejected".to_string(),
        )),
        PoolState::Closed => Err(ConnectorError::PoolClosed),
    }
}

/// Sleep unless cancelled; false means the pool is shutting down
pub(crate) fn pause(cancel: &Receiver<()>, duration: Duration) -> bool {
    matches!(cancel.recv_timeout(duration), Err(RecvTimeoutError::Timeout))
}

/// Open `count` workers, retrying every `reconnect_timeout` until
/// `initialize_timeout` has passed
fn open_workers(factory: &WorkerFactory, count: usize, config: &Config) -> Result<Vec<TransportWorker>> {
    let started = Instant::now();
    let mut workers = Vec::with_capacity(count);

    while workers.len() < count {
        match factory.create() {
            Ok(worker) => workers.push(worker),
            Err(e) => {
                tracing::warn!("Can't connect to {}: {}", config.address(), e);
                let elapsed = started.elapsed();
                if elapsed >= config.initialize_timeout {
                    return Err(ConnectorError::PoolTimeout(format!(
                        "Pool initialization exceeded {:?} with {} of {} workers open",
                        config.initialize_timeout,
                        workers.len(),
                        count
                    )));
                }
                std::thread::sleep(config.reconnect_timeout.min(config.initialize_timeout - elapsed));
            }
        }
    }

    Ok(workers)
}

/// Connection pool handle
///
/// Dropping the handle closes the pool.
pub struct Pool {
    shared: Arc<PoolShared>,
    cancel: Mutex<Option<Sender<()>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Pool {
    /// Validate `config`, open the initial workers and start the
    /// background threads
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let factory = WorkerFactory::from_config(&config);
        let strategy = match config.strategy {
            PoolStrategy::Fixed => {
                let workers = open_workers(&factory, config.max_pool_size, &config)?;
                Strategy::Fixed(FixedStrategy::new(workers))
            }
            PoolStrategy::Elastic => {
                let workers = open_workers(&factory, config.min_pool_size, &config)?;
                Strategy::Elastic(ElasticStrategy::new(
                    config.min_pool_size,
                    config.max_pool_size,
                    config.idle_latency_period,
                    workers,
                ))
            }
        };

        let (reconnect_tx, reconnect_rx) = channel::unbounded();
        let shared = Arc::new(PoolShared {
            detector: DisconnectDetector::new(config.disconnect_bound, config.disconnect_window),
            config,
            factory,
            state: StateMachine::new(),
            strategy,
            reconnect_tx,
            reconnect_rx: reconnect_rx.clone(),
        });

        let (cancel_tx, cancel_rx) = channel::bounded::<()>(0);
        let mut tasks = vec![reconnector::spawn(
            Arc::clone(&shared),
            reconnect_rx,
            cancel_rx.clone(),
        )?];
        if shared.config.strategy == PoolStrategy::Elastic {
            tasks.push(reaper::spawn(Arc::clone(&shared), cancel_rx)?);
        }

        let (idle, _, _) = shared.strategy.counts();
        tracing::info!(
            "Pool to {} started: {:?} strategy, {} workers",
            shared.config.address(),
            shared.config.strategy,
            idle
        );

        Ok(Self {
            shared,
            cancel: Mutex::new(Some(cancel_tx)),
            tasks: Mutex::new(tasks),
        })
    }

    /// Take a worker for one exchange
    ///
    /// Fails with `PoolClosed` after `close`, `PoolUnavailable` while
    /// reconnecting, and `PoolTimeout` when nothing frees up within
    /// `waiting_timeout`.
    pub fn borrow(&self) -> Result<PooledWorker> {
        check_borrowable(&self.shared.state)?;
        let worker = self.shared.strategy.borrow(
            &self.shared.factory,
            &self.shared.state,
            self.shared.config.waiting_timeout,
        )?;
        tracing::trace!("Borrowed worker {}", worker.id());
        Ok(PooledWorker {
            shared: Arc::clone(&self.shared),
            worker: Some(worker),
        })
    }

    pub fn state(&self) -> PoolState {
        self.shared.state.current()
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    pub fn stats(&self) -> PoolStats {
        let (idle, borrowed, total) = self.shared.strategy.counts();
        PoolStats {
            state: self.shared.state.current(),
            idle,
            borrowed,
            total,
            reconnecting: self.shared.reconnect_rx.len(),
        }
    }

    /// Run one idle-eviction pass now (the reaper does this periodically)
    ///
    /// Returns the number of workers closed; always 0 for the fixed strategy.
    pub fn evict_idle(&self) -> usize {
        self.shared.evict_idle().0
    }

    /// Close the pool: stop background threads and close every idle and
    /// queued worker. Borrowed workers are closed as they are released.
    pub fn close(&self) {
        match self.shared.state.close() {
            Ok(previous) => tracing::info!("Closing pool (was {:?})", previous),
            Err(_) => return,
        }

        drop(self.cancel.lock().take());
        self.shared.strategy.wake_all();

        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            if task.join().is_err() {
                tracing::error!("Pool background thread panicked");
            }
        }

        for mut worker in self.shared.strategy.evacuate_idle() {
            worker.close();
        }
        for mut worker in self.shared.reconnect_rx.try_iter() {
            worker.close();
        }
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        self.close();
    }
}

/// A worker on loan from the pool
///
/// Returned to the pool by `release` or on drop.
pub struct PooledWorker {
    shared: Arc<PoolShared>,
    worker: Option<TransportWorker>,
}

impl PooledWorker {
    /// Hand the worker back to its pool
    pub fn release(self) {
        drop(self);
    }
}

impl Deref for PooledWorker {
    type Target = TransportWorker;

    fn deref(&self) -> &TransportWorker {
        self.worker.as_ref().expect("worker present until release")
    }
}

impl DerefMut for PooledWorker {
    fn deref_mut(&mut self) -> &mut TransportWorker {
        self.worker.as_mut().expect("worker present until release")
    }
}

impl std::fmt::Debug for PooledWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PooledWorker").field(&self.worker).finish()
    }
}

impl Drop for PooledWorker {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            tracing::trace!("Released worker {}", worker.id());
            self.shared.release(worker);
        }
    }
}
