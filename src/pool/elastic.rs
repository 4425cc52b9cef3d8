//! Elastic strategy
//!
//! Keeps between `min` and `max` workers. Borrowers take the most recently
//! released idle worker, open a new one while under `max`, and otherwise
//! wait. The reaper closes workers from the least recently used end once
//! they have been idle longer than the latency period.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{ConnectorError, Result};
use crate::network::{TransportWorker, WorkerFactory};

use super::state::StateMachine;

struct Inventory {
    /// Front = most recently released
    idle: VecDeque<TransportWorker>,
    borrowed: usize,
    /// Idle + borrowed + reconnecting
    total: usize,
}

pub(crate) struct ElasticStrategy {
    min: usize,
    max: usize,
    latency: Duration,
    inventory: Mutex<Inventory>,
    available: Condvar,
}

impl ElasticStrategy {
    pub(crate) fn new(min: usize, max: usize, latency: Duration, workers: Vec<TransportWorker>) -> Self {
        Self {
            min,
            max,
            latency,
            inventory: Mutex::new(Inventory {
                total: workers.len(),
                idle: workers.into(),
                borrowed: 0,
            }),
            available: Condvar::new(),
        }
    }

    pub(crate) fn borrow(
        &self,
        factory: &WorkerFactory,
        state: &StateMachine,
        waiting_timeout: Duration,
    ) -> Result<TransportWorker> {
        let deadline = Instant::now() + waiting_timeout;
        let mut inventory = self.inventory.lock();
        loop {
            super::check_borrowable(state)?;

            if let Some(worker) = inventory.idle.pop_front() {
                inventory.borrowed += 1;
                return Ok(worker);
            }

            if inventory.total < self.max {
                // Reserve the slot, then connect without holding the lock
                inventory.total += 1;
                inventory.borrowed += 1;
                drop(inventory);
                return self.open_reserved(factory);
            }

            if self.available.wait_until(&mut inventory, deadline).timed_out()
                && inventory.idle.is_empty()
                && inventory.total >= self.max
            {
                super::check_borrowable(state)?;
                return Err(ConnectorError::PoolTimeout(format!(
                    "No worker became available within {:?}",
                    waiting_timeout
                )));
            }
        }
    }

    fn open_reserved(&self, factory: &WorkerFactory) -> Result<TransportWorker> {
        match factory.create() {
            Ok(worker) => {
                tracing::debug!("Opened extra worker {}", worker.id());
                Ok(worker)
            }
            Err(e) => {
                tracing::warn!("Can't open extra worker: {}", e);
                let mut inventory = self.inventory.lock();
                inventory.total = inventory.total.saturating_sub(1);
                inventory.borrowed = inventory.borrowed.saturating_sub(1);
                self.available.notify_one();
                Err(ConnectorError::PoolUnavailable(format!(
                    "Can't open extra worker: {}",
                    e
                )))
            }
        }
    }

    /// Borrowed → idle
    pub(crate) fn release(&self, worker: TransportWorker) {
        let mut inventory = self.inventory.lock();
        inventory.borrowed = inventory.borrowed.saturating_sub(1);
        inventory.idle.push_front(worker);
        self.available.notify_one();
    }

    /// Borrowed → reconnect queue
    pub(crate) fn detach(&self) {
        let mut inventory = self.inventory.lock();
        inventory.borrowed = inventory.borrowed.saturating_sub(1);
    }

    /// Reconnect queue → idle
    pub(crate) fn restore(&self, worker: TransportWorker) {
        let mut inventory = self.inventory.lock();
        inventory.idle.push_front(worker);
        self.available.notify_one();
    }

    /// Borrowed worker closed for good (pool shut down)
    pub(crate) fn forget(&self) {
        let mut inventory = self.inventory.lock();
        inventory.borrowed = inventory.borrowed.saturating_sub(1);
        inventory.total = inventory.total.saturating_sub(1);
    }

    pub(crate) fn evacuate_idle(&self) -> Vec<TransportWorker> {
        let mut inventory = self.inventory.lock();
        inventory.idle.drain(..).collect()
    }

    /// Close workers idle longer than the latency period, oldest first,
    /// without going below `min`
    ///
    /// Returns how many were closed and how long until the oldest remaining
    /// idle worker becomes due.
    pub(crate) fn evict_idle(&self, now: Instant) -> (usize, Duration) {
        let mut evicted = Vec::new();
        let mut next_due = self.latency;

        {
            let mut inventory = self.inventory.lock();
            while inventory.total > self.min {
                let idle_for = match inventory.idle.back() {
                    Some(worker) => now.saturating_duration_since(worker.last_released()),
                    None => break,
                };
                if idle_for <= self.latency {
                    next_due = self.latency - idle_for;
                    break;
                }
                if let Some(worker) = inventory.idle.pop_back() {
                    inventory.total -= 1;
                    evicted.push(worker);
                }
            }
        }

        let count = evicted.len();
        for mut worker in evicted {
            tracing::debug!("Evicting idle worker {}", worker.id());
            worker.close();
        }
        (count, next_due)
    }

    pub(crate) fn wake_all(&self) {
        let _inventory = self.inventory.lock();
        self.available.notify_all();
    }

    /// (idle, borrowed, total)
    pub(crate) fn counts(&self) -> (usize, usize, usize) {
        let inventory = self.inventory.lock();
        (inventory.idle.len(), inventory.borrowed, inventory.total)
    }
}
