//! Fixed-size strategy
//!
//! Exactly N workers, all opened at construction. A borrower waits on the
//! condvar until one comes back or `waiting_timeout` passes.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{ConnectorError, Result};
use crate::network::TransportWorker;

use super::state::StateMachine;

struct Slots {
    idle: VecDeque<TransportWorker>,
    borrowed: usize,
}

pub(crate) struct FixedStrategy {
    size: usize,
    slots: Mutex<Slots>,
    available: Condvar,
}

impl FixedStrategy {
    pub(crate) fn new(workers: Vec<TransportWorker>) -> Self {
        Self {
            size: workers.len(),
            slots: Mutex::new(Slots {
                idle: workers.into(),
                borrowed: 0,
            }),
            available: Condvar::new(),
        }
    }

    pub(crate) fn borrow(&self, state: &StateMachine, waiting_timeout: Duration) -> Result<TransportWorker> {
        let deadline = Instant::now() + waiting_timeout;
        let mut slots = self.slots.lock();
        loop {
            super::check_borrowable(state)?;

            if let Some(worker) = slots.idle.pop_front() {
                slots.borrowed += 1;
                return Ok(worker);
            }

            if self.available.wait_until(&mut slots, deadline).timed_out() {
                super::check_borrowable(state)?;
                if let Some(worker) = slots.idle.pop_front() {
                    slots.borrowed += 1;
                    return Ok(worker);
                }
                return Err(ConnectorError::PoolTimeout(format!(
                    "No worker became available within {:?}",
                    waiting_timeout
                )));
            }
        }
    }

    /// Borrowed → idle
    pub(crate) fn release(&self, worker: TransportWorker) {
        let mut slots = self.slots.lock();
        slots.borrowed = slots.borrowed.saturating_sub(1);
        slots.idle.push_front(worker);
        self.available.notify_one();
    }

    /// Borrowed → reconnect queue
    pub(crate) fn detach(&self) {
        let mut slots = self.slots.lock();
        slots.borrowed = slots.borrowed.saturating_sub(1);
    }

    /// Reconnect queue → idle
    pub(crate) fn restore(&self, worker: TransportWorker) {
        let mut slots = self.slots.lock();
        slots.idle.push_front(worker);
        self.available.notify_one();
    }

    pub(crate) fn evacuate_idle(&self) -> Vec<TransportWorker> {
        let mut slots = self.slots.lock();
        slots.idle.drain(..).collect()
    }

    pub(crate) fn wake_all(&self) {
        // Take the lock so no borrower misses the wakeup between its state
        // check and its wait
        let _slots = self.slots.lock();
        self.available.notify_all();
    }

    /// (idle, borrowed, total)
    pub(crate) fn counts(&self) -> (usize, usize, usize) {
        let slots = self.slots.lock();
        (slots.idle.len(), slots.borrowed, self.size)
    }
}
