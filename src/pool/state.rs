//! Pool State Machine
//!
//! ```text
//!            disconnect()            close()
//!  RUNNING ───────────────▶ RECONNECTING ──────▶ CLOSED
//!     ▲  ◀─────────────────      │                 ▲
//!     │        connect()         │                 │
//!     └──────────────────────────┴──── close() ────┘
//! ```
//!
//! CLOSED is terminal: every transition out of it is rejected.

use std::sync::atomic::{AtomicU8, Ordering};

use crate::error::{ConnectorError, Result};

/// Pool lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PoolState {
    Running = 0,
    Reconnecting = 1,
    Closed = 2,
}

impl PoolState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => PoolState::Running,
            1 => PoolState::Reconnecting,
            _ => PoolState::Closed,
        }
    }
}

/// Atomically updated pool state
#[derive(Debug)]
pub struct StateMachine {
    state: AtomicU8,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(PoolState::Running as u8),
        }
    }

    pub fn current(&self) -> PoolState {
        PoolState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        self.current() == PoolState::Running
    }

    pub fn is_reconnecting(&self) -> bool {
        self.current() == PoolState::Reconnecting
    }

    pub fn is_closed(&self) -> bool {
        self.current() == PoolState::Closed
    }

    /// RECONNECTING → RUNNING (RUNNING stays RUNNING)
    ///
    /// Returns the state before the transition.
    pub fn connect(&self) -> Result<PoolState> {
        self.transition(PoolState::Running)
    }

    /// RUNNING → RECONNECTING (RECONNECTING stays RECONNECTING)
    pub fn disconnect(&self) -> Result<PoolState> {
        self.transition(PoolState::Reconnecting)
    }

    /// RUNNING | RECONNECTING → CLOSED
    pub fn close(&self) -> Result<PoolState> {
        self.transition(PoolState::Closed)
    }

    fn transition(&self, target: PoolState) -> Result<PoolState> {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if PoolState::from_u8(current) == PoolState::Closed {
                return Err(ConnectorError::PoolClosed);
            }
            match self.state.compare_exchange_weak(
                current,
                target as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(previous) => return Ok(PoolState::from_u8(previous)),
                Err(actual) => current = actual,
            }
        }
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
