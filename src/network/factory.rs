//! Worker Factory
//!
//! Creates connected workers for one server address.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::config::Config;
use crate::error::Result;

use super::TransportWorker;

/// Creates workers bound to one host/port
pub struct WorkerFactory {
    host: String,
    port: u16,
    read_timeout: Duration,
    next_id: AtomicU64,
}

impl WorkerFactory {
    pub fn new(host: impl Into<String>, port: u16, read_timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            read_timeout,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.host.clone(), config.port, config.socket_read_timeout)
    }

    /// A worker that has not connected yet
    pub fn build(&self) -> TransportWorker {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        TransportWorker::new(id, self.host.clone(), self.port, self.read_timeout)
    }

    /// A connected worker
    pub fn create(&self) -> Result<TransportWorker> {
        let mut worker = self.build();
        worker.connect()?;
        Ok(worker)
    }
}
