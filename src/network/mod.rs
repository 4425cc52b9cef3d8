//! Network Module
//!
//! Socket ownership for the connection pool.
//!
//! ## Architecture
//! - One `TransportWorker` per TCP socket
//! - Blocking full-buffer reads and writes
//! - Any I/O failure marks the worker disconnected

mod factory;
mod worker;

pub use factory::WorkerFactory;
pub use worker::{Connectivity, TransportWorker};
