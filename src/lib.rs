//! # Tarantool Connector
//!
//! A pooled client for the Tarantool binary wire protocol with:
//! - Bit-exact frame codec (12-byte header, VarLength-prefixed fields)
//! - Fixed and elastic connection pools
//! - Background reconnection with disconnect-storm detection
//! - Request/response correlation by request id
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 KvStore (id/blob helpers)                    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                 Connector (dispatcher)                       │
//! │          borrow → write → read reply → release               │
//! └──────────┬──────────────────────────────────┬───────────────┘
//!            │                                  │
//!            ▼                                  ▼
//!   ┌─────────────────┐                ┌─────────────────┐
//!   │      Pool       │                │    Protocol     │
//!   │ Fixed / Elastic │                │     (codec)     │
//!   └────────┬────────┘                └─────────────────┘
//!            │
//!      ┌─────┴───────────────┐
//!      ▼                     ▼
//! ┌─────────────┐    ┌───────────────┐
//! │   Workers   │    │  Reconnector  │
//! │ (TcpStream) │◀───│ (bg thread)   │
//! └─────────────┘    └───────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod network;
pub mod pool;
pub mod connector;
pub mod kv;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{ConnectorError, Result};
pub use config::{Config, PoolStrategy};
pub use connector::Connector;
pub use kv::KvStore;
pub use pool::{Pool, PoolState, PoolStats, PooledWorker};
pub use protocol::{Operation, Request, Response, Tuple};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of the connector
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
