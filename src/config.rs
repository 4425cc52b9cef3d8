//! Configuration for the connector
//!
//! Centralized configuration with sensible defaults.

use std::time::Duration;

use crate::error::{ConnectorError, Result};

/// Sizing strategy of the connection pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolStrategy {
    /// Exactly `max_pool_size` sockets, opened eagerly.
    Fixed,

    /// Between `min_pool_size` and `max_pool_size` sockets, grown on demand
    /// and shrunk by the idle reaper.
    Elastic,
}

impl std::str::FromStr for PoolStrategy {
    type Err = ConnectorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "fixed" => Ok(PoolStrategy::Fixed),
            "elastic" | "dynamic" => Ok(PoolStrategy::Elastic),
            other => Err(ConnectorError::Configuration(format!(
                "Unknown pool strategy: {}",
                other
            ))),
        }
    }
}

/// Main configuration for a connector instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Server Configuration
    // -------------------------------------------------------------------------
    /// Server host name or IP address
    pub host: String,

    /// Server port
    pub port: u16,

    /// Bound on a single blocking socket read
    pub socket_read_timeout: Duration,

    // -------------------------------------------------------------------------
    // Pool Configuration
    // -------------------------------------------------------------------------
    /// Sizing strategy
    pub strategy: PoolStrategy,

    /// Lower bound of the elastic pool (ignored by the fixed pool)
    pub min_pool_size: usize,

    /// Upper bound of the elastic pool; exact size of the fixed pool
    pub max_pool_size: usize,

    /// How long `borrow` waits for an idle worker
    pub waiting_timeout: Duration,

    /// Pause between reconnect attempts, also the recovery debounce
    pub reconnect_timeout: Duration,

    /// Overall bound on eager warm-up at construction
    pub initialize_timeout: Duration,

    /// Disconnected returns that trip the pool into RECONNECTING (0 disables)
    pub disconnect_bound: usize,

    /// Window in which `disconnect_bound` returns must accumulate
    pub disconnect_window: Duration,

    /// Idle time after which the elastic reaper closes a worker
    pub idle_latency_period: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 33013,
            socket_read_timeout: Duration::from_secs(5),
            strategy: PoolStrategy::Fixed,
            min_pool_size: 1,
            max_pool_size: 8,
            waiting_timeout: Duration::from_secs(1),
            reconnect_timeout: Duration::from_millis(500),
            initialize_timeout: Duration::from_secs(10),
            disconnect_bound: 3,
            disconnect_window: Duration::from_secs(10),
            idle_latency_period: Duration::from_secs(60),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check the configuration before any socket is opened
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(ConnectorError::Configuration(
                "Host must not be empty".to_string(),
            ));
        }

        if self.max_pool_size == 0 {
            return Err(ConnectorError::Configuration(
                "Max pool size must be greater than zero".to_string(),
            ));
        }

        if self.strategy == PoolStrategy::Elastic && self.min_pool_size > self.max_pool_size {
            return Err(ConnectorError::Configuration(format!(
                "Min pool size {} exceeds max pool size {}",
                self.min_pool_size, self.max_pool_size
            )));
        }

        if self.disconnect_bound > 0 && self.disconnect_window.is_zero() {
            return Err(ConnectorError::Configuration(
                "Disconnect window must be non-zero when a disconnect bound is set".to_string(),
            ));
        }

        Ok(())
    }

    /// `host:port` form used for logging
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
    port_error: Option<i64>,
}

impl ConfigBuilder {
    /// Set the server host
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the server port
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the server port from an untyped source (CLI, env); values
    /// outside [0, 65535] fail at `build`
    pub fn port_number(mut self, port: i64) -> Self {
        match u16::try_from(port) {
            Ok(port) => {
                self.config.port = port;
                self.port_error = None;
            }
            Err(_) => self.port_error = Some(port),
        }
        self
    }

    /// Set the socket read timeout
    pub fn socket_read_timeout(mut self, timeout: Duration) -> Self {
        self.config.socket_read_timeout = timeout;
        self
    }

    /// Set the pool sizing strategy
    pub fn strategy(mut self, strategy: PoolStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    /// Set the minimum pool size (elastic only)
    pub fn min_pool_size(mut self, size: usize) -> Self {
        self.config.min_pool_size = size;
        self
    }

    /// Set the maximum pool size
    pub fn max_pool_size(mut self, size: usize) -> Self {
        self.config.max_pool_size = size;
        self
    }

    /// Set how long a borrow may wait
    pub fn waiting_timeout(mut self, timeout: Duration) -> Self {
        self.config.waiting_timeout = timeout;
        self
    }

    /// Set the reconnect pause / debounce
    pub fn reconnect_timeout(mut self, timeout: Duration) -> Self {
        self.config.reconnect_timeout = timeout;
        self
    }

    /// Set the warm-up bound
    pub fn initialize_timeout(mut self, timeout: Duration) -> Self {
        self.config.initialize_timeout = timeout;
        self
    }

    /// Set the disconnect-storm bound
    pub fn disconnect_bound(mut self, bound: usize) -> Self {
        self.config.disconnect_bound = bound;
        self
    }

    /// Set the disconnect-storm detection window
    pub fn disconnect_window(mut self, window: Duration) -> Self {
        self.config.disconnect_window = window;
        self
    }

    /// Set the idle eviction period (elastic only)
    pub fn idle_latency_period(mut self, period: Duration) -> Self {
        self.config.idle_latency_period = period;
        self
    }

    /// Finish the builder, validating the result
    pub fn build(self) -> Result<Config> {
        if let Some(port) = self.port_error {
            return Err(ConnectorError::Configuration(format!(
                "Port {} is outside [0, 65535]",
                port
            )));
        }
        self.config.validate()?;
        Ok(self.config)
    }
}
