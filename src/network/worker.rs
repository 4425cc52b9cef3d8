//! Transport Worker
//!
//! Owns one TCP socket to the server.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use socket2::SockRef;

use crate::error::{ConnectorError, Result};

/// Whether a worker's socket is believed usable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Connected,
    Disconnected,
}

/// One pooled socket connection
///
/// Any I/O failure closes the socket and flips the worker to
/// `Disconnected`; `connect` reopens it in place.
pub struct TransportWorker {
    /// Pool-local id for logging
    id: u64,

    host: String,
    port: u16,
    read_timeout: Duration,

    stream: Option<TcpStream>,
    connectivity: Connectivity,

    /// Set on release; orders workers for idle eviction
    last_released: Instant,
}

impl TransportWorker {
    /// Create a disconnected worker
    pub fn new(id: u64, host: impl Into<String>, port: u16, read_timeout: Duration) -> Self {
        Self {
            id,
            host: host.into(),
            port,
            read_timeout,
            stream: None,
            connectivity: Connectivity::Disconnected,
            last_released: Instant::now(),
        }
    }

    /// Open (or reopen) the socket
    ///
    /// Enables keep-alive, disables Nagle and applies the read timeout.
    pub fn connect(&mut self) -> Result<()> {
        self.close();

        let stream = self.open_stream()?;
        stream.set_nodelay(true)?;
        SockRef::from(&stream).set_keepalive(true)?;
        if !self.read_timeout.is_zero() {
            stream.set_read_timeout(Some(self.read_timeout))?;
        }

        tracing::debug!(
            "Worker {} connected to {}:{}",
            self.id,
            self.host,
            self.port
        );
        self.stream = Some(stream);
        self.connectivity = Connectivity::Connected;
        Ok(())
    }

    fn open_stream(&self) -> Result<TcpStream> {
        let addrs: Vec<SocketAddr> = (self.host.as_str(), self.port).to_socket_addrs()?.collect();

        let mut last_err = None;
        for addr in &addrs {
            let attempt = if self.read_timeout.is_zero() {
                TcpStream::connect(addr)
            } else {
                TcpStream::connect_timeout(addr, self.read_timeout)
            };
            match attempt {
                Ok(stream) => return Ok(stream),
                Err(e) => last_err = Some(e),
            }
        }

        Err(match last_err {
            Some(e) => ConnectorError::Transport(e),
            None => ConnectorError::Transport(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{}:{} resolved to no addresses", self.host, self.port),
            )),
        })
    }

    /// Write the whole buffer
    pub fn write_data(&mut self, buffer: &[u8]) -> Result<()> {
        let result = match self.stream.as_mut() {
            Some(stream) => stream.write_all(buffer).and_then(|_| stream.flush()),
            None => Err(not_connected()),
        };
        self.check(result)
    }

    /// Fill the whole buffer, blocking up to the read timeout per read
    pub fn read_data(&mut self, buffer: &mut [u8]) -> Result<()> {
        let result = match self.stream.as_mut() {
            Some(stream) => stream.read_exact(buffer),
            None => Err(not_connected()),
        };
        self.check(result)
    }

    fn check(&mut self, result: std::io::Result<()>) -> Result<()> {
        if let Err(e) = result {
            tracing::debug!("Worker {} I/O failure: {}", self.id, e);
            self.close();
            return Err(ConnectorError::Transport(e));
        }
        Ok(())
    }

    /// Tear down the socket; safe to call repeatedly
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
            tracing::trace!("Worker {} closed", self.id);
        }
        self.connectivity = Connectivity::Disconnected;
    }

    pub fn is_connected(&self) -> bool {
        self.connectivity == Connectivity::Connected
    }

    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn last_released(&self) -> Instant {
        self.last_released
    }

    /// Stamp the release time
    pub(crate) fn touch(&mut self) {
        self.last_released = Instant::now();
    }
}

impl Drop for TransportWorker {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for TransportWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportWorker")
            .field("id", &self.id)
            .field("peer", &format_args!("{}:{}", self.host, self.port))
            .field("connectivity", &self.connectivity)
            .finish()
    }
}

fn not_connected() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::NotConnected, "worker is not connected")
}
