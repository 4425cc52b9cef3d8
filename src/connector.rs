//! Connector
//!
//! Request dispatcher over the pool: borrow a worker, write one frame, read
//! the matching reply, release the worker.
//!
//! ## Guarantees
//! - The worker is released on every path, before the result is returned
//! - A reply whose request id differs from the request's is a protocol error
//! - Any failure after a frame went out closes the worker, so it is
//!   reconnected instead of reused with a misaligned stream
//! - Nonzero status codes surface as `ConnectorError::Server`

use crate::config::Config;
use crate::error::{ConnectorError, Result};
use crate::network::TransportWorker;
use crate::pool::{Pool, PoolState, PoolStats};
use crate::protocol::{
    decode_response, encode_request, encode_request_into, Header, Request, Response, HEADER_SIZE,
};

/// Pooled client for one server
pub struct Connector {
    pool: Pool,
}

impl Connector {
    /// Build the pool and check liveness with a ping
    pub fn connect(config: Config) -> Result<Self> {
        let pool = Pool::new(config)?;
        let connector = Self { pool };
        connector.ping()?;
        Ok(connector)
    }

    /// Round-trip an empty ping
    pub fn ping(&self) -> Result<Response> {
        self.execute(&Request::ping())
    }

    /// Send one request and wait for its reply
    pub fn execute(&self, request: &Request) -> Result<Response> {
        let mut worker = self.pool.borrow()?;
        let result = exchange(&mut worker, request);
        worker.release();
        result?.into_result()
    }

    /// Send several requests back-to-back on one worker, then read as many
    /// replies, pairing them with the requests in submission order
    ///
    /// Not safe to share a worker between concurrent batches: after a
    /// failure mid-batch there is no telling which requests were applied.
    /// Server-side failures stay inside the returned responses; check each
    /// with `Response::is_ok` or `Response::into_result`.
    pub fn execute_batch(&self, requests: &[Request]) -> Result<Vec<Response>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let mut worker = self.pool.borrow()?;
        let result = exchange_batch(&mut worker, requests);
        worker.release();
        result
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn state(&self) -> PoolState {
        self.pool.state()
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub fn close(&self) {
        self.pool.close();
    }
}

fn exchange(worker: &mut TransportWorker, request: &Request) -> Result<Response> {
    let frame = encode_request(request);
    tracing::trace!(
        "Worker {} -> {} id={} ({} bytes)",
        worker.id(),
        request.command_type().name(),
        request.id(),
        frame.len()
    );
    worker.write_data(&frame)?;
    read_reply(worker, request)
}

fn exchange_batch(worker: &mut TransportWorker, requests: &[Request]) -> Result<Vec<Response>> {
    let mut frames = Vec::new();
    for request in requests {
        encode_request_into(request, &mut frames);
    }
    tracing::trace!(
        "Worker {} -> batch of {} requests ({} bytes)",
        worker.id(),
        requests.len(),
        frames.len()
    );
    worker.write_data(&frames)?;

    let mut responses = Vec::with_capacity(requests.len());
    for request in requests {
        match read_reply(worker, request) {
            Ok(response) => responses.push(response),
            Err(e) => {
                // Unread replies are still queued on the socket
                worker.close();
                return Err(e);
            }
        }
    }
    Ok(responses)
}

/// Read exactly one reply frame and check it answers `request`
fn read_reply(worker: &mut TransportWorker, request: &Request) -> Result<Response> {
    let mut raw = [0u8; HEADER_SIZE];
    worker.read_data(&mut raw)?;
    let header = Header::decode(&raw);

    let body_len = match header.check_body_length() {
        Ok(len) => len,
        Err(e) => {
            // The rest of the stream can't be framed any more
            worker.close();
            return Err(e);
        }
    };
    let mut body = vec![0u8; body_len];
    if body_len > 0 {
        worker.read_data(&mut body)?;
    }

    let response = match decode_response(&header, &body) {
        Ok(response) => response,
        Err(e) => {
            worker.close();
            return Err(e);
        }
    };
    tracing::trace!(
        "Worker {} <- id={} status={:#x} tuples={}",
        worker.id(),
        response.request_id,
        response.status_code,
        response.tuples.len()
    );

    if response.request_id != request.id() {
        // Replies are no longer aligned with requests on this socket
        worker.close();
        return Err(ConnectorError::Protocol(format!(
            "Response id {} does not match request id {}",
            response.request_id,
            request.id()
        )));
    }

    Ok(response)
}
