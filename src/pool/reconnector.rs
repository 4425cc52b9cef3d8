//! Reconnector
//!
//! Background thread draining the reconnect queue. Each worker is retried
//! every `reconnect_timeout` until it connects or the pool closes. When the
//! queue empties while the pool is RECONNECTING, the pool waits one more
//! `reconnect_timeout` and flips back to RUNNING only if nothing new was
//! queued in the meantime.

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam::channel::Receiver;
use crossbeam::select;

use crate::network::TransportWorker;

use super::{pause, PoolShared};

pub(crate) fn spawn(
    shared: Arc<PoolShared>,
    queue: Receiver<TransportWorker>,
    cancel: Receiver<()>,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("pool-reconnector".to_string())
        .spawn(move || run(&shared, &queue, &cancel))
}

fn run(shared: &PoolShared, queue: &Receiver<TransportWorker>, cancel: &Receiver<()>) {
    let reconnect_timeout = shared.config.reconnect_timeout;
    tracing::debug!("Reconnector started");

    loop {
        let next = select! {
            recv(queue) -> msg => msg.ok(),
            recv(cancel) -> _ => None,
        };
        let Some(mut worker) = next else {
            break;
        };

        if shared.state.is_closed() {
            break;
        }

        match worker.connect() {
            Ok(()) => {
                tracing::debug!("Worker {} reconnected", worker.id());

                if shared.state.is_reconnecting() && queue.is_empty() {
                    if !pause(cancel, reconnect_timeout) {
                        break;
                    }
                    if queue.is_empty() {
                        match shared.state.connect() {
                            Ok(_) => tracing::info!("Pool recovered, state RUNNING"),
                            Err(_) => break,
                        }
                    }
                }

                shared.restore(worker);
            }
            Err(e) => {
                tracing::warn!(
                    "Reconnect of worker {} failed: {}; retrying in {:?}",
                    worker.id(),
                    e,
                    reconnect_timeout
                );
                if shared.reconnect_tx.send(worker).is_err() {
                    break;
                }
                if !pause(cancel, reconnect_timeout) {
                    break;
                }
            }
        }
    }

    tracing::debug!("Reconnector stopped");
}
