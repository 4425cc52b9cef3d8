//! Idle reaper
//!
//! Periodic eviction pass for the elastic strategy. Sleeps until the oldest
//! idle worker is due, but never less than `MIN_REAP_PERIOD`.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam::channel::Receiver;

use super::{pause, PoolShared};

/// Floor on the pause between eviction passes
pub(crate) const MIN_REAP_PERIOD: Duration = Duration::from_millis(250);

pub(crate) fn spawn(shared: Arc<PoolShared>, cancel: Receiver<()>) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("pool-idle-reaper".to_string())
        .spawn(move || run(&shared, &cancel))
}

fn run(shared: &PoolShared, cancel: &Receiver<()>) {
    let mut delay = shared.config.idle_latency_period.max(MIN_REAP_PERIOD);

    while pause(cancel, delay) {
        if shared.state.is_closed() {
            break;
        }

        let (evicted, next_due) = shared.evict_idle();
        if evicted > 0 {
            tracing::debug!("Idle reaper closed {} workers", evicted);
        }
        delay = next_due.max(MIN_REAP_PERIOD);
    }

    tracing::debug!("Idle reaper stopped");
}
