//! Consumer-side transport abstraction and worker pool
//!
//! Each worker owns one transport poll handle and runs on its own OS thread:
//! fetch with a bounded timeout, clear the observed id from the registry,
//! bump the liveness timestamp, repeat. Cancellation is cooperative: the
//! stop flag is checked at every loop iteration boundary and an in-flight
//! bounded fetch is never interrupted.

use crate::metrics::RunMetrics;
use crate::registry::MessageRegistry;
use crate::{HarnessError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, trace, warn};

/// One consumer-side transport.
///
/// `fetch` blocks up to a short bounded interval (on the order of 100ms) and
/// returns the next observed payload or `None`. `close` is the best-effort
/// unsubscribe/release hook, invoked once when the worker loop exits.
pub trait Poll: Send {
    fn fetch(&mut self) -> Result<Option<String>>;
    fn close(&mut self);
}

/// Owns M poll worker threads running independent blocking fetch loops.
pub struct PollWorkerPool {
    stop: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl PollWorkerPool {
    /// Builds `count` polls through `factory` and starts one worker thread
    /// per poll. A factory or spawn error aborts setup, signals any already
    /// started workers to stop, and surfaces to the caller.
    pub fn new<F>(
        count: usize,
        registry: Arc<MessageRegistry>,
        metrics: Arc<RunMetrics>,
        mut factory: F,
    ) -> Result<Self>
    where
        F: FnMut() -> Result<Box<dyn Poll>>,
    {
        if count == 0 {
            return Err(HarnessError::Config(
                "poll worker count must be greater than zero".to_string(),
            ));
        }
        let stop = Arc::new(AtomicBool::new(false));
        let mut workers = Vec::with_capacity(count);
        for i in 0..count {
            let poll = match factory() {
                Ok(poll) => poll,
                Err(e) => {
                    stop.store(true, Ordering::Relaxed);
                    return Err(e);
                }
            };
            let registry = Arc::clone(&registry);
            let metrics = Arc::clone(&metrics);
            let worker_stop = Arc::clone(&stop);
            let spawned = thread::Builder::new()
                .name(format!("poll-worker-{}", i))
                .spawn(move || worker_loop(poll, registry, metrics, worker_stop));
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    stop.store(true, Ordering::Relaxed);
                    return Err(HarnessError::Setup(format!(
                        "failed to spawn poll worker {}: {}",
                        i, e
                    )));
                }
            }
        }
        Ok(Self { stop, workers })
    }

    /// Signals every worker to stop and returns immediately. Workers exit
    /// after their current fetch call returns; the bounded fetch timeout
    /// guarantees eventual exit.
    pub fn stop_all(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for PollWorkerPool {
    fn drop(&mut self) {
        self.stop_all();
    }
}

fn worker_loop(
    mut poll: Box<dyn Poll>,
    registry: Arc<MessageRegistry>,
    metrics: Arc<RunMetrics>,
    stop: Arc<AtomicBool>,
) {
    debug!("poll worker started");
    while !stop.load(Ordering::Relaxed) {
        match poll.fetch() {
            Ok(Some(message)) => {
                if !registry.remove(&message) {
                    trace!(id = %message, "observed message with no pending entry");
                }
                metrics.record_observed();
            }
            Ok(None) => {}
            Err(e) => {
                metrics.record_fetch_error();
                warn!(error = %e, "fetch failed, continuing");
            }
        }
    }
    poll.close();
    debug!("poll worker exited");
}
