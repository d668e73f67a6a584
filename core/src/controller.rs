//! Run orchestration
//!
//! The controller drives one test run through its phases:
//! `Idle -> Publishing -> Draining -> Reported -> Disposed`. The publish
//! phase floods the sink pool from a single driver thread for a fixed
//! duration; the drain phase then busy-polls the registry until it empties
//! or consumption goes stale, whichever happens first. The verdict depends
//! only on the registry residue at drain exit.

use crate::config::HarnessConfig;
use crate::metrics::RunMetrics;
use crate::poll::{Poll, PollWorkerPool};
use crate::registry::MessageRegistry;
use crate::sink::{Sink, SinkPool};
use crate::{HarnessError, Result};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Grain of the drain-phase busy poll. Both exit conditions are re-read on
/// every iteration, so there is no missed-exit window as long as this stays
/// far below the stall threshold.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// The publish driver yields after every batch of this many sends so it
/// does not monopolize the scheduler.
const YIELD_BATCH: u64 = 100;

/// Run lifecycle states. `Disposed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Publishing,
    Draining,
    Reported,
    Disposed,
}

/// Outcome of one run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Messages handed to the sink pool during the publish phase.
    pub produced: u64,
    /// Messages observed by the poll workers, including duplicates and
    /// messages from outside this run.
    pub observed: u64,
    /// Ids still pending at drain exit. Empty means the run passed.
    pub unseen: Vec<String>,
    pub publish_errors: u64,
    pub fetch_errors: u64,
}

impl RunReport {
    /// A run passes iff every published message was observed.
    pub fn success(&self) -> bool {
        self.unseen.is_empty()
    }
}

/// External reporting collaborator. The core only emits the events;
/// formatting beyond [`LogObserver`] lives outside the harness.
pub trait RunObserver {
    fn on_progress(&mut self, produced: u64, pending: usize);
    fn on_report(&mut self, report: &RunReport);
}

/// Default observer: structured log lines via `tracing`.
pub struct LogObserver;

impl RunObserver for LogObserver {
    fn on_progress(&mut self, produced: u64, pending: usize) {
        info!(sent = produced, inflight = pending, "publish progress");
    }

    fn on_report(&mut self, report: &RunReport) {
        info!(
            produced = report.produced,
            observed = report.observed,
            publish_errors = report.publish_errors,
            fetch_errors = report.fetch_errors,
            "run complete"
        );
        if report.unseen.len() > 20 {
            error!(unseen = report.unseen.len(), "unseen messages");
        } else if !report.unseen.is_empty() {
            error!(unseen = %report.unseen.join(","), "unseen messages");
        } else {
            info!("all messages observed");
        }
    }
}

/// Orchestrates one test run over a sink pool and a poll worker pool.
pub struct RunController {
    config: HarnessConfig,
    registry: Arc<MessageRegistry>,
    metrics: Arc<RunMetrics>,
    sinks: SinkPool,
    polls: PollWorkerPool,
    state: RunState,
}

impl RunController {
    /// Validates the configuration and builds both pools. The poll workers
    /// start fetching immediately, before the first publish, so nothing the
    /// broker delivers early can be missed.
    pub fn new<SF, PF>(config: HarnessConfig, sink_factory: SF, poll_factory: PF) -> Result<Self>
    where
        SF: FnMut() -> Result<Box<dyn Sink>>,
        PF: FnMut() -> Result<Box<dyn Poll>>,
    {
        config.validate()?;
        let registry = Arc::new(MessageRegistry::new());
        let metrics = Arc::new(RunMetrics::new());
        let polls = PollWorkerPool::new(
            config.poll_worker_count,
            Arc::clone(&registry),
            Arc::clone(&metrics),
            poll_factory,
        )?;
        let sinks = SinkPool::new(config.sink_count, Arc::clone(&registry), sink_factory)?;
        Ok(Self {
            config,
            registry,
            metrics,
            sinks,
            polls,
            state: RunState::Idle,
        })
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn metrics(&self) -> &Arc<RunMetrics> {
        &self.metrics
    }

    /// Runs the publish and drain phases and reports the verdict. A
    /// controller runs at most once; call [`RunController::dispose`] (or
    /// drop) afterwards.
    pub fn run(&mut self, observer: &mut dyn RunObserver) -> Result<RunReport> {
        if self.state != RunState::Idle {
            return Err(HarnessError::State(format!(
                "run requires an idle controller, state is {:?}",
                self.state
            )));
        }

        self.state = RunState::Publishing;
        self.publish_phase(observer);

        self.state = RunState::Draining;
        self.drain_phase();

        self.state = RunState::Reported;
        let report = RunReport {
            produced: self.metrics.produced(),
            observed: self.metrics.observed(),
            unseen: self.registry.snapshot(),
            publish_errors: self.metrics.publish_errors(),
            fetch_errors: self.metrics.fetch_errors(),
        };
        observer.on_report(&report);
        Ok(report)
    }

    /// Stops the poll workers (fire-and-forget) and releases the sinks.
    /// Terminal: no further run is permitted. Called automatically on drop.
    pub fn dispose(&mut self) {
        if self.state == RunState::Disposed {
            return;
        }
        self.polls.stop_all();
        self.sinks.dispose_all();
        self.state = RunState::Disposed;
    }

    fn publish_phase(&self, observer: &mut dyn RunObserver) {
        info!(
            duration_ms = self.config.publish_duration_ms,
            sinks = self.sinks.len(),
            workers = self.polls.worker_count(),
            "publish phase started"
        );
        let start = Instant::now();
        let mut last_progress = Instant::now();
        let mut produced: u64 = 0;

        while start.elapsed() < self.config.publish_duration() {
            if last_progress.elapsed() >= self.config.progress_interval() {
                last_progress = Instant::now();
                observer.on_progress(produced, self.registry.len());
            }

            let id = produced.to_string();
            if let Err(e) = self.sinks.random_sink().publish(&id) {
                self.metrics.record_publish_error();
                warn!(error = %e, id = %id, "publish failed");
            }
            produced += 1;
            self.metrics.record_produced();

            if produced % YIELD_BATCH == 0 {
                thread::yield_now();
            }
        }
        info!(produced, "publish phase complete");
    }

    fn drain_phase(&self) {
        info!(
            pending = self.registry.len(),
            "drain phase started, waiting for consumers"
        );
        while !self.registry.is_empty() && self.metrics.idle_time() < self.config.stall_timeout() {
            thread::sleep(DRAIN_POLL_INTERVAL);
        }

        if self.registry.is_empty() {
            info!("registry drained");
        } else {
            warn!(
                pending = self.registry.len(),
                idle_ms = self.metrics.idle_time().as_millis() as u64,
                "consumption stalled"
            );
        }
    }
}

impl Drop for RunController {
    fn drop(&mut self) {
        self.dispose();
    }
}
