//! # Roundtrip
//!
//! An end-to-end correctness harness for Kafka-compatible message brokers.
//! A run publishes uniquely numbered messages from a pool of concurrent
//! producers for a fixed duration, consumes them from a pool of concurrent
//! poll workers, and verifies that every published message was observed
//! within a bounded time window.
//!
//! ## Architecture
//!
//! - [`registry::MessageRegistry`]: thread-safe set of in-flight message ids;
//!   membership means "published, not yet observed by any consumer"
//! - [`sink::SinkPool`]: N producer-side transports, each wrapped so a message
//!   is registered as pending before it is handed to the broker; publishes are
//!   distributed across the pool uniformly at random
//! - [`poll::PollWorkerPool`]: M consumer-side worker threads running bounded
//!   blocking fetch loops, clearing observed ids from the registry
//! - [`controller::RunController`]: drives the publish and drain phases and
//!   produces the pass/fail verdict from the registry residue
//! - [`kafka`] (feature `kafka`, on by default): `rdkafka`-backed transport
//!   bindings plus the topic-administration step used by the CLI binary
//!
//! The transport seam is the pair of traits [`sink::Sink`] and [`poll::Poll`];
//! the core never speaks a wire protocol itself.
//!
//! ## Example
//!
//! ```rust,no_run
//! use roundtrip::{HarnessConfig, LogObserver, Poll, Result, RunController, Sink};
//! use std::sync::mpsc;
//! use std::time::Duration;
//!
//! struct LoopbackSink(mpsc::Sender<String>);
//!
//! impl Sink for LoopbackSink {
//!     fn publish(&self, message: &str) -> Result<()> {
//!         self.0.send(message.to_string()).ok();
//!         Ok(())
//!     }
//!     fn close(&mut self) {}
//! }
//!
//! struct LoopbackPoll(mpsc::Receiver<String>);
//!
//! impl Poll for LoopbackPoll {
//!     fn fetch(&mut self) -> Result<Option<String>> {
//!         Ok(self.0.recv_timeout(Duration::from_millis(100)).ok())
//!     }
//!     fn close(&mut self) {}
//! }
//!
//! fn main() -> Result<()> {
//!     let (tx, rx) = mpsc::channel();
//!     let mut rx = Some(rx);
//!     let config = HarnessConfig {
//!         sink_count: 1,
//!         poll_worker_count: 1,
//!         ..Default::default()
//!     };
//!     let mut controller = RunController::new(
//!         config,
//!         move || Ok(Box::new(LoopbackSink(tx.clone())) as Box<dyn Sink>),
//!         move || Ok(Box::new(LoopbackPoll(rx.take().expect("single worker"))) as Box<dyn Poll>),
//!     )?;
//!     let report = controller.run(&mut LogObserver)?;
//!     println!("verdict: {}", if report.success() { "pass" } else { "fail" });
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod controller;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod metrics;
pub mod poll;
pub mod registry;
pub mod sink;

pub use config::{HarnessConfig, KafkaConfig};
pub use controller::{LogObserver, RunController, RunObserver, RunReport, RunState};
pub use metrics::RunMetrics;
pub use poll::{Poll, PollWorkerPool};
pub use registry::MessageRegistry;
pub use sink::{Sink, SinkPool};

use thiserror::Error;

/// Harness error types
///
/// Transport-level send/fetch failures inside a running worker loop are *not*
/// surfaced through this enum: they are logged, counted, and recovered at the
/// loop iteration that produced them. Errors of this type only occur before a
/// run starts (configuration, transport construction) or when the controller
/// is driven in an invalid order.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Configuration validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Fatal errors while constructing sinks, polls, or worker threads
    #[error("Setup error: {0}")]
    Setup(String),

    /// Controller driven outside its `Idle -> Publishing -> Draining ->
    /// Reported -> Disposed` lifecycle
    #[error("Invalid state: {0}")]
    State(String),

    /// Transport-level failures surfaced by a `Sink` or `Poll` implementation
    #[error("Transport error: {0}")]
    Transport(String),

    /// Errors from the Kafka client layer
    #[cfg(feature = "kafka")]
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),
}

/// Result type alias for harness operations
pub type Result<T> = std::result::Result<T, HarnessError>;
