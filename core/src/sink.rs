//! Producer-side transport abstraction and pool
//!
//! A [`SinkPool`] owns N transport sinks and hands publishes to a uniformly
//! chosen one. Every sink is wrapped so the message id lands in the shared
//! registry *before* the transport send happens: a consumer must never be
//! able to observe a message that is not yet marked pending.

use crate::registry::MessageRegistry;
use crate::{HarnessError, Result};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tracing::trace;

/// One producer-side transport.
///
/// `publish` failures surface as errors to the caller, which logs and counts
/// them without aborting the publish phase. `close` releases the underlying
/// transport and is called exactly once, at pool disposal.
pub trait Sink: Send {
    fn publish(&self, message: &str) -> Result<()>;
    fn close(&mut self);
}

/// A pool sink: registers the message as in flight, then delegates to the
/// wrapped transport. Registration must happen first, see the module docs.
pub struct RegisteredSink {
    inner: Box<dyn Sink>,
    registry: Arc<MessageRegistry>,
}

impl RegisteredSink {
    pub fn publish(&self, message: &str) -> Result<()> {
        self.registry.add(message);
        trace!(id = %message, "publishing");
        self.inner.publish(message)
    }
}

/// Owns N wrapped sinks and distributes publishes across them uniformly at
/// random. No fairness or per-sink ordering is guaranteed, only that every
/// sink is reachable.
pub struct SinkPool {
    sinks: Vec<RegisteredSink>,
    rng: Mutex<StdRng>,
    disposed: bool,
}

impl SinkPool {
    /// Builds `count` sinks through `factory`. A factory error aborts setup
    /// and surfaces to the caller before any publish happens.
    pub fn new<F>(count: usize, registry: Arc<MessageRegistry>, mut factory: F) -> Result<Self>
    where
        F: FnMut() -> Result<Box<dyn Sink>>,
    {
        if count == 0 {
            return Err(HarnessError::Config(
                "sink count must be greater than zero".to_string(),
            ));
        }
        let mut sinks = Vec::with_capacity(count);
        for _ in 0..count {
            sinks.push(RegisteredSink {
                inner: factory()?,
                registry: Arc::clone(&registry),
            });
        }
        Ok(Self {
            sinks,
            rng: Mutex::new(StdRng::from_entropy()),
            disposed: false,
        })
    }

    /// A uniformly chosen sink for one publish call.
    pub fn random_sink(&self) -> &RegisteredSink {
        let index = self.rng.lock().gen_range(0..self.sinks.len());
        &self.sinks[index]
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Releases every wrapped transport. Safe to call more than once; no
    /// publish may be attempted afterwards.
    pub fn dispose_all(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        for sink in &mut self.sinks {
            sink.inner.close();
        }
    }
}
