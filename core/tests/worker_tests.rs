//! Pool-level behavior against an in-memory channel transport.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use roundtrip::{
    HarnessError, MessageRegistry, Poll, PollWorkerPool, Result, RunMetrics, Sink, SinkPool,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

struct ChannelSink {
    tx: Sender<String>,
}

impl Sink for ChannelSink {
    fn publish(&self, message: &str) -> Result<()> {
        self.tx
            .send(message.to_string())
            .map_err(|_| HarnessError::Transport("broker gone".to_string()))
    }
    fn close(&mut self) {}
}

struct ChannelPoll {
    rx: Receiver<String>,
    closes: Arc<AtomicUsize>,
}

impl Poll for ChannelPoll {
    fn fetch(&mut self) -> Result<Option<String>> {
        match self.rx.recv_timeout(Duration::from_millis(50)) {
            Ok(message) => Ok(Some(message)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                thread::sleep(Duration::from_millis(50));
                Ok(None)
            }
        }
    }
    fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::Relaxed);
    }
}

fn wait_until(deadline: Duration, mut check: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn five_messages_roundtrip_across_both_pools() {
    let registry = Arc::new(MessageRegistry::new());
    let metrics = Arc::new(RunMetrics::new());
    let (tx, rx) = crossbeam_channel::unbounded();
    let closes = Arc::new(AtomicUsize::new(0));

    let poll_closes = Arc::clone(&closes);
    let polls = PollWorkerPool::new(2, Arc::clone(&registry), Arc::clone(&metrics), || {
        Ok(Box::new(ChannelPoll {
            rx: rx.clone(),
            closes: Arc::clone(&poll_closes),
        }) as Box<dyn Poll>)
    })
    .unwrap();

    let sinks = SinkPool::new(2, Arc::clone(&registry), || {
        Ok(Box::new(ChannelSink { tx: tx.clone() }) as Box<dyn Sink>)
    })
    .unwrap();

    for i in 0..5 {
        sinks.random_sink().publish(&i.to_string()).unwrap();
    }

    // Each published message is observed exactly once across the pool.
    assert!(wait_until(Duration::from_secs(2), || registry.is_empty()));
    assert!(wait_until(Duration::from_secs(2), || metrics.observed() == 5));

    polls.stop_all();
    assert!(wait_until(Duration::from_secs(1), || {
        closes.load(Ordering::Relaxed) == 2
    }));
}

#[test]
fn stopped_workers_mutate_nothing_further() {
    let registry = Arc::new(MessageRegistry::new());
    let metrics = Arc::new(RunMetrics::new());
    let (tx, rx) = crossbeam_channel::unbounded();
    let closes = Arc::new(AtomicUsize::new(0));

    let poll_closes = Arc::clone(&closes);
    let polls = PollWorkerPool::new(2, Arc::clone(&registry), Arc::clone(&metrics), || {
        Ok(Box::new(ChannelPoll {
            rx: rx.clone(),
            closes: Arc::clone(&poll_closes),
        }) as Box<dyn Poll>)
    })
    .unwrap();

    polls.stop_all();
    assert!(wait_until(Duration::from_secs(1), || {
        closes.load(Ordering::Relaxed) == 2
    }));

    // Messages arriving after worker exit stay pending.
    registry.add("9");
    tx.send("9".to_string()).unwrap();
    thread::sleep(Duration::from_millis(100));
    assert_eq!(registry.len(), 1);
    assert_eq!(metrics.observed(), 0);
}
