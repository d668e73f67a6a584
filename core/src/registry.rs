//! Shared in-flight message registry
//!
//! The registry is the single piece of mutable state shared between the
//! publish side and the poll workers. Membership means "published, not yet
//! observed by any consumer". All access goes through one mutex that is held
//! only for the duration of the set mutation, never across transport I/O.

use parking_lot::Mutex;
use std::collections::HashSet;

/// Thread-safe set of pending message ids.
///
/// Ids are added exactly once at publish time and removed at most once at
/// first observation; both operations are idempotent so a duplicate delivery
/// from the broker cannot corrupt the bookkeeping.
pub struct MessageRegistry {
    pending: Mutex<HashSet<String>>,
}

impl MessageRegistry {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashSet::new()),
        }
    }

    /// Marks a message id as in flight. Returns `false` if the id was
    /// already pending.
    pub fn add(&self, id: &str) -> bool {
        self.pending.lock().insert(id.to_string())
    }

    /// Clears a message id after observation. Returns `false` if the id was
    /// not pending at call time.
    pub fn remove(&self, id: &str) -> bool {
        self.pending.lock().remove(id)
    }

    /// Number of ids currently in flight.
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Current membership, sorted for stable reporting.
    pub fn snapshot(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.pending.lock().iter().cloned().collect();
        ids.sort();
        ids
    }
}

impl Default for MessageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn add_and_remove_are_idempotent() {
        let registry = MessageRegistry::new();

        assert!(registry.add("0"));
        assert!(!registry.add("0"));
        assert_eq!(registry.len(), 1);

        assert!(registry.remove("0"));
        assert!(!registry.remove("0"));
        assert!(registry.is_empty());
    }

    #[test]
    fn snapshot_reports_pending_ids() {
        let registry = MessageRegistry::new();
        registry.add("2");
        registry.add("0");
        registry.add("1");
        registry.remove("1");

        assert_eq!(registry.snapshot(), vec!["0".to_string(), "2".to_string()]);
    }

    #[test]
    fn concurrent_adds_and_removes_lose_nothing() {
        let registry = Arc::new(MessageRegistry::new());
        let threads = 4;
        let per_thread = 1000;

        // Every thread adds its own disjoint id range, then removes the
        // bottom half of it.
        let handles: Vec<_> = (0..threads)
            .map(|t| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    let base = t * per_thread;
                    for i in 0..per_thread {
                        registry.add(&(base + i).to_string());
                    }
                    for i in 0..per_thread / 2 {
                        registry.remove(&(base + i).to_string());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.len(), threads * per_thread / 2);
    }

    #[test]
    fn contended_removals_each_win_once() {
        let registry = Arc::new(MessageRegistry::new());
        for i in 0..100 {
            registry.add(&i.to_string());
        }

        // Two threads race to remove the same ids; every id must be removed
        // by exactly one of them.
        let winners: Vec<_> = (0..2)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    let mut won = 0;
                    for i in 0..100 {
                        if registry.remove(&i.to_string()) {
                            won += 1;
                        }
                    }
                    won
                })
            })
            .collect();
        let total: usize = winners.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(total, 100);
        assert!(registry.is_empty());
    }
}
