//! Recently-completed delivery tokens.
//!
//! The notification channel redelivers. A duplicate scale-up is caught
//! by the token-derived replica name in the topology, but a scale-down
//! leaves no mark a later duplicate could check — re-deriving the
//! decision would simply target the next-oldest replica. The ledger
//! remembers tokens of completed invocations so a sequential duplicate
//! skips before reaching the control plane.
//!
//! Bounded FIFO eviction. Failed invocations are never recorded, so the
//! channel's own redelivery can retry them. The ledger is per-process
//! and advisory: concurrent duplicates that race past it are still
//! resolved by the executor's fresh topology re-read and the control
//! plane's identifier uniqueness.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

/// Bounded set of delivery tokens whose invocations completed.
#[derive(Debug)]
pub struct DeliveryLedger {
    inner: Mutex<Inner>,
    capacity: usize,
}

#[derive(Debug, Default)]
struct Inner {
    seen: HashSet<String>,
    /// Insertion order, front is oldest.
    order: VecDeque<String>,
}

impl DeliveryLedger {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            capacity: capacity.max(1),
        }
    }

    /// Whether this token already completed an invocation.
    pub fn contains(&self, token: &str) -> bool {
        self.inner.lock().unwrap().seen.contains(token)
    }

    /// Record a completed token, evicting the oldest past capacity.
    pub fn record(&self, token: &str) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.seen.insert(token.to_string()) {
            return;
        }
        inner.order.push_back(token.to_string());
        while inner.order.len() > self.capacity {
            if let Some(evicted) = inner.order.pop_front() {
                inner.seen.remove(&evicted);
            }
        }
    }
}
