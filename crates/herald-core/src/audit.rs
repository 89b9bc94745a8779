//! Bounded log of published events.

use herald_protocol::Event;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Most recent published events, oldest evicted first.
#[derive(Debug)]
pub struct AuditLog {
    events: Mutex<VecDeque<Event>>,
    capacity: usize,
}

impl AuditLog {
    /// Create a log holding at most `capacity` events.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    /// Append an event, evicting the oldest when full.
    pub fn record(&self, event: Event) {
        if self.capacity == 0 {
            return;
        }
        let mut events = self.events.lock();
        while events.len() >= self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }

    /// Number of retained events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Check if the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Up to `n` most recent events, newest last.
    #[must_use]
    pub fn recent(&self, n: usize) -> Vec<Event> {
        let events = self.events.lock();
        let skip = events.len().saturating_sub(n);
        events.iter().skip(skip).cloned().collect()
    }
}
