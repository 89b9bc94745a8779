//! Identity generation for topics and events.

use std::sync::atomic::{AtomicU64, Ordering};

/// Issues `<prefix><n>` identities, never repeating within its lifetime.
#[derive(Debug)]
pub struct IdGenerator {
    prefix: &'static str,
    next: AtomicU64,
}

impl IdGenerator {
    /// Create a generator starting at zero.
    #[must_use]
    pub const fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            next: AtomicU64::new(0),
        }
    }

    /// Issue the next identity.
    pub fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}{}", self.prefix, n)
    }

    /// Number of identities issued so far.
    #[must_use]
    pub fn issued(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}
