//! Per-recipient queues of undelivered notifications.
//!
//! Items only leave a queue through [`PendingQueue::drain`] or a successful
//! push followed by [`PendingQueue::acknowledge`].

use herald_protocol::Notification;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use tracing::debug;

/// FIFO queue of notifications for each recipient id.
#[derive(Debug, Default)]
pub struct PendingQueue {
    queues: Mutex<HashMap<String, VecDeque<Notification>>>,
}

impl PendingQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item to the recipient's queue.
    ///
    /// Returns the queue length after the append.
    pub fn enqueue(&self, recipient: &str, item: Notification) -> usize {
        let kind = item.kind();
        let mut queues = self.queues.lock();
        let queue = queues.entry(recipient.to_string()).or_default();
        queue.push_back(item);
        let len = queue.len();
        drop(queues);

        debug!(%recipient, kind, queued = len, "Pending: enqueued");
        len
    }

    /// Check if anything is queued for `recipient`.
    #[must_use]
    pub fn has_pending(&self, recipient: &str) -> bool {
        self.len(recipient) > 0
    }

    /// Number of items queued for `recipient`.
    #[must_use]
    pub fn len(&self, recipient: &str) -> usize {
        self.queues.lock().get(recipient).map_or(0, VecDeque::len)
    }

    /// Number of items queued across all recipients.
    #[must_use]
    pub fn total(&self) -> usize {
        self.queues.lock().values().map(VecDeque::len).sum()
    }

    /// Copy of the recipient's queue, oldest first.
    #[must_use]
    pub fn snapshot(&self, recipient: &str) -> Vec<Notification> {
        self.queues
            .lock()
            .get(recipient)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Remove `delivered` from the front of the recipient's queue.
    ///
    /// Only the matching prefix is removed, so items enqueued after the
    /// snapshot was taken stay queued, and a second acknowledgement of the
    /// same snapshot removes nothing. Returns the number of items removed.
    pub fn acknowledge(&self, recipient: &str, delivered: &[Notification]) -> usize {
        let mut queues = self.queues.lock();
        let Some(queue) = queues.get_mut(recipient) else {
            return 0;
        };

        let mut removed = 0;
        for item in delivered {
            if queue.front() != Some(item) {
                break;
            }
            queue.pop_front();
            removed += 1;
        }
        if queue.is_empty() {
            queues.remove(recipient);
        }
        drop(queues);

        debug!(%recipient, removed, "Pending: acknowledged");
        removed
    }

    /// Remove and return everything queued for `recipient`.
    pub fn drain(&self, recipient: &str) -> Vec<Notification> {
        let items: Vec<Notification> = self
            .queues
            .lock()
            .remove(recipient)
            .map(Vec::from)
            .unwrap_or_default();
        debug!(%recipient, drained = items.len(), "Pending: drained");
        items
    }

    /// Queue length per recipient, sorted by id.
    #[must_use]
    pub fn counts(&self) -> BTreeMap<String, usize> {
        self.queues
            .lock()
            .iter()
            .map(|(id, q)| (id.clone(), q.len()))
            .collect()
    }
}
