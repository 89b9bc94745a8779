//! In-memory notifier for engine tests.

use crate::delivery::{Notifier, PushError};
use async_trait::async_trait;
use herald_protocol::methods::{RECEIVE_EVENT, RECEIVE_PENDING_NOTIFICATIONS, RECEIVE_TOPIC};
use herald_protocol::{Event, Notification, Topic};
use parking_lot::Mutex;
use std::collections::HashMap;

/// One recorded push attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub method: &'static str,
    pub address: String,
    /// Topic name, event title, or the first pending item's label.
    pub label: String,
}

/// Records every push attempt and fails those aimed at configured addresses.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    calls: Mutex<Vec<Call>>,
    /// Remaining failures per address; `None` fails forever.
    failures: Mutex<HashMap<String, Option<u32>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every push to `address` fails.
    pub fn fail_address(&self, address: &str) {
        self.failures.lock().insert(address.to_string(), None);
    }

    /// The next `times` pushes to `address` fail.
    pub fn fail_times(&self, address: &str, times: u32) {
        self.failures.lock().insert(address.to_string(), Some(times));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    fn record(&self, method: &'static str, address: &str, label: &str) -> Result<(), PushError> {
        self.calls.lock().push(Call {
            method,
            address: address.to_string(),
            label: label.to_string(),
        });

        let mut failures = self.failures.lock();
        match failures.get_mut(address) {
            Some(None) => Err(unreachable(address)),
            Some(Some(0)) | None => Ok(()),
            Some(Some(n)) => {
                *n -= 1;
                Err(unreachable(address))
            }
        }
    }
}

fn unreachable(address: &str) -> PushError {
    PushError::Unreachable {
        address: address.to_string(),
        reason: "connection refused".to_string(),
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn receive_topic(&self, address: &str, topic: &Topic) -> Result<(), PushError> {
        self.record(RECEIVE_TOPIC, address, &topic.name)
    }

    async fn receive_event(&self, address: &str, event: &Event) -> Result<(), PushError> {
        self.record(RECEIVE_EVENT, address, &event.title)
    }

    async fn receive_pending(
        &self,
        address: &str,
        items: &[Notification],
    ) -> Result<(), PushError> {
        let label = items.first().map(Notification::label).unwrap_or_default();
        self.record(RECEIVE_PENDING_NOTIFICATIONS, address, label)
    }
}
