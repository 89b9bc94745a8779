//! Event and topic fan-out.
//!
//! The [`DeliveryEngine`] decides, per recipient, whether an item is pushed
//! now or queued for later. Online recipients are pushed concurrently; a
//! recipient that cannot be reached after its allotted attempts has the item
//! queued instead. Nothing handed to the engine is lost silently.

use crate::broker::{BrokerError, BrokerState};
use crate::presence::{ParticipantKind, Presence};
use async_trait::async_trait;
use futures_util::future::join_all;
use herald_protocol::{Event, Notification, Qos, Topic};
use metrics::counter;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Metric names emitted by the engine.
pub mod metric_names {
    pub const PUSH_ATTEMPTS: &str = "herald_push_attempts_total";
    pub const PUSH_FAILURES: &str = "herald_push_failures_total";
    pub const PENDING_ENQUEUED: &str = "herald_pending_enqueued_total";
    pub const PENDING_DELIVERED: &str = "herald_pending_delivered_total";
    pub const EVENTS_PUBLISHED: &str = "herald_events_published_total";
    pub const TOPICS_ADVERTISED: &str = "herald_topics_advertised_total";
}

/// Outbound push failure.
#[derive(Debug, Error)]
pub enum PushError {
    /// The agent could not be reached.
    #[error("Agent unreachable at {address}: {reason}")]
    Unreachable { address: String, reason: String },

    /// The call did not complete in time.
    #[error("Push to {0} timed out")]
    Timeout(String),

    /// The agent answered with an error.
    #[error("Agent rejected push ({code}): {message}")]
    Rejected { code: i32, message: String },
}

/// Outbound calls into agents.
///
/// The broker only ever calls the three agent-side methods; how the call
/// travels is up to the implementation.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Push a newly advertised topic.
    async fn receive_topic(&self, address: &str, topic: &Topic) -> Result<(), PushError>;

    /// Push a published event.
    async fn receive_event(&self, address: &str, event: &Event) -> Result<(), PushError>;

    /// Push a batch of queued notifications.
    async fn receive_pending(
        &self,
        address: &str,
        items: &[Notification],
    ) -> Result<(), PushError>;
}

/// How many times a single event push is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub qos: Qos,
    pub retries: u32,
}

impl RetryPolicy {
    /// Build a policy for `requested` retries, clamped to `cap` when one is set.
    #[must_use]
    pub fn new(qos: Qos, requested: u32, cap: Option<u32>) -> Self {
        Self {
            qos,
            retries: cap.map_or(requested, |cap| requested.min(cap)),
        }
    }

    /// Total attempts: one for at-most-once, `1 + retries` otherwise.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        if self.qos.retries() {
            1 + self.retries
        } else {
            1
        }
    }
}

/// Where each recipient of a fan-out ended up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FanoutReport {
    /// Recipients that accepted the push.
    pub delivered: Vec<String>,
    /// Recipients that had the item queued.
    pub queued: Vec<String>,
}

impl FanoutReport {
    /// Total recipients.
    #[must_use]
    pub fn recipients(&self) -> usize {
        self.delivered.len() + self.queued.len()
    }
}

/// Result of a pending-notification check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingCheck {
    /// Nothing was queued.
    Empty,
    /// The queued items were pushed and removed.
    Delivered { count: usize },
    /// Items are queued but could not be pushed; they stay queued.
    Deferred { count: usize },
}

impl PendingCheck {
    /// Message returned to the caller.
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            PendingCheck::Empty => "You don't have any pending notifications.",
            PendingCheck::Delivered { .. } | PendingCheck::Deferred { .. } => {
                "You have pending notifications."
            }
        }
    }
}

/// Push-or-queue fan-out over the broker's collections.
pub struct DeliveryEngine {
    state: Arc<BrokerState>,
    notifier: Arc<dyn Notifier>,
    max_retries: Option<u32>,
}

impl DeliveryEngine {
    /// Create an engine. Requested retry counts are honored as given unless
    /// `max_retries` caps them.
    #[must_use]
    pub fn new(
        state: Arc<BrokerState>,
        notifier: Arc<dyn Notifier>,
        max_retries: Option<u32>,
    ) -> Self {
        Self {
            state,
            notifier,
            max_retries,
        }
    }

    /// Publish `event` to every subscriber of its topic.
    ///
    /// The event is stamped with a fresh id and its topic replaced by the
    /// catalog's current record before delivery.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::TopicNotFound`] if the event's topic has not
    /// been advertised. Nothing is delivered or queued in that case.
    pub async fn publish_event(
        &self,
        event: Event,
        qos: Qos,
        retry_count: u32,
    ) -> Result<FanoutReport, BrokerError> {
        let mut event = event.with_id(self.state.event_ids.next_id());
        self.state.audit.record(event.clone());

        let topic = self
            .state
            .catalog
            .get(&event.topic.name)
            .ok_or_else(|| BrokerError::TopicNotFound(event.topic.name.clone()))?;
        event.topic = topic;

        let policy = RetryPolicy::new(qos, retry_count, self.max_retries);
        let mut report = FanoutReport::default();
        let mut online = Vec::new();

        for subscriber in self.state.subscriptions.recipients(&event.topic.name) {
            match self
                .state
                .presence
                .lookup(&subscriber, ParticipantKind::Subscriber)
            {
                Presence::Online(address) => online.push((subscriber, address)),
                Presence::Offline => {
                    self.enqueue(&subscriber, event.clone().into());
                    report.queued.push(subscriber);
                }
            }
        }

        let event_ref = &event;
        let results = join_all(online.into_iter().map(|(subscriber, address)| async move {
            let delivered = self
                .push_event(&subscriber, &address, event_ref, policy)
                .await;
            (subscriber, delivered)
        }))
        .await;

        for (subscriber, delivered) in results {
            if delivered {
                report.delivered.push(subscriber);
            } else {
                self.enqueue(&subscriber, event.clone().into());
                report.queued.push(subscriber);
            }
        }

        counter!(metric_names::EVENTS_PUBLISHED).increment(1);
        info!(
            event = %event.id,
            topic = %event.topic.name,
            qos = u8::from(qos),
            attempts = policy.attempts(),
            recipients = report.recipients(),
            delivered = report.delivered.len(),
            queued = report.queued.len(),
            "Event published"
        );

        Ok(report)
    }

    /// Upsert `topic` and broadcast it to every known participant.
    ///
    /// Returns the stamped topic and the fan-out report. Each participant id
    /// gets one push attempt; failures are queued.
    pub async fn advertise_topic(&self, topic: Topic) -> (Topic, FanoutReport) {
        let topic = topic.with_id(self.state.topic_ids.next_id());
        self.state.catalog.advertise(topic.clone());

        let targets: BTreeSet<String> = self
            .state
            .presence
            .ids(ParticipantKind::Publisher)
            .into_iter()
            .chain(self.state.presence.ids(ParticipantKind::Subscriber))
            .collect();

        let mut report = FanoutReport::default();
        let mut online = Vec::new();

        for id in targets {
            match self.state.presence.resolve_any(&id) {
                Some(address) => online.push((id, address)),
                None => {
                    self.enqueue(&id, topic.clone().into());
                    report.queued.push(id);
                }
            }
        }

        let topic_ref = &topic;
        let results = join_all(online.into_iter().map(|(id, address)| async move {
            counter!(metric_names::PUSH_ATTEMPTS, "method" => "receiveTopic").increment(1);
            let result = self.notifier.receive_topic(&address, topic_ref).await;
            (id, address, result)
        }))
        .await;

        for (id, address, result) in results {
            match result {
                Ok(()) => report.delivered.push(id),
                Err(e) => {
                    counter!(metric_names::PUSH_FAILURES, "method" => "receiveTopic").increment(1);
                    warn!(participant = %id, %address, error = %e, "Topic push failed, queueing");
                    self.enqueue(&id, topic.clone().into());
                    report.queued.push(id);
                }
            }
        }

        counter!(metric_names::TOPICS_ADVERTISED).increment(1);
        info!(
            topic = %topic.name,
            id = %topic.id,
            recipients = report.recipients(),
            delivered = report.delivered.len(),
            queued = report.queued.len(),
            "Topic advertised"
        );

        (topic, report)
    }

    /// Push everything queued for `id` to its current address.
    ///
    /// Only the pushed items are removed, and only after the push succeeds.
    /// Items stay queued when no address is online or the push fails.
    pub async fn check_pending_notifications(&self, id: &str) -> PendingCheck {
        let items = self.state.pending.snapshot(id);
        if items.is_empty() {
            return PendingCheck::Empty;
        }
        let count = items.len();

        let Some(address) = self.state.presence.resolve_any(id) else {
            debug!(participant = %id, count, "No online address, pending kept");
            return PendingCheck::Deferred { count };
        };

        counter!(metric_names::PUSH_ATTEMPTS, "method" => "receivePendingNotifications")
            .increment(1);
        match self.notifier.receive_pending(&address, &items).await {
            Ok(()) => {
                let removed = self.state.pending.acknowledge(id, &items);
                counter!(metric_names::PENDING_DELIVERED).increment(removed as u64);
                info!(participant = %id, %address, count = removed, "Pending notifications delivered");
                PendingCheck::Delivered { count: removed }
            }
            Err(e) => {
                counter!(metric_names::PUSH_FAILURES, "method" => "receivePendingNotifications")
                    .increment(1);
                warn!(participant = %id, %address, error = %e, "Pending push failed, kept queued");
                PendingCheck::Deferred { count }
            }
        }
    }

    async fn push_event(
        &self,
        subscriber: &str,
        address: &str,
        event: &Event,
        policy: RetryPolicy,
    ) -> bool {
        let attempts = policy.attempts();
        for attempt in 1..=attempts {
            counter!(metric_names::PUSH_ATTEMPTS, "method" => "receiveEvent").increment(1);
            match self.notifier.receive_event(address, event).await {
                Ok(()) => {
                    debug!(%subscriber, %address, attempt, "Event delivered");
                    return true;
                }
                Err(e) => {
                    counter!(metric_names::PUSH_FAILURES, "method" => "receiveEvent").increment(1);
                    warn!(%subscriber, %address, attempt, attempts, error = %e, "Event push failed");
                }
            }
        }
        false
    }

    fn enqueue(&self, recipient: &str, item: Notification) {
        counter!(metric_names::PENDING_ENQUEUED, "kind" => item.kind()).increment(1);
        self.state.pending.enqueue(recipient, item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::BrokerConfig;
    use crate::testing::RecordingNotifier;

    fn engine(notifier: Arc<RecordingNotifier>) -> (Arc<BrokerState>, DeliveryEngine) {
        let state = Arc::new(BrokerState::new(&BrokerConfig::default()));
        let engine = DeliveryEngine::new(state.clone(), notifier, None);
        (state, engine)
    }

    fn sports() -> Topic {
        Topic::new("sports", ["ball", "score"])
    }

    fn goal() -> Event {
        Event::new(sports(), "goal", "score!")
    }

    #[test]
    fn test_retry_policy() {
        assert_eq!(RetryPolicy::new(Qos::AtMostOnce, 5, None).attempts(), 1);
        assert_eq!(RetryPolicy::new(Qos::AtLeastOnce, 3, None).attempts(), 4);
        assert_eq!(RetryPolicy::new(Qos::ExactlyOnce, 3, None).attempts(), 4);
        assert_eq!(RetryPolicy::new(Qos::AtLeastOnce, 50, None).attempts(), 51);
        assert_eq!(RetryPolicy::new(Qos::AtLeastOnce, 50, Some(10)).attempts(), 11);
        assert_eq!(RetryPolicy::new(Qos::AtLeastOnce, 3, Some(10)).attempts(), 4);
    }

    #[tokio::test]
    async fn test_default_config_honors_large_retry_count() {
        let notifier = Arc::new(RecordingNotifier::new());
        notifier.fail_address("dead");
        let config = BrokerConfig::default();
        let state = Arc::new(BrokerState::new(&config));
        let engine = DeliveryEngine::new(state.clone(), notifier.clone(), config.max_retries);
        state.catalog.advertise(sports());
        state
            .presence
            .login_or_refresh("s1", ParticipantKind::Subscriber, "dead");
        state.subscriptions.subscribe("sports", "s1");

        let report = engine.publish_event(goal(), Qos::AtLeastOnce, 20).await.unwrap();

        assert_eq!(notifier.calls().len(), 21);
        assert_eq!(report.queued, vec!["s1"]);
        assert_eq!(state.pending.len("s1"), 1);
    }

    #[tokio::test]
    async fn test_configured_cap_bounds_attempts() {
        let notifier = Arc::new(RecordingNotifier::new());
        notifier.fail_address("dead");
        let state = Arc::new(BrokerState::new(&BrokerConfig::default()));
        let engine = DeliveryEngine::new(state.clone(), notifier.clone(), Some(2));
        state.catalog.advertise(sports());
        state
            .presence
            .login_or_refresh("s1", ParticipantKind::Subscriber, "dead");
        state.subscriptions.subscribe("sports", "s1");

        engine.publish_event(goal(), Qos::AtLeastOnce, 20).await.unwrap();

        assert_eq!(notifier.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_publish_unknown_topic() {
        let notifier = Arc::new(RecordingNotifier::new());
        let (state, engine) = engine(notifier.clone());

        let err = engine
            .publish_event(goal(), Qos::AtMostOnce, 0)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Topic doesn't exist yet.");
        assert_eq!(state.pending.total(), 0);
        assert!(notifier.calls().is_empty());
    }

    #[tokio::test]
    async fn test_publish_online_delivers() {
        let notifier = Arc::new(RecordingNotifier::new());
        let (state, engine) = engine(notifier.clone());
        state.catalog.advertise(sports().with_id("t0"));
        state
            .presence
            .login_or_refresh("s1", ParticipantKind::Subscriber, "10.0.0.2");
        state.subscriptions.subscribe("sports", "s1");

        let report = engine.publish_event(goal(), Qos::AtMostOnce, 0).await.unwrap();

        assert_eq!(report.delivered, vec!["s1"]);
        let calls = notifier.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, "receiveEvent");
        assert_eq!(calls[0].address, "10.0.0.2");
        assert_eq!(calls[0].label, "goal");
    }

    #[tokio::test]
    async fn test_publish_stamps_id_and_catalog_topic() {
        let notifier = Arc::new(RecordingNotifier::new());
        let (state, engine) = engine(notifier.clone());
        state.catalog.advertise(sports().with_id("t7"));
        state.subscriptions.subscribe("sports", "s1");

        engine
            .publish_event(Event::new(Topic::new("sports", ["stale"]), "goal", ""), Qos::AtMostOnce, 0)
            .await
            .unwrap();
        engine.publish_event(goal(), Qos::AtMostOnce, 0).await.unwrap();

        let queued = state.pending.snapshot("s1");
        let Notification::Event(first) = &queued[0] else {
            panic!("expected an event");
        };
        let Notification::Event(second) = &queued[1] else {
            panic!("expected an event");
        };
        assert_eq!(first.topic.id, "t7");
        assert_eq!(first.topic.keywords, vec!["ball", "score"]);
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_publish_offline_queues_without_push() {
        let notifier = Arc::new(RecordingNotifier::new());
        let (state, engine) = engine(notifier.clone());
        state.catalog.advertise(sports());
        state.presence.logoff("s1", ParticipantKind::Subscriber);
        state.subscriptions.subscribe("sports", "s1");

        let report = engine.publish_event(goal(), Qos::AtLeastOnce, 3).await.unwrap();

        assert_eq!(report.queued, vec!["s1"]);
        assert!(notifier.calls().is_empty());
        assert!(state.pending.has_pending("s1"));
    }

    #[tokio::test]
    async fn test_qos_zero_single_attempt() {
        let notifier = Arc::new(RecordingNotifier::new());
        notifier.fail_address("dead");
        let (state, engine) = engine(notifier.clone());
        state.catalog.advertise(sports());
        state
            .presence
            .login_or_refresh("s1", ParticipantKind::Subscriber, "dead");
        state.subscriptions.subscribe("sports", "s1");

        let report = engine.publish_event(goal(), Qos::AtMostOnce, 5).await.unwrap();

        assert_eq!(notifier.calls().len(), 1);
        assert_eq!(report.queued, vec!["s1"]);
        assert_eq!(state.pending.len("s1"), 1);
    }

    #[tokio::test]
    async fn test_qos_one_and_two_retry() {
        for qos in [Qos::AtLeastOnce, Qos::ExactlyOnce] {
            let notifier = Arc::new(RecordingNotifier::new());
            notifier.fail_address("dead");
            let (state, engine) = engine(notifier.clone());
            state.catalog.advertise(sports());
            state
                .presence
                .login_or_refresh("s1", ParticipantKind::Subscriber, "dead");
            state.subscriptions.subscribe("sports", "s1");

            engine.publish_event(goal(), qos, 3).await.unwrap();

            assert_eq!(notifier.calls().len(), 4);
            assert_eq!(state.pending.len("s1"), 1);
        }
    }

    #[tokio::test]
    async fn test_retry_stops_at_first_success() {
        let notifier = Arc::new(RecordingNotifier::new());
        notifier.fail_times("flaky", 2);
        let (state, engine) = engine(notifier.clone());
        state.catalog.advertise(sports());
        state
            .presence
            .login_or_refresh("s1", ParticipantKind::Subscriber, "flaky");
        state.subscriptions.subscribe("sports", "s1");

        let report = engine.publish_event(goal(), Qos::AtLeastOnce, 5).await.unwrap();

        assert_eq!(report.delivered, vec!["s1"]);
        assert_eq!(notifier.calls().len(), 3);
        assert!(!state.pending.has_pending("s1"));
    }

    #[tokio::test]
    async fn test_duplicate_subscription_pushed_once() {
        let notifier = Arc::new(RecordingNotifier::new());
        let (state, engine) = engine(notifier.clone());
        state.catalog.advertise(sports());
        state
            .presence
            .login_or_refresh("s1", ParticipantKind::Subscriber, "a");
        state.subscriptions.subscribe("sports", "s1");
        state.subscriptions.subscribe("sports", "s1");

        engine.publish_event(goal(), Qos::AtMostOnce, 0).await.unwrap();
        assert_eq!(notifier.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_advertise_reaches_every_participant_once() {
        let notifier = Arc::new(RecordingNotifier::new());
        let (state, engine) = engine(notifier.clone());
        state
            .presence
            .login_or_refresh("p1", ParticipantKind::Publisher, "10.0.0.1");
        state
            .presence
            .login_or_refresh("p1", ParticipantKind::Subscriber, "10.0.0.5");
        state
            .presence
            .login_or_refresh("s1", ParticipantKind::Subscriber, "10.0.0.2");
        state.presence.logoff("s2", ParticipantKind::Subscriber);

        let (topic, report) = engine.advertise_topic(sports()).await;

        assert_eq!(topic.id, "t0");
        assert!(state.catalog.contains("sports"));
        assert_eq!(report.delivered, vec!["p1", "s1"]);
        assert_eq!(report.queued, vec!["s2"]);
        assert_eq!(report.recipients(), 3);

        let addresses: Vec<_> = notifier.calls().into_iter().map(|c| c.address).collect();
        assert_eq!(addresses.len(), 2);
        assert!(addresses.contains(&"10.0.0.1".to_string()));
        assert!(addresses.contains(&"10.0.0.2".to_string()));
    }

    #[tokio::test]
    async fn test_advertise_push_failure_queues() {
        let notifier = Arc::new(RecordingNotifier::new());
        notifier.fail_address("dead");
        let (state, engine) = engine(notifier.clone());
        state
            .presence
            .login_or_refresh("s1", ParticipantKind::Subscriber, "dead");

        let (_, report) = engine.advertise_topic(sports()).await;

        assert_eq!(report.queued, vec!["s1"]);
        assert_eq!(notifier.calls().len(), 1);
        assert!(matches!(
            state.pending.snapshot("s1")[0],
            Notification::Topic(_)
        ));
    }

    #[tokio::test]
    async fn test_pending_check_flow() {
        let notifier = Arc::new(RecordingNotifier::new());
        let (state, engine) = engine(notifier.clone());
        state.catalog.advertise(sports());
        state.presence.logoff("s1", ParticipantKind::Subscriber);
        state.subscriptions.subscribe("sports", "s1");

        assert_eq!(
            engine.check_pending_notifications("s1").await,
            PendingCheck::Empty
        );

        engine.publish_event(goal(), Qos::AtMostOnce, 0).await.unwrap();
        assert_eq!(
            engine.check_pending_notifications("s1").await,
            PendingCheck::Deferred { count: 1 }
        );
        assert!(notifier.calls().is_empty());

        state
            .presence
            .login_or_refresh("s1", ParticipantKind::Subscriber, "10.0.0.2");
        let check = engine.check_pending_notifications("s1").await;
        assert_eq!(check, PendingCheck::Delivered { count: 1 });
        assert_eq!(check.message(), "You have pending notifications.");
        assert!(!state.pending.has_pending("s1"));

        let calls = notifier.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, "receivePendingNotifications");
        assert_eq!(calls[0].label, "goal");
    }

    #[tokio::test]
    async fn test_pending_push_failure_keeps_queue() {
        let notifier = Arc::new(RecordingNotifier::new());
        notifier.fail_address("dead");
        let (state, engine) = engine(notifier.clone());
        state.pending.enqueue("s1", sports().into());
        state
            .presence
            .login_or_refresh("s1", ParticipantKind::Subscriber, "dead");

        assert_eq!(
            engine.check_pending_notifications("s1").await,
            PendingCheck::Deferred { count: 1 }
        );
        assert_eq!(state.pending.len("s1"), 1);
        assert_eq!(notifier.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_pending_prefers_publisher_address() {
        let notifier = Arc::new(RecordingNotifier::new());
        let (state, engine) = engine(notifier.clone());
        state.pending.enqueue("m", sports().into());
        state
            .presence
            .login_or_refresh("m", ParticipantKind::Subscriber, "sub");
        state
            .presence
            .login_or_refresh("m", ParticipantKind::Publisher, "pub");

        engine.check_pending_notifications("m").await;
        assert_eq!(notifier.calls()[0].address, "pub");
    }

    /// Holds every pending push until released.
    #[derive(Default)]
    struct GatedNotifier {
        entered: tokio::sync::Notify,
        release: tokio::sync::Notify,
        batches: parking_lot::Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl Notifier for GatedNotifier {
        async fn receive_topic(&self, _: &str, _: &Topic) -> Result<(), PushError> {
            Ok(())
        }

        async fn receive_event(&self, _: &str, _: &Event) -> Result<(), PushError> {
            Ok(())
        }

        async fn receive_pending(&self, _: &str, items: &[Notification]) -> Result<(), PushError> {
            self.entered.notify_one();
            self.release.notified().await;
            self.batches.lock().push(items.len());
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_enqueue_during_pending_push_is_kept() {
        let notifier = Arc::new(GatedNotifier::default());
        let state = Arc::new(BrokerState::new(&BrokerConfig::default()));
        let engine = Arc::new(DeliveryEngine::new(state.clone(), notifier.clone(), None));
        state
            .presence
            .login_or_refresh("s1", ParticipantKind::Subscriber, "10.0.0.2");
        state.pending.enqueue("s1", sports().into());
        state.pending.enqueue("s1", goal().with_id("e0").into());

        let check = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.check_pending_notifications("s1").await })
        };
        notifier.entered.notified().await;

        let writers: Vec<_> = (0..4)
            .map(|i| {
                let state = state.clone();
                tokio::spawn(async move {
                    for n in 0..25 {
                        let event = goal().with_id(format!("late{i}-{n}"));
                        state.pending.enqueue("s1", event.into());
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap();
        }
        notifier.release.notify_one();

        assert_eq!(check.await.unwrap(), PendingCheck::Delivered { count: 2 });
        assert_eq!(*notifier.batches.lock(), vec![2]);
        assert_eq!(state.pending.len("s1"), 100);

        notifier.release.notify_one();
        assert_eq!(
            engine.check_pending_notifications("s1").await,
            PendingCheck::Delivered { count: 100 }
        );
        assert!(!state.pending.has_pending("s1"));
    }
}
