//! The broker: shared state plus the operations agents invoke.

use crate::audit::AuditLog;
use crate::catalog::TopicCatalog;
use crate::delivery::{DeliveryEngine, FanoutReport, Notifier, PendingCheck};
use crate::ids::IdGenerator;
use crate::pending::PendingQueue;
use crate::presence::{Login, ParticipantKind, PresenceRegistry};
use crate::subscriptions::SubscriptionIndex;
use herald_protocol::{Event, Notification, Qos, Topic};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Domain errors.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The topic has never been advertised.
    #[error("Topic doesn't exist yet.")]
    TopicNotFound(String),
}

/// Broker configuration.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Optional upper bound on publisher-requested retries. Unset honors
    /// the requested count.
    pub max_retries: Option<u32>,
    /// Number of published events retained for inspection.
    pub audit_capacity: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            max_retries: None,
            audit_capacity: 10_000,
        }
    }
}

/// Collections owned by one broker, each internally synchronized.
#[derive(Debug)]
pub struct BrokerState {
    pub presence: PresenceRegistry,
    pub catalog: TopicCatalog,
    pub subscriptions: SubscriptionIndex,
    pub pending: PendingQueue,
    pub audit: AuditLog,
    pub(crate) topic_ids: IdGenerator,
    pub(crate) event_ids: IdGenerator,
}

impl BrokerState {
    /// Create empty state.
    #[must_use]
    pub fn new(config: &BrokerConfig) -> Self {
        Self {
            presence: PresenceRegistry::new(),
            catalog: TopicCatalog::new(),
            subscriptions: SubscriptionIndex::new(),
            pending: PendingQueue::new(),
            audit: AuditLog::with_capacity(config.audit_capacity),
            topic_ids: IdGenerator::new("t"),
            event_ids: IdGenerator::new("e"),
        }
    }
}

/// Broker statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BrokerStats {
    pub publishers: usize,
    pub publishers_online: usize,
    pub subscribers: usize,
    pub subscribers_online: usize,
    pub topics: usize,
    pub subscriptions: usize,
    pub pending: usize,
    pub audited_events: usize,
    pub topics_issued: u64,
    pub events_issued: u64,
}

/// Entry point for every broker operation.
///
/// Cheap to share behind an [`Arc`]; all mutation goes through the
/// internally locked collections in [`BrokerState`].
pub struct Broker {
    state: Arc<BrokerState>,
    engine: DeliveryEngine,
}

impl Broker {
    /// Create a broker that pushes through `notifier`.
    #[must_use]
    pub fn new(config: BrokerConfig, notifier: Arc<dyn Notifier>) -> Self {
        info!(?config, "Creating broker");
        let state = Arc::new(BrokerState::new(&config));
        let engine = DeliveryEngine::new(state.clone(), notifier, config.max_retries);
        Self { state, engine }
    }

    /// Shared state, for read-only inspection.
    #[must_use]
    pub fn state(&self) -> &Arc<BrokerState> {
        &self.state
    }

    /// Log a participant in at `address`.
    pub fn login(&self, id: &str, kind: ParticipantKind, address: &str) -> Login {
        self.state.presence.login_or_refresh(id, kind, address)
    }

    /// Log a participant off.
    pub fn logoff(&self, id: &str, kind: ParticipantKind) -> String {
        self.state.presence.logoff(id, kind);
        format!("{id} logged off.")
    }

    /// Publish an event to its topic's subscribers.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::TopicNotFound`] for an unknown topic.
    pub async fn publish_event(
        &self,
        event: Event,
        qos: Qos,
        retry_count: u32,
    ) -> Result<FanoutReport, BrokerError> {
        self.engine.publish_event(event, qos, retry_count).await
    }

    /// Advertise a topic to every known participant.
    pub async fn advertise_topic(&self, topic: Topic) -> (Topic, FanoutReport) {
        self.engine.advertise_topic(topic).await
    }

    /// Subscribe to a topic by name.
    pub fn subscribe(&self, topic: &str, subscriber: &str) -> String {
        self.state.subscriptions.subscribe(topic, subscriber);
        format!("{subscriber} successfully subscribed to {topic}")
    }

    /// Remove one subscription of `subscriber` to `topic`.
    pub fn unsubscribe(&self, topic: &str, subscriber: &str) -> String {
        self.state.subscriptions.unsubscribe(topic, subscriber);
        format!("{subscriber} successfully unsubscribed from {topic}")
    }

    /// Remove every subscription of `subscriber`.
    pub fn unsubscribe_all(&self, subscriber: &str) -> String {
        self.state.subscriptions.unsubscribe_all(subscriber);
        format!("{subscriber} successfully unsubscribed from all topics")
    }

    /// Look up a topic by name.
    #[must_use]
    pub fn topic(&self, name: &str) -> Option<Topic> {
        self.state.catalog.get(name)
    }

    /// Topics carrying `keyword`.
    #[must_use]
    pub fn topics_by_keyword(&self, keyword: &str) -> BTreeMap<String, Topic> {
        self.state.catalog.by_keyword(keyword)
    }

    /// Every topic.
    #[must_use]
    pub fn all_topics(&self) -> BTreeMap<String, Topic> {
        self.state.catalog.all()
    }

    /// Push queued notifications to `id` if it is reachable.
    pub async fn check_pending(&self, id: &str) -> PendingCheck {
        self.engine.check_pending_notifications(id).await
    }

    /// Remove and return everything queued for `id`.
    pub fn fetch_pending(&self, id: &str) -> Vec<Notification> {
        self.state.pending.drain(id)
    }

    /// Current counts.
    #[must_use]
    pub fn stats(&self) -> BrokerStats {
        let presence = &self.state.presence;
        BrokerStats {
            publishers: presence.count(ParticipantKind::Publisher),
            publishers_online: presence.online_count(ParticipantKind::Publisher),
            subscribers: presence.count(ParticipantKind::Subscriber),
            subscribers_online: presence.online_count(ParticipantKind::Subscriber),
            topics: self.state.catalog.len(),
            subscriptions: self.state.subscriptions.total(),
            pending: self.state.pending.total(),
            audited_events: self.state.audit.len(),
            topics_issued: self.state.topic_ids.issued(),
            events_issued: self.state.event_ids.issued(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presence::Presence;
    use crate::testing::RecordingNotifier;

    fn broker() -> (Broker, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::new());
        (
            Broker::new(BrokerConfig::default(), notifier.clone()),
            notifier,
        )
    }

    #[tokio::test]
    async fn test_end_to_end_online() {
        let (broker, notifier) = broker();
        broker.login("p1", ParticipantKind::Publisher, "10.0.0.1");
        broker.login("s1", ParticipantKind::Subscriber, "10.0.0.2");

        broker
            .advertise_topic(Topic::new("sports", ["ball", "score"]))
            .await;
        assert_eq!(
            broker.subscribe("sports", "s1"),
            "s1 successfully subscribed to sports"
        );

        let report = broker
            .publish_event(
                Event::new(Topic::new("sports", ["ball", "score"]), "goal", "score!"),
                Qos::AtMostOnce,
                0,
            )
            .await
            .unwrap();
        assert_eq!(report.delivered, vec!["s1"]);

        let event_calls: Vec<_> = notifier
            .calls()
            .into_iter()
            .filter(|c| c.method == "receiveEvent")
            .collect();
        assert_eq!(event_calls.len(), 1);
        assert_eq!(event_calls[0].address, "10.0.0.2");
        assert_eq!(event_calls[0].label, "goal");
    }

    #[tokio::test]
    async fn test_end_to_end_offline_then_pending() {
        let (broker, notifier) = broker();
        broker.login("s1", ParticipantKind::Subscriber, "10.0.0.2");
        broker.advertise_topic(Topic::new("sports", ["ball"])).await;
        broker.subscribe("sports", "s1");
        assert_eq!(broker.logoff("s1", ParticipantKind::Subscriber), "s1 logged off.");

        broker
            .publish_event(Event::new(Topic::new("sports", ["ball"]), "goal", "score!"), Qos::AtMostOnce, 0)
            .await
            .unwrap();
        assert_eq!(
            broker.check_pending("s1").await.message(),
            "You have pending notifications."
        );

        broker.login("s1", ParticipantKind::Subscriber, "10.0.0.2");
        assert_eq!(
            broker.check_pending("s1").await,
            PendingCheck::Delivered { count: 1 }
        );
        assert_eq!(
            broker.check_pending("s1").await.message(),
            "You don't have any pending notifications."
        );

        let pending_calls: Vec<_> = notifier
            .calls()
            .into_iter()
            .filter(|c| c.method == "receivePendingNotifications")
            .collect();
        assert_eq!(pending_calls.len(), 1);
        assert_eq!(pending_calls[0].label, "goal");
    }

    #[tokio::test]
    async fn test_fetch_pending_drains() {
        let (broker, _) = broker();
        broker.state().presence.logoff("s1", ParticipantKind::Subscriber);
        broker.advertise_topic(Topic::new("news", ["daily"])).await;

        let items = broker.fetch_pending("s1");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].label(), "news");
        assert!(broker.fetch_pending("s1").is_empty());
    }

    #[test]
    fn test_subscription_messages() {
        let (broker, _) = broker();
        broker.subscribe("T1", "S");
        broker.subscribe("T2", "S");
        assert_eq!(
            broker.unsubscribe("T1", "S"),
            "S successfully unsubscribed from T1"
        );
        assert_eq!(
            broker.unsubscribe_all("S"),
            "S successfully unsubscribed from all topics"
        );
        assert!(broker.state().subscriptions.topics_of("S").is_empty());
    }

    #[tokio::test]
    async fn test_stats() {
        let (broker, _) = broker();
        broker.login("p1", ParticipantKind::Publisher, "a");
        broker.login("s1", ParticipantKind::Subscriber, "b");
        broker.logoff("s2", ParticipantKind::Subscriber);
        broker.advertise_topic(Topic::new("sports", ["ball"])).await;
        broker.subscribe("sports", "s1");
        let _ = broker
            .publish_event(Event::new(Topic::new("missing", ["x"]), "t", "c"), Qos::AtMostOnce, 0)
            .await;

        let stats = broker.stats();
        assert_eq!(stats.publishers, 1);
        assert_eq!(stats.subscribers, 2);
        assert_eq!(stats.subscribers_online, 1);
        assert_eq!(stats.topics, 1);
        assert_eq!(stats.subscriptions, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.audited_events, 1);
        assert_eq!(stats.topics_issued, 1);
        assert_eq!(stats.events_issued, 1);
    }

    #[test]
    fn test_login_exclusivity_through_broker() {
        let (broker, _) = broker();
        broker.login("A", ParticipantKind::Subscriber, "X");
        broker.login("B", ParticipantKind::Subscriber, "X");
        assert_eq!(
            broker.state().presence.lookup("A", ParticipantKind::Subscriber),
            Presence::Offline
        );
    }
}
