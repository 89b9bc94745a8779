//! Typed client for the broker-side methods.

use herald_protocol::methods::{
    AdvertiseParams, KeywordParams, LoginParams, LogoffParams, MachineParams, PublishParams,
    SubscriberParams, SubscriptionParams, TopicNameParams, ADVERTISE_TOPIC,
    CHECK_FOR_PENDING_NOTIFICATIONS, FETCH_PENDING_NOTIFICATIONS, GET_ALL_TOPICS,
    GET_TOPIC_FROM_KEYWORD, GET_TOPIC_FROM_TOPIC_NAME, PUBLISHER_LOGIN, PUBLISHER_LOGOFF,
    PUBLISH_EVENT, SUBSCRIBER_LOGIN, SUBSCRIBER_LOGOFF, SUBSCRIBE_TOPIC, UNSUBSCRIBE_ALL,
    UNSUBSCRIBE_TOPIC,
};
use herald_protocol::{Event, Notification, Qos, Request, RpcError, Topic};
use herald_transport::{ClientConfig, HttpClient, RpcClient, TransportError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Agent-side errors.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The call did not reach the broker or no response came back.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The broker answered with an error.
    #[error("Broker error: {0}")]
    Rpc(#[from] RpcError),

    /// Parameters or result did not match the expected shape.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Calls the broker at a fixed address.
#[derive(Clone)]
pub struct BrokerClient {
    broker: String,
    client: Arc<dyn RpcClient>,
    next_id: Arc<AtomicU64>,
}

impl BrokerClient {
    /// Client for the broker at `broker` (`host:port`) with default timeouts.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(broker: impl Into<String>) -> Result<Self, AgentError> {
        let client = HttpClient::new(ClientConfig::default())?;
        Ok(Self::with_client(broker, Arc::new(client)))
    }

    /// Client using a custom [`RpcClient`].
    #[must_use]
    pub fn with_client(broker: impl Into<String>, client: Arc<dyn RpcClient>) -> Self {
        Self {
            broker: broker.into(),
            client,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// The broker's address.
    #[must_use]
    pub fn broker(&self) -> &str {
        &self.broker
    }

    /// Make a raw call.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the broker answers with an
    /// error.
    pub async fn call<P, R>(&self, method: &str, params: &P) -> Result<R, AgentError>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = Request::new(method, id).with_params(params)?;
        debug!(broker = %self.broker, %method, id, "Calling broker");
        let value = self.client.call(&self.broker, &request).await?.into_result()?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn publisher_login(&self, id: &str, address: &str) -> Result<String, AgentError> {
        self.call(PUBLISHER_LOGIN, &login(id, address)).await
    }

    pub async fn subscriber_login(&self, id: &str, address: &str) -> Result<String, AgentError> {
        self.call(SUBSCRIBER_LOGIN, &login(id, address)).await
    }

    pub async fn publisher_logoff(&self, id: &str) -> Result<String, AgentError> {
        self.call(PUBLISHER_LOGOFF, &LogoffParams { id: id.to_string() })
            .await
    }

    pub async fn subscriber_logoff(&self, id: &str) -> Result<String, AgentError> {
        self.call(SUBSCRIBER_LOGOFF, &LogoffParams { id: id.to_string() })
            .await
    }

    /// Publish an event. The broker answers with a success message or
    /// "Topic doesn't exist yet.".
    pub async fn publish_event(
        &self,
        event: &Event,
        qos: Qos,
        retry_count: u32,
    ) -> Result<String, AgentError> {
        let params = PublishParams {
            event: event.clone(),
            qos,
            retry_count,
        };
        self.call(PUBLISH_EVENT, &params).await
    }

    pub async fn advertise_topic(&self, topic: &Topic) -> Result<String, AgentError> {
        let params = AdvertiseParams {
            topic: topic.clone(),
        };
        self.call(ADVERTISE_TOPIC, &params).await
    }

    pub async fn subscribe(&self, topic: &str, subscriber_id: &str) -> Result<String, AgentError> {
        self.call(SUBSCRIBE_TOPIC, &subscription(topic, subscriber_id))
            .await
    }

    pub async fn unsubscribe(
        &self,
        topic: &str,
        subscriber_id: &str,
    ) -> Result<String, AgentError> {
        self.call(UNSUBSCRIBE_TOPIC, &subscription(topic, subscriber_id))
            .await
    }

    pub async fn unsubscribe_all(&self, subscriber_id: &str) -> Result<String, AgentError> {
        let params = SubscriberParams {
            subscriber_id: subscriber_id.to_string(),
        };
        self.call(UNSUBSCRIBE_ALL, &params).await
    }

    /// Look up a topic by name.
    pub async fn topic(&self, name: &str) -> Result<Option<Topic>, AgentError> {
        let params = TopicNameParams {
            topic_name: name.to_string(),
        };
        self.call(GET_TOPIC_FROM_TOPIC_NAME, &params).await
    }

    pub async fn topics_by_keyword(
        &self,
        keyword: &str,
    ) -> Result<BTreeMap<String, Topic>, AgentError> {
        let params = KeywordParams {
            keyword: keyword.to_string(),
        };
        self.call(GET_TOPIC_FROM_KEYWORD, &params).await
    }

    pub async fn all_topics(&self) -> Result<BTreeMap<String, Topic>, AgentError> {
        self.call(GET_ALL_TOPICS, &Value::Object(Default::default()))
            .await
    }

    /// Ask the broker to push anything queued for `machine_id`.
    pub async fn check_pending(&self, machine_id: &str) -> Result<String, AgentError> {
        self.call(CHECK_FOR_PENDING_NOTIFICATIONS, &machine(machine_id))
            .await
    }

    /// Drain anything queued for `machine_id` into the response.
    pub async fn fetch_pending(&self, machine_id: &str) -> Result<Vec<Notification>, AgentError> {
        self.call(FETCH_PENDING_NOTIFICATIONS, &machine(machine_id))
            .await
    }
}

fn login(id: &str, address: &str) -> LoginParams {
    LoginParams {
        id: id.to_string(),
        address: address.to_string(),
    }
}

fn subscription(topic: &str, subscriber_id: &str) -> SubscriptionParams {
    SubscriptionParams {
        topic: topic.into(),
        subscriber_id: subscriber_id.to_string(),
    }
}

fn machine(machine_id: &str) -> MachineParams {
    MachineParams {
        machine_id: machine_id.to_string(),
    }
}
