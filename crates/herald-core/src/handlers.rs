//! Handlers for the broker-side methods.
//!
//! Each handler decodes its typed parameters, calls into the [`Broker`] and
//! turns the outcome into a JSON result. Domain failures such as an unknown
//! topic are reported as plain result messages, not RPC errors.

use crate::broker::{Broker, BrokerError};
use crate::presence::ParticipantKind;
use crate::router::MethodHandler;
use async_trait::async_trait;
use herald_protocol::methods::{
    AdvertiseParams, KeywordParams, LoginParams, LogoffParams, MachineParams, PublishParams,
    SubscriberParams, SubscriptionParams, TopicNameParams, ADVERTISE_TOPIC,
    CHECK_FOR_PENDING_NOTIFICATIONS, FETCH_PENDING_NOTIFICATIONS, GET_ALL_TOPICS,
    GET_TOPIC_FROM_KEYWORD, GET_TOPIC_FROM_TOPIC_NAME, PUBLISHER_LOGIN, PUBLISHER_LOGOFF,
    PUBLISH_EVENT, SUBSCRIBER_LOGIN, SUBSCRIBER_LOGOFF, SUBSCRIBE_TOPIC, UNSUBSCRIBE_ALL,
    UNSUBSCRIBE_TOPIC,
};
use herald_protocol::{Request, RpcError};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Publish success message.
pub const PUBLISHED: &str = "Event successfully published to all subscribers";
/// Advertise success message.
pub const ADVERTISED: &str = "Topic successfully advertised to all clients.";

fn to_value<T: Serialize>(value: &T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|e| RpcError::internal(e.to_string()))
}

fn unreachable_method(request: &Request) -> RpcError {
    RpcError::method_not_found(&request.method)
}

/// `publisherLogin`, `subscriberLogin`, `publisherLogoff`, `subscriberLogoff`.
pub struct LoginHandler {
    broker: Arc<Broker>,
}

impl LoginHandler {
    #[must_use]
    pub fn new(broker: Arc<Broker>) -> Self {
        Self { broker }
    }
}

#[async_trait]
impl MethodHandler for LoginHandler {
    fn methods(&self) -> &'static [&'static str] {
        &[
            PUBLISHER_LOGIN,
            SUBSCRIBER_LOGIN,
            PUBLISHER_LOGOFF,
            SUBSCRIBER_LOGOFF,
        ]
    }

    async fn handle(&self, request: &Request) -> Result<Value, RpcError> {
        let (kind, login) = match request.method.as_str() {
            PUBLISHER_LOGIN => (ParticipantKind::Publisher, true),
            SUBSCRIBER_LOGIN => (ParticipantKind::Subscriber, true),
            PUBLISHER_LOGOFF => (ParticipantKind::Publisher, false),
            SUBSCRIBER_LOGOFF => (ParticipantKind::Subscriber, false),
            _ => return Err(unreachable_method(request)),
        };

        if login {
            let params: LoginParams = request.params()?;
            let outcome = self.broker.login(&params.id, kind, &params.address);
            Ok(Value::from(outcome.message(&params.id)))
        } else {
            let params: LogoffParams = request.params()?;
            Ok(Value::from(self.broker.logoff(&params.id, kind)))
        }
    }
}

/// `publishEvent`.
pub struct PublishHandler {
    broker: Arc<Broker>,
}

impl PublishHandler {
    #[must_use]
    pub fn new(broker: Arc<Broker>) -> Self {
        Self { broker }
    }
}

#[async_trait]
impl MethodHandler for PublishHandler {
    fn methods(&self) -> &'static [&'static str] {
        &[PUBLISH_EVENT]
    }

    async fn handle(&self, request: &Request) -> Result<Value, RpcError> {
        let params: PublishParams = request.params()?;
        match self
            .broker
            .publish_event(params.event, params.qos, params.retry_count)
            .await
        {
            Ok(_) => Ok(Value::from(PUBLISHED)),
            Err(e @ BrokerError::TopicNotFound(_)) => Ok(Value::from(e.to_string())),
        }
    }
}

/// `advertiseTopic`.
pub struct AdvertiseHandler {
    broker: Arc<Broker>,
}

impl AdvertiseHandler {
    #[must_use]
    pub fn new(broker: Arc<Broker>) -> Self {
        Self { broker }
    }
}

#[async_trait]
impl MethodHandler for AdvertiseHandler {
    fn methods(&self) -> &'static [&'static str] {
        &[ADVERTISE_TOPIC]
    }

    async fn handle(&self, request: &Request) -> Result<Value, RpcError> {
        let params: AdvertiseParams = request.params()?;
        self.broker.advertise_topic(params.topic).await;
        Ok(Value::from(ADVERTISED))
    }
}

/// `subscribeTopic`, `unsubscribeTopic`, `unsubscribeAll`.
pub struct SubscriptionHandler {
    broker: Arc<Broker>,
}

impl SubscriptionHandler {
    #[must_use]
    pub fn new(broker: Arc<Broker>) -> Self {
        Self { broker }
    }
}

#[async_trait]
impl MethodHandler for SubscriptionHandler {
    fn methods(&self) -> &'static [&'static str] {
        &[SUBSCRIBE_TOPIC, UNSUBSCRIBE_TOPIC, UNSUBSCRIBE_ALL]
    }

    async fn handle(&self, request: &Request) -> Result<Value, RpcError> {
        let message = match request.method.as_str() {
            SUBSCRIBE_TOPIC => {
                let params: SubscriptionParams = request.params()?;
                self.broker
                    .subscribe(params.topic.name(), &params.subscriber_id)
            }
            UNSUBSCRIBE_TOPIC => {
                let params: SubscriptionParams = request.params()?;
                self.broker
                    .unsubscribe(params.topic.name(), &params.subscriber_id)
            }
            UNSUBSCRIBE_ALL => {
                let params: SubscriberParams = request.params()?;
                self.broker.unsubscribe_all(&params.subscriber_id)
            }
            _ => return Err(unreachable_method(request)),
        };
        Ok(Value::from(message))
    }
}

/// `getTopicFromTopicName`, `getTopicFromKeyword`, `getAllTopics`.
pub struct TopicQueryHandler {
    broker: Arc<Broker>,
}

impl TopicQueryHandler {
    #[must_use]
    pub fn new(broker: Arc<Broker>) -> Self {
        Self { broker }
    }
}

#[async_trait]
impl MethodHandler for TopicQueryHandler {
    fn methods(&self) -> &'static [&'static str] {
        &[
            GET_TOPIC_FROM_TOPIC_NAME,
            GET_TOPIC_FROM_KEYWORD,
            GET_ALL_TOPICS,
        ]
    }

    async fn handle(&self, request: &Request) -> Result<Value, RpcError> {
        match request.method.as_str() {
            GET_TOPIC_FROM_TOPIC_NAME => {
                let params: TopicNameParams = request.params()?;
                to_value(&self.broker.topic(&params.topic_name))
            }
            GET_TOPIC_FROM_KEYWORD => {
                let params: KeywordParams = request.params()?;
                to_value(&self.broker.topics_by_keyword(&params.keyword))
            }
            GET_ALL_TOPICS => to_value(&self.broker.all_topics()),
            _ => Err(unreachable_method(request)),
        }
    }
}

/// `checkForPendingNotifications`, `fetchPendingNotifications`.
pub struct PendingHandler {
    broker: Arc<Broker>,
}

impl PendingHandler {
    #[must_use]
    pub fn new(broker: Arc<Broker>) -> Self {
        Self { broker }
    }
}

#[async_trait]
impl MethodHandler for PendingHandler {
    fn methods(&self) -> &'static [&'static str] {
        &[CHECK_FOR_PENDING_NOTIFICATIONS, FETCH_PENDING_NOTIFICATIONS]
    }

    async fn handle(&self, request: &Request) -> Result<Value, RpcError> {
        let params: MachineParams = request.params()?;
        match request.method.as_str() {
            CHECK_FOR_PENDING_NOTIFICATIONS => {
                let check = self.broker.check_pending(&params.machine_id).await;
                Ok(Value::from(check.message()))
            }
            FETCH_PENDING_NOTIFICATIONS => {
                to_value(&self.broker.fetch_pending(&params.machine_id))
            }
            _ => Err(unreachable_method(request)),
        }
    }
}
