//! Method names and their typed parameters.
//!
//! Field aliases accept the parameter spelling used by older agents
//! (`publisherID`, `ipAddress`, `retrails`, ...).

use crate::model::{Event, Notification, Qos, Topic};
use serde::{Deserialize, Serialize};

pub const PUBLISHER_LOGIN: &str = "publisherLogin";
pub const SUBSCRIBER_LOGIN: &str = "subscriberLogin";
pub const PUBLISHER_LOGOFF: &str = "publisherLogoff";
pub const SUBSCRIBER_LOGOFF: &str = "subscriberLogoff";
pub const PUBLISH_EVENT: &str = "publishEvent";
pub const ADVERTISE_TOPIC: &str = "advertiseTopic";
pub const SUBSCRIBE_TOPIC: &str = "subscribeTopic";
pub const UNSUBSCRIBE_TOPIC: &str = "unsubscribeTopic";
pub const UNSUBSCRIBE_ALL: &str = "unsubscribeAll";
pub const GET_TOPIC_FROM_TOPIC_NAME: &str = "getTopicFromTopicName";
pub const GET_TOPIC_FROM_KEYWORD: &str = "getTopicFromKeyword";
pub const GET_ALL_TOPICS: &str = "getAllTopics";
pub const CHECK_FOR_PENDING_NOTIFICATIONS: &str = "checkForPendingNotifications";
pub const FETCH_PENDING_NOTIFICATIONS: &str = "fetchPendingNotifications";

// Served by agents, called by the broker.
pub const RECEIVE_TOPIC: &str = "receiveTopic";
pub const RECEIVE_EVENT: &str = "receiveEvent";
pub const RECEIVE_PENDING_NOTIFICATIONS: &str = "receivePendingNotifications";

/// `publisherLogin` / `subscriberLogin`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginParams {
    #[serde(alias = "publisherID", alias = "subscriberID")]
    pub id: String,
    #[serde(alias = "ipAddress")]
    pub address: String,
}

/// `publisherLogoff` / `subscriberLogoff`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoffParams {
    #[serde(alias = "publisherID", alias = "subscriberID")]
    pub id: String,
}

/// `publishEvent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishParams {
    pub event: Event,
    #[serde(default)]
    pub qos: Qos,
    #[serde(default, alias = "retrails")]
    pub retry_count: u32,
}

/// `advertiseTopic`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvertiseParams {
    pub topic: Topic,
}

/// A topic given either by name or as a full object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TopicRef {
    Name(String),
    Topic(Topic),
}

impl TopicRef {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            TopicRef::Name(name) => name,
            TopicRef::Topic(topic) => &topic.name,
        }
    }
}

impl From<&str> for TopicRef {
    fn from(name: &str) -> Self {
        TopicRef::Name(name.to_string())
    }
}

/// `subscribeTopic` / `unsubscribeTopic`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionParams {
    pub topic: TopicRef,
    #[serde(alias = "subscriberID")]
    pub subscriber_id: String,
}

/// `unsubscribeAll`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriberParams {
    #[serde(alias = "subscriberID")]
    pub subscriber_id: String,
}

/// `getTopicFromTopicName`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicNameParams {
    pub topic_name: String,
}

/// `getTopicFromKeyword`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordParams {
    pub keyword: String,
}

/// `checkForPendingNotifications` / `fetchPendingNotifications`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineParams {
    #[serde(alias = "machineID")]
    pub machine_id: String,
}

/// `receiveTopic`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveTopicParams {
    pub topic: Topic,
}

/// `receiveEvent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveEventParams {
    pub event: Event,
}

/// `receivePendingNotifications`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivePendingParams {
    pub pending_notifications: Vec<Notification>,
}
