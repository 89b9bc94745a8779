//! Data model shared by the broker and its agents.
//!
//! Topics and events travel by value: an [`Event`] embeds a full snapshot of
//! the [`Topic`] it was published against rather than a reference to it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A named channel with descriptive keywords.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    /// Broker-issued identity (`t<n>`). Empty until the broker stamps it.
    #[serde(default)]
    pub id: String,
    /// Unique catalog key.
    pub name: String,
    /// Keywords matched by exact equality.
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Topic {
    /// Create a topic with no identity yet.
    #[must_use]
    pub fn new<I, K>(name: impl Into<String>, keywords: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            id: String::new(),
            name: name.into(),
            keywords: keywords.into_iter().map(Into::into).collect(),
        }
    }

    /// Replace the identity.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Whether `keyword` is one of this topic's keywords (exact match).
    #[must_use]
    pub fn has_keyword(&self, keyword: &str) -> bool {
        self.keywords.iter().any(|k| k == keyword)
    }
}

/// An immutable message published against a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Broker-issued identity (`e<n>`).
    #[serde(default)]
    pub id: String,
    /// Snapshot of the topic at publish time.
    pub topic: Topic,
    pub title: String,
    pub content: String,
}

impl Event {
    /// Create an event with no identity yet.
    #[must_use]
    pub fn new(topic: Topic, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            topic,
            title: title.into(),
            content: content.into(),
        }
    }

    /// Replace the identity.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// An item queued for a participant that could not be reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Notification {
    Topic(Topic),
    Event(Event),
}

impl Notification {
    /// Short discriminator used in logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::Topic(_) => "topic",
            Notification::Event(_) => "event",
        }
    }

    /// Topic name for topics, title for events.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Notification::Topic(topic) => &topic.name,
            Notification::Event(event) => &event.title,
        }
    }
}

impl From<Topic> for Notification {
    fn from(topic: Topic) -> Self {
        Notification::Topic(topic)
    }
}

impl From<Event> for Notification {
    fn from(event: Event) -> Self {
        Notification::Event(event)
    }
}

/// Per-publish delivery assurance.
///
/// Levels 1 and 2 behave identically: both retry failed pushes, neither
/// deduplicates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "QosRepr")]
#[repr(u8)]
pub enum Qos {
    /// Best effort, a single push attempt.
    #[default]
    AtMostOnce = 0,
    /// Retry-assisted.
    AtLeastOnce = 1,
    /// Accepted for compatibility, handled as [`Qos::AtLeastOnce`].
    ExactlyOnce = 2,
}

impl Qos {
    /// Whether failed pushes are retried.
    #[must_use]
    pub fn retries(self) -> bool {
        !matches!(self, Qos::AtMostOnce)
    }
}

impl From<Qos> for u8 {
    fn from(qos: Qos) -> u8 {
        qos as u8
    }
}

impl TryFrom<u8> for Qos {
    type Error = InvalidQos;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Qos::AtMostOnce),
            1 => Ok(Qos::AtLeastOnce),
            2 => Ok(Qos::ExactlyOnce),
            other => Err(InvalidQos(other.to_string())),
        }
    }
}

impl fmt::Display for Qos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self as u8)
    }
}

/// Rejected QoS value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidQos(pub String);

impl fmt::Display for InvalidQos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid qos {:?}, expected 0, 1 or 2", self.0)
    }
}

impl std::error::Error for InvalidQos {}

/// Older agents send the level as a string.
#[derive(Deserialize)]
#[serde(untagged)]
enum QosRepr {
    Number(u8),
    Text(String),
}

impl TryFrom<QosRepr> for Qos {
    type Error = InvalidQos;

    fn try_from(repr: QosRepr) -> Result<Self, Self::Error> {
        match repr {
            QosRepr::Number(n) => Qos::try_from(n),
            QosRepr::Text(s) => s
                .trim()
                .parse::<u8>()
                .map_err(|_| InvalidQos(s.clone()))
                .and_then(Qos::try_from),
        }
    }
}
