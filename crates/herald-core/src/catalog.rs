//! Topic catalog.
//!
//! The catalog is the authoritative record of which topics exist. Topic names
//! are unique keys; advertising an existing name replaces its metadata.

use herald_protocol::Topic;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Topics indexed by name.
#[derive(Debug, Default)]
pub struct TopicCatalog {
    topics: RwLock<HashMap<String, Topic>>,
}

impl TopicCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a topic by name.
    ///
    /// Returns the topic previously stored under that name.
    pub fn advertise(&self, topic: Topic) -> Option<Topic> {
        let name = topic.name.clone();
        let previous = self.topics.write().insert(name.clone(), topic);
        debug!(
            topic = %name,
            replaced = previous.is_some(),
            "Catalog: topic advertised"
        );
        previous
    }

    /// Look up a topic by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Topic> {
        self.topics.read().get(name).cloned()
    }

    /// Check if a topic exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.topics.read().contains_key(name)
    }

    /// Topics carrying `keyword` (exact match), keyed by name.
    #[must_use]
    pub fn by_keyword(&self, keyword: &str) -> BTreeMap<String, Topic> {
        self.topics
            .read()
            .iter()
            .filter(|(_, topic)| topic.has_keyword(keyword))
            .map(|(name, topic)| (name.clone(), topic.clone()))
            .collect()
    }

    /// Every topic, keyed by name.
    #[must_use]
    pub fn all(&self) -> BTreeMap<String, Topic> {
        self.topics
            .read()
            .iter()
            .map(|(name, topic)| (name.clone(), topic.clone()))
            .collect()
    }

    /// Number of topics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.topics.read().len()
    }

    /// Check if the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.topics.read().is_empty()
    }
}
