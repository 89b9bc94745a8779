//! Subscription index.
//!
//! Maps a topic name to the ordered list of subscriber ids subscribed to it.
//! The list may hold the same subscriber more than once; fan-out callers use
//! [`SubscriptionIndex::recipients`] to visit each subscriber once.

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// Topic name to subscriber ids.
#[derive(Debug, Default)]
pub struct SubscriptionIndex {
    topics: RwLock<HashMap<String, Vec<String>>>,
}

impl SubscriptionIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `subscriber` to the topic's list.
    ///
    /// Returns the number of entries now held for the topic.
    pub fn subscribe(&self, topic: &str, subscriber: &str) -> usize {
        let mut topics = self.topics.write();
        let list = topics.entry(topic.to_string()).or_default();
        list.push(subscriber.to_string());
        let count = list.len();
        drop(topics);

        debug!(%topic, %subscriber, entries = count, "Subscribed");
        count
    }

    /// Remove one occurrence of `subscriber` from the topic's list.
    ///
    /// Returns `true` if an entry was removed.
    pub fn unsubscribe(&self, topic: &str, subscriber: &str) -> bool {
        let mut topics = self.topics.write();
        let Some(list) = topics.get_mut(topic) else {
            return false;
        };
        let Some(pos) = list.iter().position(|s| s == subscriber) else {
            return false;
        };
        list.remove(pos);
        if list.is_empty() {
            topics.remove(topic);
        }
        drop(topics);

        debug!(%topic, %subscriber, "Unsubscribed");
        true
    }

    /// Remove every occurrence of `subscriber` from every topic.
    ///
    /// Returns the number of entries removed.
    pub fn unsubscribe_all(&self, subscriber: &str) -> usize {
        let mut topics = self.topics.write();
        let mut removed = 0;
        topics.retain(|_, list| {
            let before = list.len();
            list.retain(|s| s != subscriber);
            removed += before - list.len();
            !list.is_empty()
        });
        drop(topics);

        debug!(%subscriber, removed, "Unsubscribed from all topics");
        removed
    }

    /// Subscriber entries for a topic, as stored.
    #[must_use]
    pub fn subscribers(&self, topic: &str) -> Vec<String> {
        self.topics.read().get(topic).cloned().unwrap_or_default()
    }

    /// Distinct subscribers of a topic, in subscription order.
    #[must_use]
    pub fn recipients(&self, topic: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.subscribers(topic)
            .into_iter()
            .filter(|s| seen.insert(s.clone()))
            .collect()
    }

    /// Topics `subscriber` is subscribed to, sorted.
    #[must_use]
    pub fn topics_of(&self, subscriber: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .topics
            .read()
            .iter()
            .filter(|(_, list)| list.iter().any(|s| s == subscriber))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Full index, sorted by topic name.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, Vec<String>> {
        self.topics
            .read()
            .iter()
            .map(|(name, list)| (name.clone(), list.clone()))
            .collect()
    }

    /// Total number of subscription entries.
    #[must_use]
    pub fn total(&self) -> usize {
        self.topics.read().values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_keeps_order_and_duplicates() {
        let index = SubscriptionIndex::new();
        index.subscribe("sports", "s1");
        index.subscribe("sports", "s2");
        assert_eq!(index.subscribe("sports", "s1"), 3);

        assert_eq!(index.subscribers("sports"), vec!["s1", "s2", "s1"]);
        assert_eq!(index.recipients("sports"), vec!["s1", "s2"]);
        assert_eq!(index.total(), 3);
    }

    #[test]
    fn test_unsubscribe_removes_one_occurrence() {
        let index = SubscriptionIndex::new();
        index.subscribe("sports", "s1");
        index.subscribe("sports", "s1");

        assert!(index.unsubscribe("sports", "s1"));
        assert_eq!(index.subscribers("sports"), vec!["s1"]);

        assert!(index.unsubscribe("sports", "s1"));
        assert!(index.subscribers("sports").is_empty());
        assert!(index.snapshot().is_empty());
    }

    #[test]
    fn test_unsubscribe_absent_is_noop() {
        let index = SubscriptionIndex::new();
        assert!(!index.unsubscribe("missing", "s1"));

        index.subscribe("sports", "s2");
        assert!(!index.unsubscribe("sports", "s1"));
        assert_eq!(index.subscribers("sports"), vec!["s2"]);
    }

    #[test]
    fn test_unsubscribe_all() {
        let index = SubscriptionIndex::new();
        index.subscribe("T1", "S");
        index.subscribe("T2", "S");
        index.subscribe("T2", "S");
        index.subscribe("T2", "other");

        assert_eq!(index.topics_of("S"), vec!["T1", "T2"]);
        assert_eq!(index.unsubscribe_all("S"), 3);

        assert!(!index.subscribers("T1").contains(&"S".to_string()));
        assert!(!index.subscribers("T2").contains(&"S".to_string()));
        assert_eq!(index.subscribers("T2"), vec!["other"]);
        assert!(index.topics_of("S").is_empty());
    }

    #[test]
    fn test_concurrent_subscribes_are_all_kept() {
        let index = std::sync::Arc::new(SubscriptionIndex::new());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let index = index.clone();
                std::thread::spawn(move || {
                    for n in 0..100 {
                        index.subscribe("sports", &format!("s{i}-{n}"));
                        index.subscribe(&format!("topic{}", n % 4), &format!("s{i}"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(index.subscribers("sports").len(), 800);
        assert_eq!(index.recipients("sports").len(), 800);
        assert_eq!(index.total(), 1600);
        assert_eq!(index.topics_of("s3"), vec!["topic0", "topic1", "topic2", "topic3"]);
    }
}
