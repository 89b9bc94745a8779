//! Presence tracking for publishers and subscribers.
//!
//! Each participant kind has its own table mapping participant id to the
//! last registered address, or offline. Records are created on first login
//! and never removed, only toggled offline.

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Which side of the broker a participant is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantKind {
    Publisher,
    Subscriber,
}

impl fmt::Display for ParticipantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParticipantKind::Publisher => f.write_str("publisher"),
            ParticipantKind::Subscriber => f.write_str("subscriber"),
        }
    }
}

/// Reachability of a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "address", rename_all = "lowercase")]
pub enum Presence {
    /// Reachable at the given address.
    Online(String),
    Offline,
}

impl Presence {
    #[must_use]
    pub fn is_online(&self) -> bool {
        matches!(self, Presence::Online(_))
    }

    /// The address, if online.
    #[must_use]
    pub fn address(&self) -> Option<&str> {
        match self {
            Presence::Online(address) => Some(address),
            Presence::Offline => None,
        }
    }
}

/// Serializable view of one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresenceRecord {
    pub id: String,
    pub kind: ParticipantKind,
    #[serde(flatten)]
    pub presence: Presence,
    /// Milliseconds since the epoch of the last login/logoff.
    pub updated_at: u64,
}

/// Whether a login created a record or refreshed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    Registered,
    Returning,
}

/// Result of [`PresenceRegistry::login_or_refresh`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Login {
    pub outcome: LoginOutcome,
    /// Other participants of the same kind forced offline because they were
    /// bound to the same address.
    pub displaced: Vec<String>,
}

impl Login {
    /// Message returned to the caller.
    #[must_use]
    pub fn message(&self, id: &str) -> String {
        match self.outcome {
            LoginOutcome::Registered => format!("Registered and logged in {id}"),
            LoginOutcome::Returning => format!("Logged in {id}. Welcome back!"),
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    presence: Presence,
    updated_at: u64,
}

impl Entry {
    fn new(presence: Presence) -> Self {
        Self {
            presence,
            updated_at: now_millis(),
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

type Table = RwLock<HashMap<String, Entry>>;

/// Presence tables for both participant kinds.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    publishers: Table,
    subscribers: Table,
}

impl PresenceRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, kind: ParticipantKind) -> &Table {
        match kind {
            ParticipantKind::Publisher => &self.publishers,
            ParticipantKind::Subscriber => &self.subscribers,
        }
    }

    /// Mark `id` online at `address`.
    ///
    /// Any other participant of the same kind currently bound to `address`
    /// is forced offline: a restarted agent reuses its host's address.
    pub fn login_or_refresh(&self, id: &str, kind: ParticipantKind, address: &str) -> Login {
        let mut table = self.table(kind).write();

        let mut displaced = Vec::new();
        for (other, entry) in table.iter_mut() {
            if other != id && entry.presence.address() == Some(address) {
                *entry = Entry::new(Presence::Offline);
                displaced.push(other.clone());
            }
        }

        let outcome = match table.insert(
            id.to_string(),
            Entry::new(Presence::Online(address.to_string())),
        ) {
            Some(_) => LoginOutcome::Returning,
            None => LoginOutcome::Registered,
        };

        drop(table);

        for other in &displaced {
            debug!(participant = %other, %kind, %address, "Presence: displaced by new login");
        }
        debug!(participant = %id, %kind, %address, ?outcome, "Presence: logged in");

        Login { outcome, displaced }
    }

    /// Mark `id` offline, creating the record if absent.
    ///
    /// Returns `true` if the participant was already known.
    pub fn logoff(&self, id: &str, kind: ParticipantKind) -> bool {
        let known = self
            .table(kind)
            .write()
            .insert(id.to_string(), Entry::new(Presence::Offline))
            .is_some();
        debug!(participant = %id, %kind, known, "Presence: logged off");
        known
    }

    /// Current presence of `id`. Unknown ids are offline.
    #[must_use]
    pub fn lookup(&self, id: &str, kind: ParticipantKind) -> Presence {
        self.table(kind)
            .read()
            .get(id)
            .map(|e| e.presence.clone())
            .unwrap_or(Presence::Offline)
    }

    /// Online address of `id` under either kind, publisher record first.
    #[must_use]
    pub fn resolve_any(&self, id: &str) -> Option<String> {
        [ParticipantKind::Publisher, ParticipantKind::Subscriber]
            .into_iter()
            .find_map(|kind| self.lookup(id, kind).address().map(str::to_string))
    }

    /// All known ids of `kind`, sorted.
    #[must_use]
    pub fn ids(&self, kind: ParticipantKind) -> Vec<String> {
        let mut ids: Vec<String> = self.table(kind).read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Every known participant of `kind`, sorted by id.
    #[must_use]
    pub fn snapshot(&self, kind: ParticipantKind) -> Vec<PresenceRecord> {
        let mut records: Vec<PresenceRecord> = self
            .table(kind)
            .read()
            .iter()
            .map(|(id, entry)| PresenceRecord {
                id: id.clone(),
                kind,
                presence: entry.presence.clone(),
                updated_at: entry.updated_at,
            })
            .collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }

    /// Number of known participants of `kind`.
    #[must_use]
    pub fn count(&self, kind: ParticipantKind) -> usize {
        self.table(kind).read().len()
    }

    /// Number of online participants of `kind`.
    #[must_use]
    pub fn online_count(&self, kind: ParticipantKind) -> usize {
        self.table(kind)
            .read()
            .values()
            .filter(|e| e.presence.is_online())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ParticipantKind::{Publisher, Subscriber};

    #[test]
    fn test_register_then_welcome_back() {
        let registry = PresenceRegistry::new();

        let first = registry.login_or_refresh("p1", Publisher, "10.0.0.1:7000");
        assert_eq!(first.outcome, LoginOutcome::Registered);
        assert_eq!(first.message("p1"), "Registered and logged in p1");

        let again = registry.login_or_refresh("p1", Publisher, "10.0.0.9:7000");
        assert_eq!(again.outcome, LoginOutcome::Returning);
        assert_eq!(again.message("p1"), "Logged in p1. Welcome back!");
        assert_eq!(
            registry.lookup("p1", Publisher),
            Presence::Online("10.0.0.9:7000".into())
        );
    }

    #[test]
    fn test_address_exclusivity() {
        let registry = PresenceRegistry::new();

        registry.login_or_refresh("A", Subscriber, "X");
        let login = registry.login_or_refresh("B", Subscriber, "X");

        assert_eq!(login.displaced, vec!["A".to_string()]);
        assert_eq!(registry.lookup("A", Subscriber), Presence::Offline);
        assert_eq!(registry.lookup("B", Subscriber), Presence::Online("X".into()));
    }

    #[test]
    fn test_exclusivity_is_per_kind() {
        let registry = PresenceRegistry::new();

        registry.login_or_refresh("A", Publisher, "X");
        registry.login_or_refresh("B", Subscriber, "X");

        assert!(registry.lookup("A", Publisher).is_online());
        assert!(registry.lookup("B", Subscriber).is_online());
    }

    #[test]
    fn test_relogin_same_address_keeps_self() {
        let registry = PresenceRegistry::new();

        registry.login_or_refresh("A", Subscriber, "X");
        let login = registry.login_or_refresh("A", Subscriber, "X");

        assert!(login.displaced.is_empty());
        assert!(registry.lookup("A", Subscriber).is_online());
    }

    #[test]
    fn test_logoff_creates_offline_record() {
        let registry = PresenceRegistry::new();

        assert!(!registry.logoff("ghost", Subscriber));
        assert_eq!(registry.count(Subscriber), 1);
        assert_eq!(registry.lookup("ghost", Subscriber), Presence::Offline);

        registry.login_or_refresh("s1", Subscriber, "X");
        assert!(registry.logoff("s1", Subscriber));
        assert_eq!(registry.lookup("s1", Subscriber), Presence::Offline);
        assert_eq!(registry.online_count(Subscriber), 0);
    }

    #[test]
    fn test_unknown_is_offline() {
        let registry = PresenceRegistry::new();
        assert_eq!(registry.lookup("nobody", Publisher), Presence::Offline);
        assert_eq!(registry.resolve_any("nobody"), None);
    }

    #[test]
    fn test_resolve_any_prefers_publisher() {
        let registry = PresenceRegistry::new();

        registry.login_or_refresh("m", Subscriber, "sub-addr");
        assert_eq!(registry.resolve_any("m").as_deref(), Some("sub-addr"));

        registry.login_or_refresh("m", Publisher, "pub-addr");
        assert_eq!(registry.resolve_any("m").as_deref(), Some("pub-addr"));

        registry.logoff("m", Publisher);
        assert_eq!(registry.resolve_any("m").as_deref(), Some("sub-addr"));
    }

    #[test]
    fn test_snapshot_sorted() {
        let registry = PresenceRegistry::new();
        registry.login_or_refresh("b", Subscriber, "2");
        registry.login_or_refresh("a", Subscriber, "1");
        registry.logoff("c", Subscriber);

        let ids: Vec<_> = registry
            .snapshot(Subscriber)
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        let value = serde_json::to_value(&registry.snapshot(Subscriber)[0]).unwrap();
        assert_eq!(value["status"], "online");
        assert_eq!(value["address"], "1");
    }

    #[test]
    fn test_concurrent_logins_to_one_address() {
        let registry = std::sync::Arc::new(PresenceRegistry::new());

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for round in 0..50 {
                        registry.login_or_refresh(&format!("s{i}-{round}"), Subscriber, "X");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.count(Subscriber), 16 * 50);
        assert_eq!(registry.online_count(Subscriber), 1);
        let online: Vec<_> = registry
            .snapshot(Subscriber)
            .into_iter()
            .filter(|r| r.presence.is_online())
            .collect();
        assert_eq!(online[0].presence.address(), Some("X"));
    }
}
