//! # herald-core
//!
//! Registries, delivery engine and request routing for the Herald broker.
//!
//! - **PresenceRegistry** - who is online, and where
//! - **TopicCatalog** - authoritative set of topics
//! - **SubscriptionIndex** - topic to subscriber ids
//! - **PendingQueue** - per-recipient queue of undelivered items
//! - **DeliveryEngine** - push-or-queue fan-out with QoS retry
//! - **RequestRouter** - method-name dispatch onto the [`Broker`]
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌──────────────────┐
//! │   Request   │────▶│   Router    │────▶│     Broker       │
//! └─────────────┘     └─────────────┘     └──────────────────┘
//!                                            │           │
//!                                            ▼           ▼
//!                                 ┌────────────────┐ ┌────────────┐
//!                                 │ DeliveryEngine │ │ Registries │
//!                                 └────────────────┘ └────────────┘
//!                                   │          │
//!                                   ▼          ▼
//!                            ┌──────────┐ ┌──────────────┐
//!                            │ Notifier │ │ PendingQueue │
//!                            └──────────┘ └──────────────┘
//! ```
//!
//! Each collection carries its own lock. No lock is held across an
//! `.await`, so outbound pushes never block other requests.

pub mod audit;
pub mod broker;
pub mod catalog;
pub mod delivery;
pub mod handlers;
pub mod ids;
pub mod pending;
pub mod presence;
pub mod router;
pub mod subscriptions;

#[cfg(test)]
mod testing;

pub use broker::{Broker, BrokerConfig, BrokerError, BrokerState, BrokerStats};
pub use delivery::{DeliveryEngine, FanoutReport, Notifier, PendingCheck, PushError, RetryPolicy};
pub use presence::{ParticipantKind, Presence, PresenceRecord, PresenceRegistry};
pub use router::{MethodHandler, RequestRouter};
