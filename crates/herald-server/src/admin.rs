//! Read-only operator API.
//!
//! Served by axum on its own port, next to the JSON-RPC listener. `/events`
//! returns the audit log tail, oldest first.

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use herald_core::{Broker, BrokerStats, ParticipantKind, PresenceRecord};
use herald_protocol::{Event, Topic};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// A topic with its subscriber list.
#[derive(Debug, Serialize)]
pub struct TopicView {
    #[serde(flatten)]
    pub topic: Topic,
    pub subscribers: Vec<String>,
}

/// A participant with its queued item count.
#[derive(Debug, Serialize)]
pub struct ParticipantView {
    #[serde(flatten)]
    pub record: PresenceRecord,
    pub pending: usize,
}

/// Both participant tables.
#[derive(Debug, Serialize)]
pub struct Participants {
    pub publishers: Vec<ParticipantView>,
    pub subscribers: Vec<ParticipantView>,
}

/// Broker counters plus the queue length of every recipient with pending items.
#[derive(Debug, Serialize)]
pub struct StatsView {
    #[serde(flatten)]
    pub stats: BrokerStats,
    pub pending_by_recipient: BTreeMap<String, usize>,
}

const DEFAULT_EVENT_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
struct EventsQuery {
    limit: Option<usize>,
}

/// Build the admin router.
pub fn router(broker: Arc<Broker>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/topics", get(topics_handler))
        .route("/topics/:name/subscribers", get(subscribers_handler))
        .route("/participants", get(participants_handler))
        .route("/stats", get(stats_handler))
        .route("/events", get(events_handler))
        .with_state(broker)
}

/// Serve the admin API on `addr`.
///
/// # Errors
///
/// Returns an error if the port cannot be bound or serving fails.
pub async fn serve(addr: SocketAddr, broker: Arc<Broker>) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind admin API on {addr}"))?;
    info!(%addr, "Admin API listening");
    axum::serve(listener, router(broker)).await?;
    Ok(())
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn topics_handler(State(broker): State<Arc<Broker>>) -> Json<Vec<TopicView>> {
    let subscriptions = &broker.state().subscriptions;
    let views = broker
        .all_topics()
        .into_values()
        .map(|topic| TopicView {
            subscribers: subscriptions.subscribers(&topic.name),
            topic,
        })
        .collect();
    Json(views)
}

async fn subscribers_handler(
    State(broker): State<Arc<Broker>>,
    Path(name): Path<String>,
) -> Result<Json<Vec<String>>, StatusCode> {
    if !broker.state().catalog.contains(&name) {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(broker.state().subscriptions.subscribers(&name)))
}

async fn participants_handler(State(broker): State<Arc<Broker>>) -> Json<Participants> {
    let view = |kind: ParticipantKind| {
        broker
            .state()
            .presence
            .snapshot(kind)
            .into_iter()
            .map(|record| ParticipantView {
                pending: broker.state().pending.len(&record.id),
                record,
            })
            .collect::<Vec<_>>()
    };
    Json(Participants {
        publishers: view(ParticipantKind::Publisher),
        subscribers: view(ParticipantKind::Subscriber),
    })
}

async fn stats_handler(State(broker): State<Arc<Broker>>) -> Json<StatsView> {
    Json(StatsView {
        stats: broker.stats(),
        pending_by_recipient: broker.state().pending.counts(),
    })
}

async fn events_handler(
    State(broker): State<Arc<Broker>>,
    Query(query): Query<EventsQuery>,
) -> Json<Vec<Event>> {
    let limit = query.limit.unwrap_or(DEFAULT_EVENT_LIMIT);
    Json(broker.state().audit.recent(limit))
}
