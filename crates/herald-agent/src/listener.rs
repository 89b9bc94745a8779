//! Agent-side listener for broker pushes.
//!
//! The broker pushes newly advertised topics, published events and batches
//! of pending notifications to the address an agent registered at login.
//! [`AgentListener`] serves those three methods on an ephemeral port, keeps
//! an inbox of the topics it has heard about, and forwards every received
//! item on a channel.

use crate::client::AgentError;
use async_trait::async_trait;
use dashmap::DashMap;
use herald_core::{MethodHandler, RequestRouter};
use herald_protocol::methods::{
    ReceiveEventParams, ReceivePendingParams, ReceiveTopicParams, RECEIVE_EVENT,
    RECEIVE_PENDING_NOTIFICATIONS, RECEIVE_TOPIC,
};
use herald_protocol::{Notification, Request, RpcError, Topic};
use herald_transport::{Connection, HttpTransport, Transport};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Reply to a delivered batch of pending notifications.
pub const PENDING_RECEIVED: &str = "Pending Notifications Received.";

const PUBLISHER_METHODS: &[&str] = &[RECEIVE_TOPIC, RECEIVE_PENDING_NOTIFICATIONS];
const SUBSCRIBER_METHODS: &[&str] = &[RECEIVE_TOPIC, RECEIVE_EVENT, RECEIVE_PENDING_NOTIFICATIONS];

/// Which methods an agent accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentRole {
    /// Accepts topics and pending batches.
    Publisher,
    /// Also accepts events.
    Subscriber,
}

/// Topics the agent has been told about, by name.
pub type Inbox = Arc<DashMap<String, Topic>>;

struct PushHandler {
    role: AgentRole,
    inbox: Inbox,
    tx: mpsc::UnboundedSender<Notification>,
}

impl PushHandler {
    fn deliver(&self, item: Notification) {
        if let Notification::Topic(topic) = &item {
            self.inbox.insert(topic.name.clone(), topic.clone());
        }
        debug!(kind = item.kind(), label = %item.label(), "Notification received");
        // A dropped receiver only means nobody is listening.
        let _ = self.tx.send(item);
    }
}

#[async_trait]
impl MethodHandler for PushHandler {
    fn methods(&self) -> &'static [&'static str] {
        match self.role {
            AgentRole::Publisher => PUBLISHER_METHODS,
            AgentRole::Subscriber => SUBSCRIBER_METHODS,
        }
    }

    async fn handle(&self, request: &Request) -> Result<Value, RpcError> {
        match request.method.as_str() {
            RECEIVE_TOPIC => {
                let params: ReceiveTopicParams = request.params()?;
                let name = params.topic.name.clone();
                self.deliver(params.topic.into());
                Ok(Value::from(name))
            }
            RECEIVE_EVENT => {
                let params: ReceiveEventParams = request.params()?;
                let title = params.event.title.clone();
                self.deliver(params.event.into());
                Ok(Value::from(title))
            }
            RECEIVE_PENDING_NOTIFICATIONS => {
                let params: ReceivePendingParams = request.params()?;
                for item in params.pending_notifications {
                    self.deliver(item);
                }
                Ok(Value::from(PENDING_RECEIVED))
            }
            _ => Err(RpcError::method_not_found(&request.method)),
        }
    }
}

/// A running listener.
///
/// The accept loop stops when the listener is dropped.
pub struct AgentListener {
    local_addr: SocketAddr,
    inbox: Inbox,
    task: JoinHandle<()>,
}

impl AgentListener {
    /// Bind `addr` (port 0 picks an ephemeral port) and start serving.
    ///
    /// Returns the listener and the stream of received notifications.
    ///
    /// # Errors
    ///
    /// Returns an error if binding fails.
    pub async fn spawn(
        role: AgentRole,
        addr: SocketAddr,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Notification>), AgentError> {
        let transport = HttpTransport::bind(addr).await?;
        let local_addr = transport.local_addr()?;

        let inbox: Inbox = Arc::new(DashMap::new());
        let (tx, rx) = mpsc::unbounded_channel();

        let mut router = RequestRouter::new();
        router.register(Arc::new(PushHandler {
            role,
            inbox: inbox.clone(),
            tx,
        }));

        info!(addr = %local_addr, ?role, "Agent listener started");
        let task = tokio::spawn(accept_loop(transport, Arc::new(router)));

        Ok((
            Self {
                local_addr,
                inbox,
                task,
            },
            rx,
        ))
    }

    /// The bound address.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The address to register with the broker.
    #[must_use]
    pub fn address(&self) -> String {
        self.local_addr.to_string()
    }

    /// Topics received so far, sorted by name.
    #[must_use]
    pub fn known_topics(&self) -> Vec<Topic> {
        let mut topics: Vec<Topic> = self.inbox.iter().map(|e| e.value().clone()).collect();
        topics.sort_by(|a, b| a.name.cmp(&b.name));
        topics
    }

    /// Check if a topic has been received.
    #[must_use]
    pub fn knows(&self, name: &str) -> bool {
        self.inbox.contains_key(name)
    }
}

impl Drop for AgentListener {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn accept_loop(transport: HttpTransport, router: Arc<RequestRouter>) {
    loop {
        match transport.accept().await {
            Ok(conn) => {
                tokio::spawn(serve(conn, router.clone()));
            }
            Err(e) => warn!(error = %e, "Agent accept failed"),
        }
    }
}

async fn serve(mut conn: Box<dyn Connection>, router: Arc<RequestRouter>) {
    match conn.recv().await {
        Ok(Some(request)) => {
            let response = router.dispatch(&request).await;
            if let Err(e) = conn.send(&response).await {
                warn!(connection = %conn.id(), error = %e, "Failed to send reply");
            }
        }
        Ok(None) => {}
        Err(e) => warn!(connection = %conn.id(), error = %e, "Malformed push"),
    }
    let _ = conn.close().await;
}
