//! Pushes to agents as JSON-RPC calls.

use async_trait::async_trait;
use herald_core::{Notifier, PushError};
use herald_protocol::methods::{
    ReceiveEventParams, ReceivePendingParams, ReceiveTopicParams, RECEIVE_EVENT,
    RECEIVE_PENDING_NOTIFICATIONS, RECEIVE_TOPIC,
};
use herald_protocol::{Event, Notification, Request, Topic};
use herald_transport::{RpcClient, TransportError};
use serde::Serialize;
use std::net::{Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// [`Notifier`] calling the agent-side methods over an [`RpcClient`].
pub struct RpcNotifier {
    client: Arc<dyn RpcClient>,
    default_port: u16,
    next_id: AtomicU64,
}

impl RpcNotifier {
    /// Registered addresses without a port get `default_port`.
    #[must_use]
    pub fn new(client: Arc<dyn RpcClient>, default_port: u16) -> Self {
        Self {
            client,
            default_port,
            next_id: AtomicU64::new(1),
        }
    }

    /// The `host:port` a push to `address` goes to.
    #[must_use]
    pub fn target(&self, address: &str) -> String {
        if address.parse::<SocketAddr>().is_ok() {
            return address.to_string();
        }
        if address.parse::<Ipv6Addr>().is_ok() {
            return format!("[{address}]:{}", self.default_port);
        }
        match address.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
                address.to_string()
            }
            _ => format!("{address}:{}", self.default_port),
        }
    }

    async fn push<P: Serialize>(
        &self,
        method: &str,
        address: &str,
        params: &P,
    ) -> Result<(), PushError> {
        let target = self.target(address);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = Request::new(method, id)
            .with_params(params)
            .map_err(|e| PushError::Unreachable {
                address: target.clone(),
                reason: e.to_string(),
            })?;

        let response = self
            .client
            .call(&target, &request)
            .await
            .map_err(|e| match e {
                TransportError::Timeout(_) => PushError::Timeout(target.clone()),
                other => PushError::Unreachable {
                    address: target.clone(),
                    reason: other.to_string(),
                },
            })?;

        trace!(%target, %method, "Push answered");
        response
            .into_result()
            .map(|_| ())
            .map_err(|e| PushError::Rejected {
                code: e.code,
                message: e.message,
            })
    }
}

#[async_trait]
impl Notifier for RpcNotifier {
    async fn receive_topic(&self, address: &str, topic: &Topic) -> Result<(), PushError> {
        let params = ReceiveTopicParams {
            topic: topic.clone(),
        };
        self.push(RECEIVE_TOPIC, address, &params).await
    }

    async fn receive_event(&self, address: &str, event: &Event) -> Result<(), PushError> {
        let params = ReceiveEventParams {
            event: event.clone(),
        };
        self.push(RECEIVE_EVENT, address, &params).await
    }

    async fn receive_pending(
        &self,
        address: &str,
        items: &[Notification],
    ) -> Result<(), PushError> {
        let params = ReceivePendingParams {
            pending_notifications: items.to_vec(),
        };
        self.push(RECEIVE_PENDING_NOTIFICATIONS, address, &params)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_agent::{AgentListener, AgentRole};
    use herald_transport::{ClientConfig, HttpClient};
    use std::time::Duration;

    fn notifier() -> RpcNotifier {
        let client = HttpClient::new(ClientConfig {
            connect_timeout: Duration::from_millis(300),
            call_timeout: Duration::from_millis(300),
            ..Default::default()
        })
        .unwrap();
        RpcNotifier::new(Arc::new(client), 6969)
    }

    #[test]
    fn test_target_appends_default_port() {
        let n = notifier();
        assert_eq!(n.target("10.0.0.2"), "10.0.0.2:6969");
        assert_eq!(n.target("10.0.0.2:7000"), "10.0.0.2:7000");
        assert_eq!(n.target("agent.local"), "agent.local:6969");
        assert_eq!(n.target("agent.local:7000"), "agent.local:7000");
        assert_eq!(n.target("::1"), "[::1]:6969");
        assert_eq!(n.target("[::1]:7000"), "[::1]:7000");
    }

    #[tokio::test]
    async fn test_push_reaches_agent() {
        let (agent, mut rx) = AgentListener::spawn(AgentRole::Subscriber, "127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();

        let event = Event::new(Topic::new("sports", ["ball"]), "goal", "score!");
        notifier()
            .receive_event(&agent.address(), &event)
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap(), Notification::Event(event));
    }

    #[tokio::test]
    async fn test_publisher_rejects_event_push() {
        let (agent, _rx) = AgentListener::spawn(AgentRole::Publisher, "127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();

        let event = Event::new(Topic::new("sports", ["ball"]), "goal", "score!");
        let err = notifier()
            .receive_event(&agent.address(), &event)
            .await
            .unwrap_err();
        assert!(matches!(err, PushError::Rejected { code: -32601, .. }));
    }

    #[tokio::test]
    async fn test_unreachable_agent() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = notifier()
            .receive_topic(&addr.to_string(), &Topic::new("sports", ["ball"]))
            .await
            .unwrap_err();
        assert!(matches!(err, PushError::Unreachable { .. }));
    }
}
