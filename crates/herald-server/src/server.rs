//! Broker accept loop.
//!
//! Each inbound connection carries one JSON-RPC request and is served by its
//! own task, which runs the handler to completion (outbound pushes included)
//! before writing the response. A request that cannot be framed or parsed
//! aborts its connection without a response.

use crate::admin;
use crate::config::Config;
use crate::metrics::{self, ConnectionMetricsGuard};
use crate::notifier::RpcNotifier;
use anyhow::{Context, Result};
use herald_core::{Broker, RequestRouter};
use herald_transport::{Connection, HttpClient, HttpTransport, Transport};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Build a broker that pushes to agents over HTTP.
///
/// # Errors
///
/// Returns an error if the push client cannot be initialized.
pub fn build_broker(config: &Config) -> Result<Arc<Broker>> {
    let client = HttpClient::new(config.client_config()).context("Failed to build push client")?;
    let notifier = RpcNotifier::new(Arc::new(client), config.delivery.default_agent_port);
    Ok(Arc::new(Broker::new(config.broker_config(), Arc::new(notifier))))
}

/// The broker's JSON-RPC listener.
pub struct Server {
    transport: HttpTransport,
    router: Arc<RequestRouter>,
}

impl Server {
    /// Bind the broker port.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid or cannot be bound.
    pub async fn bind(config: &Config, broker: Arc<Broker>) -> Result<Self> {
        let transport = HttpTransport::new(config.http_config()?)
            .await
            .context("Failed to bind broker port")?;
        Ok(Self {
            transport,
            router: Arc::new(RequestRouter::for_broker(broker)),
        })
    }

    /// The bound address.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket has no local address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.transport.local_addr()?)
    }

    /// Accept connections until the listener fails.
    ///
    /// # Errors
    ///
    /// Returns an error if accepting connections fails.
    pub async fn run(self) -> Result<()> {
        info!(
            addr = %self.local_addr()?,
            transport = self.transport.name(),
            methods = self.router.methods().len(),
            "Herald broker listening"
        );

        loop {
            let conn = self
                .transport
                .accept()
                .await
                .context("Failed to accept connection")?;
            tokio::spawn(handle_connection(conn, self.router.clone()));
        }
    }
}

/// Serve one connection.
async fn handle_connection(mut conn: Box<dyn Connection>, router: Arc<RequestRouter>) {
    let _metrics_guard = ConnectionMetricsGuard::new();
    let remote = conn.remote_addr().unwrap_or_default();

    let request = match conn.recv().await {
        Ok(Some(request)) => request,
        Ok(None) => {
            debug!(connection = %conn.id(), %remote, "Connection closed before a request");
            return;
        }
        Err(e) => {
            metrics::record_malformed();
            warn!(connection = %conn.id(), %remote, error = %e, "Malformed request, aborting");
            let _ = conn.close().await;
            return;
        }
    };

    debug!(connection = %conn.id(), %remote, method = %request.method, "Request received");

    let start = Instant::now();
    let response = router.dispatch(&request).await;
    metrics::record_request(&request.method, start.elapsed().as_secs_f64());

    if let Err(e) = conn.send(&response).await {
        warn!(connection = %conn.id(), error = %e, "Failed to send response");
    }
    let _ = conn.close().await;
}

/// Run the broker with its admin API and metrics exporter.
///
/// # Errors
///
/// Returns an error if the broker fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    let broker = build_broker(&config)?;

    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(&config.host, config.metrics.port) {
            error!("Failed to start metrics server: {:#}", e);
        }
    }

    if config.admin.enabled {
        let addr = config.admin_addr()?;
        let broker = broker.clone();
        tokio::spawn(async move {
            if let Err(e) = admin::serve(addr, broker).await {
                error!("Admin API stopped: {:#}", e);
            }
        });
    }

    Server::bind(&config, broker).await?.run().await
}
