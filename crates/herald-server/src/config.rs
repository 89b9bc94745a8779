//! Server configuration.
//!
//! Configuration can be loaded from:
//! - An explicit `--config` path
//! - The first existing of `herald.toml`, `/etc/herald/herald.toml`,
//!   `~/.config/herald/herald.toml`
//! - Defaults, with `HERALD_HOST` / `HERALD_PORT` / `HERALD_READ_TIMEOUT_MS`
//!   environment overrides

use anyhow::{Context, Result};
use herald_core::BrokerConfig;
use herald_protocol::codec::MAX_BODY_SIZE;
use herald_transport::{ClientConfig, HttpConfig};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port the broker listens on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Outbound push settings.
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Resource limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Admin HTTP API.
    #[serde(default)]
    pub admin: AdminConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Outbound push configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Connect timeout for pushes, in milliseconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Timeout for a whole push call, in milliseconds.
    #[serde(default = "default_call_timeout")]
    pub call_timeout_ms: u64,

    /// How long an inbound connection may take to deliver its request, in
    /// milliseconds.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u64,

    /// Optional cap on publisher-requested retries. Unset by default.
    #[serde(default)]
    pub max_retries: Option<u32>,

    /// Port appended to registered addresses that carry none.
    #[serde(default = "default_agent_port")]
    pub default_agent_port: u16,
}

/// Resource limits configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum request body in bytes.
    #[serde(default = "default_max_request_size")]
    pub max_request_size: usize,

    /// Number of published events kept in the audit log.
    #[serde(default = "default_audit_capacity")]
    pub audit_capacity: usize,
}

/// Admin API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Enable the admin API.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Admin API port.
    #[serde(default = "default_admin_port")]
    pub port: u16,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics export.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default value functions
fn default_host() -> String {
    std::env::var("HERALD_HOST").unwrap_or_else(|_| "127.0.0.1".to_string())
}

fn default_port() -> u16 {
    std::env::var("HERALD_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(9091)
}

fn default_true() -> bool {
    true
}

fn default_connect_timeout() -> u64 {
    2_000
}

fn default_call_timeout() -> u64 {
    5_000
}

fn default_read_timeout() -> u64 {
    std::env::var("HERALD_READ_TIMEOUT_MS")
        .ok()
        .and_then(|t| t.parse().ok())
        .unwrap_or(30_000)
}

fn default_agent_port() -> u16 {
    6969
}

fn default_max_request_size() -> usize {
    MAX_BODY_SIZE
}

fn default_audit_capacity() -> usize {
    10_000
}

fn default_admin_port() -> u16 {
    9092
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            delivery: DeliveryConfig::default(),
            limits: LimitsConfig::default(),
            admin: AdminConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout(),
            call_timeout_ms: default_call_timeout(),
            read_timeout_ms: default_read_timeout(),
            max_retries: None,
            default_agent_port: default_agent_port(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_request_size: default_max_request_size(),
            audit_capacity: default_audit_capacity(),
        }
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_admin_port(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_metrics_port(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or the default locations.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed, or an
    /// explicit `path` cannot be read.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }

        let config_paths = [
            "herald.toml",
            "/etc/herald/herald.toml",
            "~/.config/herald/herald.toml",
        ];

        for path in &config_paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::from_file(expanded.as_ref());
            }
        }

        // Fall back to defaults with environment overrides
        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Socket address the broker binds to.
    ///
    /// # Errors
    ///
    /// Returns an error if `host:port` is not a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        socket_addr(&self.host, self.port)
    }

    /// Socket address the admin API binds to.
    ///
    /// # Errors
    ///
    /// Returns an error if `host:admin.port` is not a socket address.
    pub fn admin_addr(&self) -> Result<SocketAddr> {
        socket_addr(&self.host, self.admin.port)
    }

    /// Listener settings for the broker port.
    ///
    /// # Errors
    ///
    /// Returns an error if the bind address is invalid.
    pub fn http_config(&self) -> Result<HttpConfig> {
        Ok(HttpConfig {
            bind_addr: self.bind_addr()?,
            max_body_size: self.limits.max_request_size,
            read_timeout: Duration::from_millis(self.delivery.read_timeout_ms),
        })
    }

    /// Client settings for outbound pushes.
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            connect_timeout: Duration::from_millis(self.delivery.connect_timeout_ms),
            call_timeout: Duration::from_millis(self.delivery.call_timeout_ms),
            ..Default::default()
        }
    }

    /// Broker settings.
    #[must_use]
    pub fn broker_config(&self) -> BrokerConfig {
        BrokerConfig {
            max_retries: self.delivery.max_retries,
            audit_capacity: self.limits.audit_capacity,
        }
    }
}

fn socket_addr(host: &str, port: u16) -> Result<SocketAddr> {
    format!("{host}:{port}")
        .parse()
        .with_context(|| format!("Invalid bind address {host}:{port}"))
}
