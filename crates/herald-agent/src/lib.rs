//! # herald-agent
//!
//! Building blocks for publisher and subscriber agents.
//!
//! - **BrokerClient** - typed calls for every broker-side method
//! - **AgentListener** - serves the pushes the broker makes to agents
//!
//! ## Example
//!
//! ```rust,ignore
//! use herald_agent::{AgentListener, AgentRole, BrokerClient};
//!
//! let (listener, mut notifications) =
//!     AgentListener::spawn(AgentRole::Subscriber, "0.0.0.0:0".parse()?).await?;
//! let broker = BrokerClient::new("10.0.0.10:9091")?;
//! broker.subscriber_login("s1", &listener.address()).await?;
//! broker.subscribe("sports", "s1").await?;
//!
//! while let Some(item) = notifications.recv().await {
//!     println!("{}: {}", item.kind(), item.label());
//! }
//! ```

pub mod client;
pub mod listener;

pub use client::{AgentError, BrokerClient};
pub use listener::{AgentListener, AgentRole};
