//! Method-name dispatch for inbound JSON-RPC calls.

use crate::broker::Broker;
use crate::handlers::{
    AdvertiseHandler, LoginHandler, PendingHandler, PublishHandler, SubscriptionHandler,
    TopicQueryHandler,
};
use async_trait::async_trait;
use herald_protocol::{Request, Response, RpcError};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Serves one or more methods.
#[async_trait]
pub trait MethodHandler: Send + Sync {
    /// Method names this handler answers.
    fn methods(&self) -> &'static [&'static str];

    /// Handle a call to one of [`MethodHandler::methods`].
    async fn handle(&self, request: &Request) -> Result<Value, RpcError>;
}

/// Routes requests to handlers by method name.
#[derive(Default)]
pub struct RequestRouter {
    handlers: HashMap<&'static str, Arc<dyn MethodHandler>>,
}

impl RequestRouter {
    /// Create a router with no methods.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Router serving every broker-side method.
    #[must_use]
    pub fn for_broker(broker: Arc<Broker>) -> Self {
        let mut router = Self::new();
        router.register(Arc::new(LoginHandler::new(broker.clone())));
        router.register(Arc::new(PublishHandler::new(broker.clone())));
        router.register(Arc::new(AdvertiseHandler::new(broker.clone())));
        router.register(Arc::new(SubscriptionHandler::new(broker.clone())));
        router.register(Arc::new(TopicQueryHandler::new(broker.clone())));
        router.register(Arc::new(PendingHandler::new(broker)));
        router
    }

    /// Register a handler for all of its methods, replacing earlier ones.
    pub fn register(&mut self, handler: Arc<dyn MethodHandler>) {
        for method in handler.methods() {
            self.handlers.insert(method, handler.clone());
        }
    }

    /// Check if `method` has a handler.
    #[must_use]
    pub fn handles(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }

    /// Registered method names, sorted.
    #[must_use]
    pub fn methods(&self) -> Vec<&'static str> {
        let mut methods: Vec<_> = self.handlers.keys().copied().collect();
        methods.sort_unstable();
        methods
    }

    /// Dispatch a request and build its response.
    ///
    /// Unknown methods answer with a method-not-found error and touch no
    /// state.
    pub async fn dispatch(&self, request: &Request) -> Response {
        let id = request.id.clone();
        let Some(handler) = self.handlers.get(request.method.as_str()) else {
            warn!(method = %request.method, "Unknown method");
            return Response::failure(id, RpcError::method_not_found(&request.method));
        };

        let start = Instant::now();
        let result = handler.handle(request).await;
        debug!(
            method = %request.method,
            ok = result.is_ok(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "Request handled"
        );

        match result {
            Ok(value) => Response::success(id, value),
            Err(error) => Response::failure(id, error),
        }
    }
}
