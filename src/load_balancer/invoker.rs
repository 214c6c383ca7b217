//! Load-balancing invoker.
//!
//! # Responsibilities
//! - Query the registry for candidates matching the request's endpoint reference
//! - Select one endpoint with the API's algorithm and attribute it to the context
//! - Issue the backend call through the transport
//!
//! # Design Decisions
//! - No candidate fails immediately with a 502; retrying is failover's job
//! - Transport errors are reported as `BACKEND_ERROR` failures
//! - Each candidate set (reference, primary or backup tier) keeps its own
//!   algorithm state, so interleaved references never skew each other's rotation

use std::sync::Arc;

use dashmap::DashMap;
use futures_util::FutureExt;

use crate::config::LoadBalancerType;
use crate::context::{ExecutionContext, ATTR_REQUEST_ENDPOINT};
use crate::error::{ExecutionFailure, BACKEND_ERROR, NO_ENDPOINT_AVAILABLE, REQUEST_BODY_UNREADABLE};
use crate::invoker::{InvokeFuture, Invoker, Transport};
use crate::load_balancer::endpoint::Endpoint;
use crate::load_balancer::registry::{EndpointCriteria, EndpointRegistry};
use crate::load_balancer::{LoadBalancer, Strategy};
use crate::observability::metrics;

/// Identifies one candidate set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SelectionKey {
    reference: Option<String>,
    backup: bool,
}

/// Selects an endpoint and calls it.
#[derive(Debug)]
pub struct LoadBalancingInvoker {
    registry: Arc<EndpointRegistry>,
    kind: LoadBalancerType,
    strategies: DashMap<SelectionKey, Arc<Strategy>>,
    transport: Arc<dyn Transport>,
    tenant: Option<String>,
}

impl LoadBalancingInvoker {
    pub fn new(
        registry: Arc<EndpointRegistry>,
        kind: LoadBalancerType,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            registry,
            kind,
            strategies: DashMap::new(),
            transport,
            tenant: None,
        }
    }

    /// Restrict selection to endpoints serving `tenant`.
    pub fn with_tenant(mut self, tenant: Option<String>) -> Self {
        self.tenant = tenant;
        self
    }

    pub fn registry(&self) -> &Arc<EndpointRegistry> {
        &self.registry
    }

    pub fn kind(&self) -> LoadBalancerType {
        self.kind
    }

    /// Pick the endpoint for this request without calling it.
    pub fn select(&self, ctx: &ExecutionContext) -> Option<Arc<Endpoint>> {
        let criteria = EndpointCriteria {
            reference: ctx.attribute_str(ATTR_REQUEST_ENDPOINT).map(str::to_string),
            tenant: self.tenant.clone(),
        };
        let candidates = self.registry.candidates(&criteria);
        let first = candidates.first()?;

        let key = SelectionKey {
            reference: criteria.reference,
            backup: !first.is_primary(),
        };
        self.strategy_for(key).next_endpoint(&candidates)
    }

    fn strategy_for(&self, key: SelectionKey) -> Arc<Strategy> {
        if let Some(strategy) = self.strategies.get(&key) {
            return strategy.clone();
        }
        let kind = self.kind;
        self.strategies
            .entry(key)
            .or_insert_with(|| Arc::new(Strategy::from_type(kind)))
            .clone()
    }
}

impl Invoker for LoadBalancingInvoker {
    fn invoke<'a>(&'a self, ctx: &'a mut ExecutionContext) -> InvokeFuture<'a> {
        async move {
            if let Some(failure) = ctx.interruption() {
                return Err(failure.clone());
            }

            let api = self.registry.api_id();
            let Some(endpoint) = self.select(ctx) else {
                tracing::warn!(
                    request_id = %ctx.request_id(),
                    api = %api,
                    reference = ?ctx.attribute_str(ATTR_REQUEST_ENDPOINT),
                    "No endpoint available"
                );
                metrics::record_endpoint_unavailable(api);
                let failure = ExecutionFailure::bad_gateway(
                    NO_ENDPOINT_AVAILABLE,
                    format!("no endpoint available for api '{api}'"),
                );
                ctx.set_failure(failure.clone());
                return Err(failure);
            };

            tracing::debug!(
                request_id = %ctx.request_id(),
                api = %api,
                endpoint = %endpoint.name(),
                "Endpoint selected"
            );
            metrics::record_endpoint_selected(api, endpoint.name());
            ctx.set_endpoint(endpoint.clone());

            ctx.request_mut().buffer_body().await.map_err(|e| {
                ExecutionFailure::new(400)
                    .key(REQUEST_BODY_UNREADABLE)
                    .message(e.to_string())
            })?;
            let request = ctx.request().to_backend_request();

            match self.transport.send(&endpoint, request).await {
                Ok(response) => Ok(response),
                Err(e) => {
                    tracing::debug!(
                        request_id = %ctx.request_id(),
                        endpoint = %endpoint.name(),
                        error = %e,
                        "Backend call failed"
                    );
                    let failure = ExecutionFailure::bad_gateway(BACKEND_ERROR, e.to_string());
                    ctx.set_failure(failure.clone());
                    Err(failure)
                }
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::GatewayRequest;
    use crate::invoker::{BackendRequest, BackendResponse, TransportError, TransportFuture};
    use axum::http::{Method, StatusCode};
    use std::sync::Mutex;

    /// Records which endpoints were called; fails for names listed in `down`.
    #[derive(Debug, Default)]
    struct RecordingTransport {
        calls: Mutex<Vec<(String, BackendRequest)>>,
        down: Vec<&'static str>,
    }

    impl Transport for RecordingTransport {
        fn send<'a>(&'a self, endpoint: &'a Endpoint, request: BackendRequest) -> TransportFuture<'a> {
            self.calls
                .lock()
                .unwrap()
                .push((endpoint.name().to_string(), request));
            let down = self.down.iter().any(|d| *d == endpoint.name());
            let name = endpoint.name().to_string();
            async move {
                if down {
                    Err(TransportError::Connect {
                        endpoint: name,
                        reason: "connection refused".into(),
                    })
                } else {
                    Ok(BackendResponse::new(StatusCode::OK).with_body(name))
                }
            }
            .boxed()
        }
    }

    fn registry(names: &[&str]) -> Arc<EndpointRegistry> {
        let endpoints = names
            .iter()
            .map(|n| {
                let (name, group) = n.split_once('@').unwrap_or((*n, "default"));
                Arc::new(
                    Endpoint::builder(name, "http://127.0.0.1:3000")
                        .group(group)
                        .build()
                        .unwrap(),
                )
            })
            .collect();
        Arc::new(EndpointRegistry::with_endpoints("api", endpoints))
    }

    fn invoker(registry: Arc<EndpointRegistry>, transport: Arc<RecordingTransport>) -> LoadBalancingInvoker {
        LoadBalancingInvoker::new(registry, LoadBalancerType::RoundRobin, transport)
    }

    fn context() -> ExecutionContext {
        ExecutionContext::new(GatewayRequest::new(Method::POST, "/orders").with_body("{}"))
    }

    #[tokio::test]
    async fn test_invokes_selected_endpoint() {
        let transport = Arc::new(RecordingTransport::default());
        let lb = invoker(registry(&["a", "b"]), transport.clone());

        let mut ctx = context();
        let response = lb.invoke(&mut ctx).await.unwrap();
        assert_eq!(response.body, "a");
        assert_eq!(ctx.endpoint().unwrap().name(), "a");

        let response = lb.invoke(&mut ctx).await.unwrap();
        assert_eq!(response.body, "b");

        let calls = transport.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1.path, "/orders");
        assert_eq!(calls[0].1.body, "{}");
    }

    #[tokio::test]
    async fn test_no_endpoint_is_bad_gateway() {
        let transport = Arc::new(RecordingTransport::default());
        let registry = registry(&["a"]);
        registry.get("a").unwrap().set_available(false);
        let lb = invoker(registry, transport.clone());

        let mut ctx = context();
        let failure = lb.invoke(&mut ctx).await.unwrap_err();
        assert_eq!(failure.status_code, 502);
        assert!(failure.is(NO_ENDPOINT_AVAILABLE));
        assert_eq!(ctx.failure(), Some(&failure));
        assert!(transport.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_request_endpoint_reference() {
        let transport = Arc::new(RecordingTransport::default());
        let lb = invoker(registry(&["a@eu", "b@us", "c@us"]), transport.clone());

        let mut ctx = context().with_attribute(ATTR_REQUEST_ENDPOINT, "us");
        for _ in 0..4 {
            lb.invoke(&mut ctx).await.unwrap();
        }
        let called: Vec<_> = transport
            .calls
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect();
        assert_eq!(called, vec!["b", "c", "b", "c"]);
    }

    fn called(transport: &RecordingTransport) -> Vec<String> {
        transport
            .calls
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    #[tokio::test]
    async fn test_interleaved_references_rotate_independently() {
        let transport = Arc::new(RecordingTransport::default());
        let lb = invoker(registry(&["a@eu", "b@eu", "c@us", "d@us"]), transport.clone());

        for i in 0..8 {
            let group = if i % 2 == 0 { "eu" } else { "us" };
            let mut ctx = context().with_attribute(ATTR_REQUEST_ENDPOINT, group);
            lb.invoke(&mut ctx).await.unwrap();
        }
        assert_eq!(called(&transport), vec!["a", "c", "b", "d", "a", "c", "b", "d"]);
    }

    #[tokio::test]
    async fn test_interleaved_references_keep_weights() {
        let transport = Arc::new(RecordingTransport::default());
        let endpoint = |name: &str, group: &str, weight: u32| {
            Arc::new(
                Endpoint::builder(name, "http://127.0.0.1:3000")
                    .group(group)
                    .weight(weight)
                    .build()
                    .unwrap(),
            )
        };
        let registry = Arc::new(EndpointRegistry::with_endpoints(
            "api",
            vec![endpoint("a", "eu", 3), endpoint("b", "eu", 1), endpoint("c", "us", 1)],
        ));
        let lb = LoadBalancingInvoker::new(registry, LoadBalancerType::WeightedRoundRobin, transport.clone());

        for i in 0..8 {
            let group = if i % 2 == 0 { "eu" } else { "us" };
            let mut ctx = context().with_attribute(ATTR_REQUEST_ENDPOINT, group);
            lb.invoke(&mut ctx).await.unwrap();
        }
        let eu: Vec<_> = called(&transport).into_iter().filter(|n| n != "c").collect();
        assert_eq!(eu, vec!["a", "a", "b", "a"]);
    }

    #[tokio::test]
    async fn test_backup_tier_has_own_rotation() {
        let transport = Arc::new(RecordingTransport::default());
        let endpoint = |name: &str, backup: bool| {
            Arc::new(
                Endpoint::builder(name, "http://127.0.0.1:3000")
                    .primary(!backup)
                    .build()
                    .unwrap(),
            )
        };
        let registry = Arc::new(EndpointRegistry::with_endpoints(
            "api",
            vec![endpoint("p1", false), endpoint("p2", false), endpoint("b1", true), endpoint("b2", true)],
        ));
        let lb = invoker(registry.clone(), transport.clone());

        lb.invoke(&mut context()).await.unwrap();
        registry.get("p1").unwrap().set_available(false);
        registry.get("p2").unwrap().set_available(false);
        lb.invoke(&mut context()).await.unwrap();
        lb.invoke(&mut context()).await.unwrap();

        assert_eq!(called(&transport), vec!["p1", "b1", "b2"]);
    }

    #[tokio::test]
    async fn test_transport_error_is_backend_error() {
        let transport = Arc::new(RecordingTransport {
            down: vec!["a"],
            ..Default::default()
        });
        let lb = invoker(registry(&["a"]), transport);

        let mut ctx = context();
        let failure = lb.invoke(&mut ctx).await.unwrap_err();
        assert!(failure.is(BACKEND_ERROR));
        assert_eq!(failure.status_code, 502);
    }

    #[tokio::test]
    async fn test_interrupted_context_short_circuits() {
        let transport = Arc::new(RecordingTransport::default());
        let lb = invoker(registry(&["a"]), transport.clone());

        let mut ctx = context();
        ctx.interrupt(ExecutionFailure::new(403).key("FORBIDDEN"));
        let failure = lb.invoke(&mut ctx).await.unwrap_err();
        assert_eq!(failure.status_code, 403);
        assert!(transport.calls.lock().unwrap().is_empty());
    }
}
