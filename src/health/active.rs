//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every endpoint of an API
//! - Flip endpoint availability with hysteresis

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderValue, Method};
use tokio::sync::broadcast;
use tokio::time;

use crate::config::HealthCheckConfig;
use crate::invoker::{BackendRequest, Transport};
use crate::load_balancer::endpoint::Endpoint;
use crate::load_balancer::registry::EndpointRegistry;
use crate::observability::metrics;

#[derive(Debug)]
pub struct HealthMonitor {
    registry: Arc<EndpointRegistry>,
    transport: Arc<dyn Transport>,
    config: HealthCheckConfig,
}

impl HealthMonitor {
    pub fn new(registry: Arc<EndpointRegistry>, transport: Arc<dyn Transport>, config: HealthCheckConfig) -> Self {
        Self {
            registry,
            transport,
            config,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!(api = %self.registry.api_id(), "Active health checks disabled");
            return;
        }

        tracing::info!(
            api = %self.registry.api_id(),
            interval = self.config.interval_secs,
            path = %self.config.path,
            "Health monitor starting"
        );

        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs.max(1)));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!(api = %self.registry.api_id(), "Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every registered endpoint once.
    pub async fn check_all(&self) {
        let snapshot = self.registry.snapshot();

        for endpoint in snapshot.iter() {
            let healthy = self.probe(endpoint).await;

            if healthy {
                if endpoint.mark_success(self.config.healthy_threshold as usize) {
                    tracing::info!(api = %self.registry.api_id(), endpoint = %endpoint.name(), "Endpoint available");
                }
            } else if endpoint.mark_failure(self.config.unhealthy_threshold as usize) {
                tracing::warn!(api = %self.registry.api_id(), endpoint = %endpoint.name(), "Endpoint unavailable");
            }

            metrics::record_endpoint_health(self.registry.api_id(), endpoint.name(), endpoint.is_available());
        }
    }

    async fn probe(&self, endpoint: &Endpoint) -> bool {
        let mut request = BackendRequest::new(Method::GET, self.config.path.clone());
        request
            .headers
            .insert(header::USER_AGENT, HeaderValue::from_static("gateway-dispatch-health-check"));

        let timeout = Duration::from_millis(self.config.timeout_ms);
        match time::timeout(timeout, self.transport.send(endpoint, request)).await {
            Ok(Ok(response)) => {
                let success = response.status.is_success();
                if !success {
                    tracing::warn!(endpoint = %endpoint.name(), status = %response.status, "Health check failed: non-success status");
                }
                success
            }
            Ok(Err(e)) => {
                tracing::warn!(endpoint = %endpoint.name(), error = %e, "Health check failed: connection error");
                false
            }
            Err(_) => {
                tracing::warn!(endpoint = %endpoint.name(), "Health check failed: timeout");
                false
            }
        }
    }
}
