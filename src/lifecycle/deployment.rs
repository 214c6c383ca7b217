//! API deployment.
//!
//! # Responsibilities
//! - Validate an API definition and build its runtime pieces
//! - Expose the two dispatch entry points: flow resolution and invocation
//! - Apply endpoint lifecycle hooks and tear everything down on undeploy
//!
//! # Data Flow
//! ```text
//! ApiDefinition
//!     → validate_api
//!     → flows (selector paths compiled once, malformed ones fail here)
//!     → EndpointRegistry (tenant-filtered endpoints of every group)
//!     → LoadBalancingInvoker
//!     → FailoverInvoker (only when failover is configured)
//! ```
//!
//! # Design Decisions
//! - A deployment is immutable; redeploying builds a new one
//! - Breaker and pattern state live and die with the deployment

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::{validate_api, validate_config, ApiDefinition, ConfigError, GatewayConfig};
use crate::context::{ExecutionContext, ATTR_API};
use crate::el::ExpressionEvaluator;
use crate::error::DispatchError;
use crate::health::HealthMonitor;
use crate::invoker::{InvokeResult, Invoker, Transport};
use crate::lifecycle::shutdown::Shutdown;
use crate::load_balancer::endpoint::Endpoint;
use crate::load_balancer::{EndpointRegistry, LoadBalancingInvoker};
use crate::resilience::{CircuitBreakerRegistry, FailoverInvoker};
use crate::routing::{Flow, FlowResolver, PathPatternCache};

/// Collaborators shared by every deployment.
#[derive(Debug, Clone)]
pub struct DeploymentDeps {
    pub transport: Arc<dyn Transport>,
    pub evaluator: Arc<dyn ExpressionEvaluator>,
    /// Tenant of this gateway.
    pub tenant: Option<String>,
}

impl DeploymentDeps {
    pub fn new(transport: Arc<dyn Transport>, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        Self {
            transport,
            evaluator,
            tenant: None,
        }
    }

    pub fn with_tenant(mut self, tenant: Option<String>) -> Self {
        self.tenant = tenant;
        self
    }
}

/// The runtime form of one deployed API.
#[derive(Debug)]
pub struct ApiDeployment {
    definition: ApiDefinition,
    flows: Vec<Arc<Flow>>,
    patterns: PathPatternCache,
    resolver: FlowResolver,
    registry: Arc<EndpointRegistry>,
    breakers: Option<Arc<CircuitBreakerRegistry>>,
    invoker: Arc<dyn Invoker>,
    transport: Arc<dyn Transport>,
    tenant: Option<String>,
}

impl ApiDeployment {
    pub fn deploy(definition: ApiDefinition, deps: &DeploymentDeps) -> Result<Self, DispatchError> {
        validate_api(&definition).map_err(ConfigError::Validation)?;

        let patterns = PathPatternCache::new();
        let flows = definition
            .flows
            .iter()
            .map(|flow| Flow::from_config(flow, &patterns).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;

        let registry = Arc::new(EndpointRegistry::new(definition.id.clone()));
        for group in &definition.endpoint_groups {
            for config in &group.endpoints {
                let endpoint = Endpoint::from_config(&group.name, config)?;
                if !endpoint.serves_tenant(deps.tenant.as_deref()) {
                    tracing::debug!(
                        api = %definition.id,
                        endpoint = %endpoint.name(),
                        tenant = ?deps.tenant,
                        "Endpoint skipped for tenant"
                    );
                    continue;
                }
                registry.on_deploy(Arc::new(endpoint));
            }
        }

        let load_balancer = LoadBalancingInvoker::new(
            registry.clone(),
            definition.load_balancer,
            deps.transport.clone(),
        )
        .with_tenant(deps.tenant.clone());

        let (invoker, breakers): (Arc<dyn Invoker>, _) = match &definition.failover {
            Some(failover) => {
                let breakers = Arc::new(CircuitBreakerRegistry::new(definition.id.clone(), failover));
                let invoker = FailoverInvoker::new(Arc::new(load_balancer), failover, breakers.clone());
                (Arc::new(invoker), Some(breakers))
            }
            None => (Arc::new(load_balancer), None),
        };

        tracing::info!(
            api = %definition.id,
            name = %definition.name,
            flows = flows.len(),
            endpoints = registry.len(),
            load_balancer = ?definition.load_balancer,
            failover = breakers.is_some(),
            "API deployed"
        );

        Ok(Self {
            resolver: FlowResolver::new(deps.evaluator.clone()),
            flows,
            patterns,
            registry,
            breakers,
            invoker,
            transport: deps.transport.clone(),
            tenant: deps.tenant.clone(),
            definition,
        })
    }

    pub fn id(&self) -> &str {
        &self.definition.id
    }

    pub fn definition(&self) -> &ApiDefinition {
        &self.definition
    }

    pub fn flows(&self) -> &[Arc<Flow>] {
        &self.flows
    }

    pub fn registry(&self) -> &Arc<EndpointRegistry> {
        &self.registry
    }

    pub fn breakers(&self) -> Option<&Arc<CircuitBreakerRegistry>> {
        self.breakers.as_ref()
    }

    /// Flows of this API applying to the request, in declaration order.
    pub async fn resolve_flows(&self, ctx: &ExecutionContext) -> Vec<Arc<Flow>> {
        self.resolver.resolve(ctx, &self.flows).await
    }

    /// Dispatch the request to a backend and record the terminal state on `ctx`.
    pub async fn invoke(&self, ctx: &mut ExecutionContext) -> InvokeResult {
        if ctx.attribute(ATTR_API).is_none() {
            ctx.set_attribute(ATTR_API, self.definition.id.clone());
        }

        let result = self.invoker.invoke(ctx).await;
        match &result {
            Ok(response) => {
                ctx.complete(response.status.as_u16());
            }
            Err(failure) => {
                ctx.interrupt(failure.clone());
            }
        }
        result
    }

    /// Lifecycle hook: register an endpoint. Returns false if it is not
    /// deployed for this gateway's tenant.
    pub fn on_deploy(&self, endpoint: Endpoint) -> bool {
        if !endpoint.serves_tenant(self.tenant.as_deref()) {
            return false;
        }
        self.registry.on_deploy(Arc::new(endpoint));
        true
    }

    /// Lifecycle hook: unregister an endpoint by name.
    pub fn on_undeploy(&self, name: &str) -> Option<Arc<Endpoint>> {
        self.registry.on_undeploy(name)
    }

    /// Start active health checks, if enabled for this API.
    pub fn spawn_health_monitor(&self, shutdown: broadcast::Receiver<()>) -> Option<JoinHandle<()>> {
        if !self.definition.health_check.enabled {
            return None;
        }
        let monitor = HealthMonitor::new(
            self.registry.clone(),
            self.transport.clone(),
            self.definition.health_check.clone(),
        );
        Some(tokio::spawn(monitor.run(shutdown)))
    }

    /// Drop endpoints, breaker states and compiled patterns.
    pub fn undeploy(&self) {
        self.registry.clear();
        if let Some(breakers) = &self.breakers {
            breakers.clear();
        }
        self.patterns.clear();
        tracing::info!(api = %self.definition.id, "API undeployed");
    }
}

/// Every API deployed on this gateway, by id.
#[derive(Debug)]
pub struct ApiManager {
    deps: DeploymentDeps,
    deployments: DashMap<String, Arc<ApiDeployment>>,
}

impl ApiManager {
    pub fn new(deps: DeploymentDeps) -> Self {
        Self {
            deps,
            deployments: DashMap::new(),
        }
    }

    /// Deploy every API of `config`. Nothing is deployed if validation fails.
    pub fn deploy_all(&self, config: &GatewayConfig) -> Result<usize, DispatchError> {
        validate_config(config).map_err(ConfigError::Validation)?;
        for api in &config.apis {
            self.deploy(api.clone())?;
        }
        Ok(config.apis.len())
    }

    /// Deploy an API, replacing (and undeploying) any previous deployment with the same id.
    pub fn deploy(&self, definition: ApiDefinition) -> Result<Arc<ApiDeployment>, DispatchError> {
        let deployment = Arc::new(ApiDeployment::deploy(definition, &self.deps)?);
        if let Some(previous) = self
            .deployments
            .insert(deployment.id().to_string(), deployment.clone())
        {
            previous.undeploy();
        }
        Ok(deployment)
    }

    pub fn get(&self, id: &str) -> Option<Arc<ApiDeployment>> {
        self.deployments.get(id).map(|d| d.clone())
    }

    pub fn undeploy(&self, id: &str) -> bool {
        match self.deployments.remove(id) {
            Some((_, deployment)) => {
                deployment.undeploy();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.deployments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deployments.is_empty()
    }

    /// Start health monitors of every deployed API.
    pub fn spawn_health_monitors(&self, shutdown: &Shutdown) -> Vec<JoinHandle<()>> {
        self.deployments
            .iter()
            .filter_map(|d| d.spawn_health_monitor(shutdown.subscribe()))
            .collect()
    }
}
