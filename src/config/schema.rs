//! Configuration schema definitions.
//!
//! API, flow and endpoint definitions arrive already deserialized. All types
//! derive Serde traits so hosts can feed them from any format; the bundled
//! loader reads TOML.

use serde::{Deserialize, Serialize};

/// Root configuration: the gateway-wide settings plus the deployed APIs.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Tenant this gateway serves. Endpoints restricted to other tenants are skipped.
    pub tenant: Option<String>,

    /// Logging settings.
    pub logging: LoggingConfig,

    /// API definitions to deploy.
    pub apis: Vec<ApiDefinition>,
}

/// Definition of a single API.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ApiDefinition {
    /// Unique API identifier.
    pub id: String,

    /// Display name for logging.
    pub name: String,

    /// Flows in declaration order.
    pub flows: Vec<FlowConfig>,

    /// Endpoint groups; the first group is the default one.
    pub endpoint_groups: Vec<EndpointGroupConfig>,

    /// Endpoint selection algorithm.
    pub load_balancer: LoadBalancerType,

    /// Retry, timeout and circuit breaking. Absent means no failover.
    pub failover: Option<FailoverConfig>,

    /// Active health checking of endpoints.
    pub health_check: HealthCheckConfig,
}

/// A named bundle of policies bound to match conditions.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FlowConfig {
    pub name: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub selectors: Vec<SelectorConfig>,

    /// Policies applied on the request phase.
    #[serde(default)]
    pub request: Vec<StepConfig>,

    /// Policies applied on the response phase.
    #[serde(default)]
    pub response: Vec<StepConfig>,
}

/// Selector gating whether a flow applies to a request.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SelectorConfig {
    /// HTTP method and path selector.
    Http {
        /// Accepted methods. Empty accepts every method.
        #[serde(default)]
        methods: Vec<String>,

        #[serde(default = "default_path")]
        path: String,

        #[serde(default, rename = "path_operator")]
        operator: PathOperator,
    },
    /// Boolean expression selector.
    Condition { condition: String },
}

/// How a selector path is compared to the request path.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PathOperator {
    /// The whole path must match.
    Equals,
    /// The path must start with the pattern, on a segment boundary.
    #[default]
    StartsWith,
}

/// A policy step. Opaque to the dispatch core.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct StepConfig {
    pub name: String,

    pub policy: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub configuration: serde_json::Value,
}

/// Group of endpoints sharing a name.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointGroupConfig {
    pub name: String,

    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
}

/// Backend endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointConfig {
    /// Unique endpoint name within the API.
    pub name: String,

    /// Target URI (e.g., "http://127.0.0.1:3000/api").
    pub target: String,

    /// Weight for weighted load balancing (default: 1).
    #[serde(default = "default_weight")]
    pub weight: u32,

    /// Backup endpoints only receive traffic when no primary is available.
    #[serde(default)]
    pub backup: bool,

    /// Tenants this endpoint is deployed for. Empty means every tenant.
    #[serde(default)]
    pub tenants: Vec<String>,
}

/// Endpoint selection algorithm.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadBalancerType {
    Random,
    WeightedRandom,
    #[default]
    RoundRobin,
    WeightedRoundRobin,
}

impl LoadBalancerType {
    /// Returns true for the algorithms that honor endpoint weights.
    pub fn is_weighted(&self) -> bool {
        matches!(self, Self::WeightedRandom | Self::WeightedRoundRobin)
    }
}

/// Failover configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct FailoverConfig {
    /// Attempts made after the first one.
    pub max_retries: u32,

    /// Sliding window size: number of calls before the breaker can evaluate.
    pub max_failures: u32,

    /// Per-attempt timeout and slow-call threshold in milliseconds.
    pub slow_call_duration_ms: u64,

    /// How long the breaker stays open, in milliseconds.
    pub open_state_duration_ms: u64,

    /// One breaker per subscription instead of one per API.
    pub per_subscription: bool,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            max_failures: 5,
            slow_call_duration_ms: 2000,
            open_state_duration_ms: 10_000,
            per_subscription: false,
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active health checks.
    pub enabled: bool,

    /// Health check interval in seconds.
    pub interval_secs: u64,

    /// Health check timeout in milliseconds.
    pub timeout_ms: u64,

    /// Path appended to the endpoint target when probing.
    pub path: String,

    /// Number of consecutive failures before marking unavailable.
    pub unhealthy_threshold: u32,

    /// Number of consecutive successes before marking available again.
    pub healthy_threshold: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 10,
            timeout_ms: 2000,
            path: "/health".to_string(),
            unhealthy_threshold: 3,
            healthy_threshold: 2,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive (trace, debug, info, warn, error).
    pub level: String,

    /// Colored output.
    pub ansi: bool,

    /// Include the event target in each line.
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            ansi: true,
            with_target: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_weight() -> u32 {
    1
}

fn default_path() -> String {
    "/".to_string()
}
