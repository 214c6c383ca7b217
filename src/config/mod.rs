//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! already-deserialized definitions (or TOML via loader.rs)
//!     → validation.rs (semantic checks)
//!     → ApiDefinition (validated, immutable)
//!     → lifecycle::deployment builds flows, registry and invokers from it
//! ```
//!
//! # Design Decisions
//! - Definitions are immutable once deployed; changes require a redeploy
//! - All fields have defaults to allow minimal definitions
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    ApiDefinition, EndpointConfig, EndpointGroupConfig, FailoverConfig, FlowConfig,
    GatewayConfig, HealthCheckConfig, LoadBalancerType, LoggingConfig, PathOperator,
    SelectorConfig, StepConfig,
};
pub use validation::{validate_api, validate_config, ValidationError};
