//! Request-dispatch core of an API gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!   ExecutionContext (request + attributes)
//!          │
//!          ▼
//!   ┌──────────────┐   matching flows    ┌──────────────────────┐
//!   │   routing    │ ──────────────────▶ │ policy chain (host)  │
//!   │ FlowResolver │                     └──────────┬───────────┘
//!   └──────────────┘                                │ invoke
//!                                                   ▼
//!                                        ┌──────────────────────┐
//!                                        │ resilience           │
//!                                        │ FailoverInvoker      │
//!                                        │ (retry/timeout/cb)   │
//!                                        └──────────┬───────────┘
//!                                                   ▼
//!                                        ┌──────────────────────┐
//!                                        │ load_balancer        │
//!                                        │ LoadBalancingInvoker │
//!                                        │ + EndpointRegistry   │
//!                                        └──────────┬───────────┘
//!                                                   ▼
//!                                            Transport → backend
//! ```
//!
//! `lifecycle::ApiDeployment` wires these pieces per API.

pub mod config;
pub mod context;
pub mod el;
pub mod error;
pub mod health;
pub mod invoker;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod resilience;
pub mod routing;

pub use config::{ApiDefinition, GatewayConfig};
pub use context::{ExecutionContext, GatewayRequest};
pub use error::{DispatchError, ExecutionFailure};
pub use invoker::{Invoker, Transport};
pub use lifecycle::{ApiDeployment, ApiManager, DeploymentDeps, Shutdown};
