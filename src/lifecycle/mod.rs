//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Deploy (deployment.rs):
//!     ApiDefinition → Validate → flows + registry + invoker chain → ApiDeployment
//!
//! Endpoint events (deployment.rs):
//!     on_deploy / on_undeploy → EndpointRegistry → RegistryEvent listeners
//!
//! Shutdown (shutdown.rs):
//!     trigger → health monitors exit
//! ```
//!
//! # Design Decisions
//! - Deployment fails fast: any invalid flow or endpoint rejects the API
//! - Undeploy releases every per-API structure (endpoints, breakers, patterns)

pub mod deployment;
pub mod shutdown;

pub use deployment::{ApiDeployment, ApiManager, DeploymentDeps};
pub use shutdown::Shutdown;
