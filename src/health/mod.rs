//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → Probe each endpoint through the transport
//!     → Endpoint::mark_success / mark_failure
//!
//! Availability (load_balancer::endpoint):
//!     Available ←→ Unavailable
//!     With thresholds to prevent flapping
//! ```
//!
//! # Design Decisions
//! - State transitions require consecutive successes/failures
//! - Health state is per-endpoint, not per-API
//! - Unavailable endpoints drop out of candidate sets immediately

pub mod active;

pub use active::HealthMonitor;
