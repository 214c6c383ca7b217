//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to backend:
//!     → failover.rs (attempt loop, body replay, endpoint reset)
//!     → registry.rs (breaker for the API or the subscription)
//!     → circuit_breaker.rs (permit, or fail fast when open)
//!     → timeouts.rs (bound the attempt by the slow-call duration)
//!     → outcome recorded on the breaker
//! ```
//!
//! # Design Decisions
//! - Every attempt has a deadline
//! - Circuit breaker prevents cascading failures
//! - Resilience is a decorator around any invoker

pub mod circuit_breaker;
pub mod failover;
pub mod registry;
pub mod timeouts;

pub use circuit_breaker::{
    BreakerSettings, CallPermit, CircuitBreaker, CircuitState, FAILURE_RATE_THRESHOLD,
    SLOW_CALL_RATE_THRESHOLD,
};
pub use failover::FailoverInvoker;
pub use registry::{BreakerScope, CircuitBreakerRegistry};
pub use timeouts::{with_timeout, AttemptTimeout};
