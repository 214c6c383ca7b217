//! Execution context subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → request.rs (method, path-info, headers, replayable body)
//!     → execution.rs (attributes, selected endpoint, terminal state)
//!     → threaded by &mut through resolver and invokers
//! ```
//!
//! # Design Decisions
//! - One context per request, never shared between tasks
//! - Interruption is sticky: once set, every later stage short-circuits
//! - Internal attributes are kept apart from policy-visible attributes

pub mod execution;
pub mod request;

pub use execution::{
    ContextState, ExecutionContext, ATTR_API, ATTR_REQUEST_ENDPOINT, ATTR_SUBSCRIPTION_ID,
};
pub use request::GatewayRequest;
