//! Invoker capability.
//!
//! # Data Flow
//! ```text
//! request pipeline
//!     → FailoverInvoker (retry, timeout, circuit breaking)
//!     → LoadBalancingInvoker (endpoint selection)
//!     → Transport (backend call)
//! ```
//!
//! # Design Decisions
//! - Decorators hold the next invoker explicitly (`Arc<dyn Invoker>`)
//! - Futures are boxed so invokers stay object-safe; dropping one cancels the call
//! - Failures are `ExecutionFailure` values shared by every layer

pub mod transport;

use futures_util::future::BoxFuture;

use crate::context::ExecutionContext;
use crate::error::ExecutionFailure;
pub use transport::{
    BackendRequest, BackendResponse, HttpTransport, Transport, TransportError, TransportFuture,
};

pub type InvokeResult = Result<BackendResponse, ExecutionFailure>;
pub type InvokeFuture<'a> = BoxFuture<'a, InvokeResult>;

/// Routes a request to a backend and returns its response.
pub trait Invoker: Send + Sync + std::fmt::Debug {
    fn invoke<'a>(&'a self, ctx: &'a mut ExecutionContext) -> InvokeFuture<'a>;
}
