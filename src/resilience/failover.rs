//! Failover invoker.
//!
//! # Responsibilities
//! - Retry a delegate invoker up to `max_retries` times
//! - Bound every attempt by `slow_call_duration`
//! - Gate attempts through the keyed circuit breaker and record their outcome
//!
//! # Per-call algorithm
//! ```text
//! buffer body (once)
//! loop attempt in 0..=max_retries:
//!     reset endpoint reference + failure marker
//!     breaker open?           → 502 CIRCUIT_BREAKER_OPEN (delegate not called)
//!     delegate under timeout
//!         ok                  → record success/slow, return response
//!         failure | timeout   → record failure, next attempt
//! → 502 RETRIES_EXHAUSTED (message carries the last cause)
//! ```
//!
//! # Design Decisions
//! - No backoff between attempts; each attempt re-enters endpoint selection
//! - A timed-out attempt is dropped, never merged into a later attempt

use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use serde_json::Value;
use tokio::time::Instant;

use crate::config::FailoverConfig;
use crate::context::{ExecutionContext, ATTR_REQUEST_ENDPOINT};
use crate::error::{
    ExecutionFailure, ATTEMPT_TIMEOUT, CIRCUIT_BREAKER_OPEN, REQUEST_BODY_UNREADABLE,
    RETRIES_EXHAUSTED,
};
use crate::invoker::{InvokeFuture, Invoker};
use crate::observability::metrics;
use crate::resilience::registry::CircuitBreakerRegistry;
use crate::resilience::timeouts::with_timeout;

/// Decorates an invoker with retries, timeouts and circuit breaking.
#[derive(Debug)]
pub struct FailoverInvoker {
    delegate: Arc<dyn Invoker>,
    max_retries: u32,
    attempt_timeout: Duration,
    breakers: Arc<CircuitBreakerRegistry>,
}

impl FailoverInvoker {
    pub fn new(delegate: Arc<dyn Invoker>, config: &FailoverConfig, breakers: Arc<CircuitBreakerRegistry>) -> Self {
        Self {
            delegate,
            max_retries: config.max_retries,
            attempt_timeout: Duration::from_millis(config.slow_call_duration_ms),
            breakers,
        }
    }

    pub fn breakers(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.breakers
    }

    fn reset_attempt(ctx: &mut ExecutionContext, original_reference: &Option<Value>) {
        match original_reference {
            Some(reference) => ctx.set_attribute(ATTR_REQUEST_ENDPOINT, reference.clone()),
            None => {
                ctx.remove_attribute(ATTR_REQUEST_ENDPOINT);
            }
        }
        ctx.clear_failure();
        ctx.clear_endpoint();
    }
}

impl Invoker for FailoverInvoker {
    fn invoke<'a>(&'a self, ctx: &'a mut ExecutionContext) -> InvokeFuture<'a> {
        async move {
            if let Some(failure) = ctx.interruption() {
                return Err(failure.clone());
            }

            let api = self.breakers.api_id();
            let original_reference = ctx.attribute(ATTR_REQUEST_ENDPOINT).cloned();

            ctx.request_mut().buffer_body().await.map_err(|e| {
                ExecutionFailure::new(400)
                    .key(REQUEST_BODY_UNREADABLE)
                    .message(e.to_string())
            })?;

            let breaker = self.breakers.breaker_for(ctx);
            let mut last_failure: Option<ExecutionFailure> = None;

            for attempt in 0..=self.max_retries {
                Self::reset_attempt(ctx, &original_reference);

                let Some(permit) = breaker.try_acquire() else {
                    tracing::warn!(
                        request_id = %ctx.request_id(),
                        api = %api,
                        breaker_key = %breaker.key(),
                        attempt,
                        "Circuit breaker open, call rejected"
                    );
                    let failure = ExecutionFailure::bad_gateway(
                        CIRCUIT_BREAKER_OPEN,
                        format!("circuit breaker '{}' is open", breaker.key()),
                    );
                    ctx.set_failure(failure.clone());
                    return Err(failure);
                };

                metrics::record_failover_attempt(api);
                let started = Instant::now();

                let failure = match with_timeout(self.attempt_timeout, self.delegate.invoke(ctx)).await {
                    Ok(Ok(response)) => {
                        permit.on_success(started.elapsed());
                        return Ok(response);
                    }
                    Ok(Err(failure)) => {
                        permit.on_failure();
                        failure
                    }
                    Err(timeout) => {
                        permit.on_failure();
                        let failure = ExecutionFailure::bad_gateway(ATTEMPT_TIMEOUT, timeout.to_string());
                        ctx.set_failure(failure.clone());
                        failure
                    }
                };

                tracing::debug!(
                    request_id = %ctx.request_id(),
                    api = %api,
                    attempt,
                    remaining = self.max_retries - attempt,
                    key = %failure.key,
                    "Attempt failed"
                );

                if let Some(interruption) = ctx.interruption() {
                    return Err(interruption.clone());
                }
                last_failure = Some(failure);
            }

            let cause = last_failure.map(|f| f.to_string()).unwrap_or_default();
            tracing::warn!(
                request_id = %ctx.request_id(),
                api = %api,
                attempts = self.max_retries + 1,
                cause = %cause,
                "Retries exhausted"
            );
            let failure = ExecutionFailure::bad_gateway(
                RETRIES_EXHAUSTED,
                format!("{} attempts failed, last: {cause}", self.max_retries + 1),
            );
            ctx.set_failure(failure.clone());
            Err(failure)
        }
        .boxed()
    }
}
