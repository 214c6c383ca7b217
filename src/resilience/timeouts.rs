//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap one backend attempt with a deadline
//! - Cancel the attempt cleanly on timeout
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - The wrapped future is dropped on expiry, so a late response is never observed
//! - Timeout errors are distinct from other errors

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("attempt timed out after {}ms", .0.as_millis())]
pub struct AttemptTimeout(pub Duration);

/// Run `future` with a deadline of `duration`.
pub async fn with_timeout<F>(duration: Duration, future: F) -> Result<F::Output, AttemptTimeout>
where
    F: Future,
{
    tokio::time::timeout(duration, future)
        .await
        .map_err(|_| AttemptTimeout(duration))
}
