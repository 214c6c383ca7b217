//! Failure taxonomy for the dispatch core.
//!
//! # Responsibilities
//! - Define the single externally-visible failure shape (`ExecutionFailure`)
//! - Name the failure keys used to recover the root cause for diagnostics
//! - Define deploy-time errors (malformed flows, invalid endpoints)
//!
//! # Design Decisions
//! - Request-time failures are values, never panics
//! - Every backend-reachability failure is a 502; only the key differs
//! - Deploy-time errors are fatal for the deployment, not for requests

use thiserror::Error;

/// No viable endpoint in the registry.
pub const NO_ENDPOINT_AVAILABLE: &str = "NO_ENDPOINT_AVAILABLE";
/// The circuit breaker rejected the call without reaching the backend.
pub const CIRCUIT_BREAKER_OPEN: &str = "CIRCUIT_BREAKER_OPEN";
/// A single attempt exceeded the slow-call duration.
pub const ATTEMPT_TIMEOUT: &str = "ATTEMPT_TIMEOUT";
/// Every attempt allowed by the failover configuration failed.
pub const RETRIES_EXHAUSTED: &str = "RETRIES_EXHAUSTED";
/// The backend transport failed (connection refused, reset, protocol error).
pub const BACKEND_ERROR: &str = "BACKEND_ERROR";
/// The request body could not be read for buffering.
pub const REQUEST_BODY_UNREADABLE: &str = "REQUEST_BODY_UNREADABLE";
/// The execution was interrupted before reaching the backend.
pub const REQUEST_INTERRUPTED: &str = "REQUEST_INTERRUPTED";

/// Terminal failure of a request execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{status_code} {key}: {message}")]
pub struct ExecutionFailure {
    /// HTTP status code returned to the client.
    pub status_code: u16,
    /// Machine-readable failure key.
    pub key: String,
    /// Human-readable message.
    pub message: String,
}

impl ExecutionFailure {
    /// Create a failure with the given status code and no key.
    pub fn new(status_code: u16) -> Self {
        Self {
            status_code,
            key: String::new(),
            message: String::new(),
        }
    }

    /// A 502-class failure carrying `key`.
    pub fn bad_gateway(key: &str, message: impl Into<String>) -> Self {
        Self::new(502).key(key).message(message)
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Returns true if this failure was produced with the given key.
    pub fn is(&self, key: &str) -> bool {
        self.key == key
    }
}

/// Errors raised while deploying an API.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A selector path could not be compiled into a pattern.
    #[error("invalid path pattern '{path}': {reason}")]
    InvalidPattern { path: String, reason: String },

    /// An HTTP selector lists a method that is not a valid HTTP token.
    #[error("flow '{flow}' has an invalid method '{method}'")]
    InvalidMethod { flow: String, method: String },

    /// A flow declares more than one selector of the same kind.
    #[error("flow '{flow}' declares more than one {kind} selector")]
    DuplicateSelector { flow: String, kind: &'static str },

    /// An endpoint target is not a valid URL.
    #[error("endpoint '{endpoint}' has an invalid target '{target}': {reason}")]
    InvalidTarget {
        endpoint: String,
        target: String,
        reason: String,
    },

    /// The API definition failed semantic validation.
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}
