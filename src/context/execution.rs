//! Per-request execution context.
//!
//! # States
//! ```text
//! Active → Interrupted(failure)
//! Active → Completed(status)
//! ```
//! Both transitions are terminal: the first one wins, later ones are ignored.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use uuid::Uuid;

use crate::context::request::GatewayRequest;
use crate::error::{ExecutionFailure, REQUEST_INTERRUPTED};
use crate::load_balancer::endpoint::Endpoint;

/// API id the request is dispatched to.
pub const ATTR_API: &str = "api";
/// Subscription id of the caller. Keys per-subscription circuit breakers.
pub const ATTR_SUBSCRIPTION_ID: &str = "subscription";
/// Endpoint or endpoint group name the request should be routed to.
pub const ATTR_REQUEST_ENDPOINT: &str = "request.endpoint";

/// Lifecycle state of an execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextState {
    Active,
    Interrupted(ExecutionFailure),
    Completed { status_code: u16 },
}

/// Carrier of per-request state through every dispatch stage.
#[derive(Debug)]
pub struct ExecutionContext {
    request_id: Uuid,
    started_at: Instant,
    request: GatewayRequest,
    attributes: HashMap<String, Value>,
    internal_attributes: HashMap<String, Value>,
    endpoint: Option<Arc<Endpoint>>,
    failure: Option<ExecutionFailure>,
    state: ContextState,
}

impl ExecutionContext {
    pub fn new(request: GatewayRequest) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            started_at: Instant::now(),
            request,
            attributes: HashMap::new(),
            internal_attributes: HashMap::new(),
            endpoint: None,
            failure: None,
            state: ContextState::Active,
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_attribute(key, value);
        self
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn request(&self) -> &GatewayRequest {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut GatewayRequest {
        &mut self.request
    }

    // --- Attributes ---

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Attribute value when it is a JSON string.
    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    pub fn remove_attribute(&mut self, key: &str) -> Option<Value> {
        self.attributes.remove(key)
    }

    pub fn attributes(&self) -> &HashMap<String, Value> {
        &self.attributes
    }

    /// Attributes whose key starts with `prefix`.
    pub fn attributes_with_prefix(&self, prefix: &str) -> HashMap<&str, &Value> {
        self.attributes
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.as_str(), v))
            .collect()
    }

    // --- Internal attributes (never exposed to policies) ---

    pub fn set_internal_attribute(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.internal_attributes.insert(key.into(), value.into());
    }

    pub fn internal_attribute(&self, key: &str) -> Option<&Value> {
        self.internal_attributes.get(key)
    }

    pub fn remove_internal_attribute(&mut self, key: &str) -> Option<Value> {
        self.internal_attributes.remove(key)
    }

    pub fn internal_attributes(&self) -> &HashMap<String, Value> {
        &self.internal_attributes
    }

    /// Endpoint the current attempt is routed to.
    pub fn endpoint(&self) -> Option<&Arc<Endpoint>> {
        self.endpoint.as_ref()
    }

    pub fn set_endpoint(&mut self, endpoint: Arc<Endpoint>) {
        self.endpoint = Some(endpoint);
    }

    pub fn clear_endpoint(&mut self) {
        self.endpoint = None;
    }

    /// Failure recorded by the last attempt, if any.
    pub fn failure(&self) -> Option<&ExecutionFailure> {
        self.failure.as_ref()
    }

    pub fn set_failure(&mut self, failure: ExecutionFailure) {
        self.failure = Some(failure);
    }

    pub fn clear_failure(&mut self) {
        self.failure = None;
    }

    // --- Lifecycle ---

    pub fn state(&self) -> &ContextState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == ContextState::Active
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self.state, ContextState::Interrupted(_))
    }

    /// Failure the context was interrupted with.
    pub fn interruption(&self) -> Option<&ExecutionFailure> {
        match &self.state {
            ContextState::Interrupted(failure) => Some(failure),
            _ => None,
        }
    }

    /// Stop the execution. Returns false if it already reached a terminal state.
    /// A failure without a key is recorded as `REQUEST_INTERRUPTED`.
    pub fn interrupt(&mut self, mut failure: ExecutionFailure) -> bool {
        if !self.is_active() {
            return false;
        }
        if failure.key.is_empty() {
            failure.key = REQUEST_INTERRUPTED.to_string();
        }
        tracing::debug!(
            request_id = %self.request_id,
            status = failure.status_code,
            key = %failure.key,
            "Execution interrupted"
        );
        self.state = ContextState::Interrupted(failure);
        true
    }

    /// Mark the execution as completed. Returns false if it already reached a terminal state.
    pub fn complete(&mut self, status_code: u16) -> bool {
        if !self.is_active() {
            return false;
        }
        self.state = ContextState::Completed { status_code };
        true
    }
}
