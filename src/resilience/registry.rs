//! Keyed circuit breaker registry.
//!
//! # Responsibilities
//! - Resolve the breaker key of a call (API id, or subscription id)
//! - Create breakers lazily on first use, at most one per key
//!
//! # Design Decisions
//! - The scope is fixed at construction from `per_subscription`
//! - Calls without a subscription fall back to the API-wide breaker
//! - Lives as long as the API deployment; `clear` drops every state

use std::sync::Arc;

use dashmap::DashMap;

use crate::config::FailoverConfig;
use crate::context::{ExecutionContext, ATTR_SUBSCRIPTION_ID};
use crate::resilience::circuit_breaker::{BreakerSettings, CircuitBreaker};

/// How breaker keys are derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerScope {
    /// One breaker for the whole API.
    Api,
    /// One breaker per subscription id.
    Subscription,
}

#[derive(Debug)]
pub struct CircuitBreakerRegistry {
    api_id: String,
    scope: BreakerScope,
    settings: BreakerSettings,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl CircuitBreakerRegistry {
    pub fn new(api_id: impl Into<String>, config: &FailoverConfig) -> Self {
        let scope = if config.per_subscription {
            BreakerScope::Subscription
        } else {
            BreakerScope::Api
        };
        Self {
            api_id: api_id.into(),
            scope,
            settings: BreakerSettings::from(config),
            breakers: DashMap::new(),
        }
    }

    pub fn api_id(&self) -> &str {
        &self.api_id
    }

    pub fn scope(&self) -> BreakerScope {
        self.scope
    }

    /// Breaker key for the call carried by `ctx`.
    pub fn key_for(&self, ctx: &ExecutionContext) -> String {
        match self.scope {
            BreakerScope::Api => self.api_id.clone(),
            BreakerScope::Subscription => ctx
                .attribute_str(ATTR_SUBSCRIPTION_ID)
                .map_or_else(|| self.api_id.clone(), str::to_string),
        }
    }

    /// Breaker for the call carried by `ctx`, created on first use.
    pub fn breaker_for(&self, ctx: &ExecutionContext) -> Arc<CircuitBreaker> {
        let key = self.key_for(ctx);
        if let Some(breaker) = self.breakers.get(&key) {
            return breaker.clone();
        }
        let created = key.clone();
        self.breakers
            .entry(key)
            .or_insert_with(|| {
                tracing::debug!(api = %self.api_id, breaker_key = %created, "Circuit breaker created");
                Arc::new(CircuitBreaker::new(created, self.settings))
            })
            .clone()
    }

    pub fn get(&self, key: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(key).map(|b| b.clone())
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    pub fn clear(&self) {
        self.breakers.clear();
    }
}
