//! Endpoint abstraction.
//!
//! # Responsibilities
//! - Represent a single backend target of an API
//! - Carry selection attributes (weight, primary/backup, group, tenants)
//! - Track availability, flipped by health signals with hysteresis

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use url::Url;

use crate::config::EndpointConfig;
use crate::error::DispatchError;

/// Group name used when an endpoint is built without one.
pub const DEFAULT_GROUP: &str = "default";

/// A single backend target.
#[derive(Debug)]
pub struct Endpoint {
    name: String,
    group: String,
    target: Url,
    weight: u32,
    primary: bool,
    tenants: Vec<String>,

    /// Flipped by health signals. Unavailable endpoints are never selected.
    available: AtomicBool,
    /// Consecutive failure count.
    consecutive_failures: AtomicUsize,
    /// Consecutive success count.
    consecutive_successes: AtomicUsize,
}

impl Endpoint {
    pub fn builder(name: impl Into<String>, target: impl Into<String>) -> EndpointBuilder {
        EndpointBuilder {
            name: name.into(),
            target: target.into(),
            group: DEFAULT_GROUP.to_string(),
            weight: 1,
            primary: true,
            tenants: Vec::new(),
        }
    }

    /// Build an endpoint from its definition within `group`.
    pub fn from_config(group: &str, config: &EndpointConfig) -> Result<Self, DispatchError> {
        Self::builder(&config.name, &config.target)
            .group(group)
            .weight(config.weight)
            .primary(!config.backup)
            .tenants(config.tenants.clone())
            .build()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn target(&self) -> &Url {
        &self.target
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    pub fn is_backup(&self) -> bool {
        !self.primary
    }

    pub fn tenants(&self) -> &[String] {
        &self.tenants
    }

    /// Returns true if the endpoint is deployed for `tenant`.
    /// Untenanted endpoints and tenantless gateways accept everything.
    pub fn serves_tenant(&self, tenant: Option<&str>) -> bool {
        match tenant {
            Some(tenant) if !self.tenants.is_empty() => self.tenants.iter().any(|t| t == tenant),
            _ => true,
        }
    }

    /// Returns true if `reference` names this endpoint or its group.
    pub fn matches_reference(&self, reference: &str) -> bool {
        self.name == reference || self.group == reference
    }

    // --- Availability ---

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    /// Force availability. Returns true if the value changed.
    pub fn set_available(&self, available: bool) -> bool {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.consecutive_successes.store(0, Ordering::Relaxed);
        self.available.swap(available, Ordering::AcqRel) != available
    }

    /// Report a successful check. Returns true if the endpoint became available.
    pub fn mark_success(&self, healthy_threshold: usize) -> bool {
        self.consecutive_failures.store(0, Ordering::Relaxed);

        if self.is_available() {
            return false;
        }

        let successes = self.consecutive_successes.fetch_add(1, Ordering::Relaxed) + 1;
        if successes >= healthy_threshold {
            self.consecutive_successes.store(0, Ordering::Relaxed);
            return !self.available.swap(true, Ordering::AcqRel);
        }
        false
    }

    /// Report a failed check. Returns true if the endpoint became unavailable.
    pub fn mark_failure(&self, unhealthy_threshold: usize) -> bool {
        self.consecutive_successes.store(0, Ordering::Relaxed);

        if !self.is_available() {
            return false;
        }

        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= unhealthy_threshold {
            self.consecutive_failures.store(0, Ordering::Relaxed);
            return self.available.swap(false, Ordering::AcqRel);
        }
        false
    }
}

/// Builder for [`Endpoint`].
#[derive(Debug, Clone)]
pub struct EndpointBuilder {
    name: String,
    target: String,
    group: String,
    weight: u32,
    primary: bool,
    tenants: Vec<String>,
}

impl EndpointBuilder {
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    pub fn primary(mut self, primary: bool) -> Self {
        self.primary = primary;
        self
    }

    pub fn backup(self) -> Self {
        self.primary(false)
    }

    pub fn tenants(mut self, tenants: Vec<String>) -> Self {
        self.tenants = tenants;
        self
    }

    pub fn build(self) -> Result<Endpoint, DispatchError> {
        let target = Url::parse(&self.target).map_err(|e| DispatchError::InvalidTarget {
            endpoint: self.name.clone(),
            target: self.target.clone(),
            reason: e.to_string(),
        })?;

        Ok(Endpoint {
            name: self.name,
            group: self.group,
            target,
            weight: self.weight,
            primary: self.primary,
            tenants: self.tenants,
            available: AtomicBool::new(true),
            consecutive_failures: AtomicUsize::new(0),
            consecutive_successes: AtomicUsize::new(0),
        })
    }
}
