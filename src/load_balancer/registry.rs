//! Endpoint registry.
//!
//! # Responsibilities
//! - Hold the live endpoint set of one API
//! - Apply deploy/undeploy lifecycle events
//! - Answer candidate queries (availability, reference, tenant, primary/backup)
//! - Notify listeners of additions and removals
//!
//! # Design Decisions
//! - Copy-on-write snapshot (`ArcSwap`): readers never block and never see
//!   a partially-updated set
//! - Backups are only candidates when no primary is available

use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::broadcast;

use crate::load_balancer::endpoint::Endpoint;
use crate::observability::metrics;

const EVENT_CAPACITY: usize = 64;

/// Registry change notification.
#[derive(Debug, Clone)]
pub enum RegistryEvent {
    Added(Arc<Endpoint>),
    Removed(Arc<Endpoint>),
}

/// Filter applied to candidate queries.
#[derive(Debug, Clone, Default)]
pub struct EndpointCriteria {
    /// Endpoint name or group name. `None` selects every endpoint.
    pub reference: Option<String>,
    /// Tenant of the gateway. `None` accepts every endpoint.
    pub tenant: Option<String>,
}

impl EndpointCriteria {
    pub fn reference(reference: impl Into<String>) -> Self {
        Self {
            reference: Some(reference.into()),
            tenant: None,
        }
    }

    fn accepts(&self, endpoint: &Endpoint) -> bool {
        self.reference
            .as_deref()
            .map_or(true, |r| endpoint.matches_reference(r))
            && endpoint.serves_tenant(self.tenant.as_deref())
    }
}

/// Live endpoint set of one API.
#[derive(Debug)]
pub struct EndpointRegistry {
    api_id: String,
    endpoints: ArcSwap<Vec<Arc<Endpoint>>>,
    events: broadcast::Sender<RegistryEvent>,
}

impl EndpointRegistry {
    /// Create an empty registry.
    pub fn new(api_id: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            api_id: api_id.into(),
            endpoints: ArcSwap::from_pointee(Vec::new()),
            events,
        }
    }

    /// Create a registry with an initial endpoint set, in declaration order.
    pub fn with_endpoints(api_id: impl Into<String>, endpoints: Vec<Arc<Endpoint>>) -> Self {
        let registry = Self::new(api_id);
        for endpoint in endpoints {
            registry.on_deploy(endpoint);
        }
        registry
    }

    pub fn api_id(&self) -> &str {
        &self.api_id
    }

    /// Subscribe to registry changes.
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    /// Register an endpoint. An endpoint with the same name is replaced in place.
    pub fn on_deploy(&self, endpoint: Arc<Endpoint>) {
        let previous = self.endpoints.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            let mut replaced = false;
            for e in current.iter() {
                if e.name() == endpoint.name() {
                    next.push(endpoint.clone());
                    replaced = true;
                } else {
                    next.push(e.clone());
                }
            }
            if !replaced {
                next.push(endpoint.clone());
            }
            next
        });

        if let Some(old) = previous.iter().find(|e| e.name() == endpoint.name()) {
            let _ = self.events.send(RegistryEvent::Removed(old.clone()));
        }
        tracing::info!(api = %self.api_id, endpoint = %endpoint.name(), group = %endpoint.group(), "Endpoint deployed");
        let _ = self.events.send(RegistryEvent::Added(endpoint));
        self.record_size();
    }

    /// Unregister an endpoint by name.
    pub fn on_undeploy(&self, name: &str) -> Option<Arc<Endpoint>> {
        let previous = self.endpoints.rcu(|current| {
            current
                .iter()
                .filter(|e| e.name() != name)
                .cloned()
                .collect::<Vec<_>>()
        });

        let removed = previous.iter().find(|e| e.name() == name).cloned();
        match &removed {
            Some(endpoint) => {
                tracing::info!(api = %self.api_id, endpoint = %name, "Endpoint undeployed");
                let _ = self.events.send(RegistryEvent::Removed(endpoint.clone()));
                self.record_size();
            }
            None => {
                tracing::debug!(api = %self.api_id, endpoint = %name, "Undeploy of unknown endpoint ignored");
            }
        }
        removed
    }

    /// Remove every endpoint (API undeploy).
    pub fn clear(&self) {
        let previous = self.endpoints.swap(Arc::new(Vec::new()));
        for endpoint in previous.iter() {
            let _ = self.events.send(RegistryEvent::Removed(endpoint.clone()));
        }
        self.record_size();
    }

    pub fn get(&self, name: &str) -> Option<Arc<Endpoint>> {
        self.endpoints.load().iter().find(|e| e.name() == name).cloned()
    }

    /// Consistent view of every registered endpoint.
    pub fn snapshot(&self) -> Arc<Vec<Arc<Endpoint>>> {
        self.endpoints.load_full()
    }

    pub fn len(&self) -> usize {
        self.endpoints.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Available endpoints matching `criteria`, in registration order.
    /// Primaries win; backups are returned only when no primary is available.
    pub fn candidates(&self, criteria: &EndpointCriteria) -> Vec<Arc<Endpoint>> {
        let snapshot = self.endpoints.load();

        let (primaries, backups): (Vec<_>, Vec<_>) = snapshot
            .iter()
            .filter(|e| e.is_available() && criteria.accepts(e))
            .cloned()
            .partition(|e| e.is_primary());

        if primaries.is_empty() {
            backups
        } else {
            primaries
        }
    }

    fn record_size(&self) {
        metrics::record_endpoints_registered(&self.api_id, self.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(name: &str, group: &str, backup: bool) -> Arc<Endpoint> {
        Arc::new(
            Endpoint::builder(name, "http://127.0.0.1:3000")
                .group(group)
                .primary(!backup)
                .build()
                .unwrap(),
        )
    }

    fn names(endpoints: &[Arc<Endpoint>]) -> Vec<&str> {
        endpoints.iter().map(|e| e.name()).collect()
    }

    #[test]
    fn test_unavailable_excluded() {
        let registry = EndpointRegistry::with_endpoints(
            "api",
            vec![endpoint("a", "default", false), endpoint("b", "default", false)],
        );
        registry.get("a").unwrap().set_available(false);

        let candidates = registry.candidates(&EndpointCriteria::default());
        assert_eq!(names(&candidates), vec!["b"]);
    }

    #[test]
    fn test_backup_only_without_primary() {
        let registry = EndpointRegistry::with_endpoints(
            "api",
            vec![endpoint("primary", "default", false), endpoint("backup", "default", true)],
        );
        let all = EndpointCriteria::default();
        assert_eq!(names(&registry.candidates(&all)), vec!["primary"]);

        registry.get("primary").unwrap().set_available(false);
        assert_eq!(names(&registry.candidates(&all)), vec!["backup"]);

        registry.get("primary").unwrap().set_available(true);
        assert_eq!(names(&registry.candidates(&all)), vec!["primary"]);
    }

    #[test]
    fn test_criteria_reference() {
        let registry = EndpointRegistry::with_endpoints(
            "api",
            vec![
                endpoint("a", "eu", false),
                endpoint("b", "eu", false),
                endpoint("c", "us", false),
            ],
        );

        assert_eq!(names(&registry.candidates(&EndpointCriteria::reference("eu"))), vec!["a", "b"]);
        assert_eq!(names(&registry.candidates(&EndpointCriteria::reference("c"))), vec!["c"]);
        assert!(registry.candidates(&EndpointCriteria::reference("unknown")).is_empty());
    }

    #[test]
    fn test_redeploy_replaces_in_place() {
        let registry = EndpointRegistry::with_endpoints(
            "api",
            vec![endpoint("a", "default", false), endpoint("b", "default", false)],
        );
        let mut events = registry.subscribe();

        registry.on_deploy(endpoint("a", "other", false));
        assert_eq!(registry.len(), 2);
        assert_eq!(names(&registry.snapshot()), vec!["a", "b"]);
        assert_eq!(registry.get("a").unwrap().group(), "other");

        assert!(matches!(events.try_recv(), Ok(RegistryEvent::Removed(e)) if e.group() == "default"));
        assert!(matches!(events.try_recv(), Ok(RegistryEvent::Added(e)) if e.group() == "other"));
    }

    #[test]
    fn test_undeploy_notifies() {
        let registry = EndpointRegistry::with_endpoints("api", vec![endpoint("a", "default", false)]);
        let mut events = registry.subscribe();

        assert!(registry.on_undeploy("missing").is_none());
        assert!(registry.on_undeploy("a").is_some());
        assert!(registry.is_empty());
        assert!(matches!(events.try_recv(), Ok(RegistryEvent::Removed(e)) if e.name() == "a"));
    }

    #[test]
    fn test_snapshot_is_stable() {
        let registry = EndpointRegistry::with_endpoints("api", vec![endpoint("a", "default", false)]);
        let snapshot = registry.snapshot();
        registry.on_deploy(endpoint("b", "default", false));
        registry.clear();

        assert_eq!(names(&snapshot), vec!["a"]);
        assert!(registry.is_empty());
    }
}
