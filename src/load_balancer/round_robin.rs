//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancer::{endpoint::Endpoint, LoadBalancer};

/// Round-robin selector.
/// Stores an internal cursor advanced exactly once per selection.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursor: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for RoundRobin {
    fn next_endpoint(&self, candidates: &[Arc<Endpoint>]) -> Option<Arc<Endpoint>> {
        if candidates.is_empty() {
            return None;
        }

        let position = self.cursor.fetch_add(1, Ordering::Relaxed);
        Some(candidates[position % candidates.len()].clone())
    }
}
