//! Weighted random load balancing strategy.

use std::sync::Arc;

use rand::Rng;

use crate::load_balancer::{endpoint::Endpoint, LoadBalancer};

/// Picks a candidate with probability proportional to its weight.
/// Zero-weight candidates are never picked.
#[derive(Debug, Default)]
pub struct WeightedRandom;

impl WeightedRandom {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for WeightedRandom {
    fn next_endpoint(&self, candidates: &[Arc<Endpoint>]) -> Option<Arc<Endpoint>> {
        let total: u64 = candidates.iter().map(|e| u64::from(e.weight())).sum();
        if total == 0 {
            return None;
        }

        let mut point = rand::thread_rng().gen_range(0..total);
        for endpoint in candidates {
            let weight = u64::from(endpoint.weight());
            if point < weight {
                return Some(endpoint.clone());
            }
            point -= weight;
        }
        None
    }
}
