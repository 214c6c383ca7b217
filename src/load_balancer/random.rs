//! Uniform random load balancing strategy.

use std::sync::Arc;

use rand::seq::SliceRandom;

use crate::load_balancer::{endpoint::Endpoint, LoadBalancer};

/// Picks a candidate uniformly at random.
#[derive(Debug, Default)]
pub struct Random;

impl Random {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for Random {
    fn next_endpoint(&self, candidates: &[Arc<Endpoint>]) -> Option<Arc<Endpoint>> {
        candidates.choose(&mut rand::thread_rng()).cloned()
    }
}
