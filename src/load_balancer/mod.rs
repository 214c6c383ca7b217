//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Failover attempt → LoadBalancingInvoker
//!     → registry.rs (available candidates for the request's criteria)
//!     → Apply load balancing algorithm:
//!         - random.rs (uniform pick)
//!         - weighted_random.rs (pick proportional to weight)
//!         - round_robin.rs (rotate through candidates)
//!         - weighted_round_robin.rs (smooth weighted rotation)
//!     → Transport call to the selected endpoint
//! ```
//!
//! # Design Decisions
//! - Algorithms only see the available candidate set
//! - Algorithm selection per API, as a closed set of variants
//! - One algorithm instance per candidate set, created on first use
//! - Round-robin cursors are atomics; weighted rotation holds a short lock

pub mod endpoint;
pub mod invoker;
pub mod random;
pub mod registry;
pub mod round_robin;
pub mod weighted_random;
pub mod weighted_round_robin;

use std::sync::Arc;

use crate::config::LoadBalancerType;
use endpoint::Endpoint;

pub use invoker::LoadBalancingInvoker;
pub use registry::{EndpointCriteria, EndpointRegistry, RegistryEvent};

/// Trait for load balancing algorithms.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    /// Select one endpoint among `candidates`, or `None` if none is eligible.
    fn next_endpoint(&self, candidates: &[Arc<Endpoint>]) -> Option<Arc<Endpoint>>;
}

/// The configured algorithm of an API.
#[derive(Debug)]
pub enum Strategy {
    Random(random::Random),
    WeightedRandom(weighted_random::WeightedRandom),
    RoundRobin(round_robin::RoundRobin),
    WeightedRoundRobin(weighted_round_robin::WeightedRoundRobin),
}

impl Strategy {
    pub fn from_type(kind: LoadBalancerType) -> Self {
        match kind {
            LoadBalancerType::Random => Self::Random(random::Random::new()),
            LoadBalancerType::WeightedRandom => {
                Self::WeightedRandom(weighted_random::WeightedRandom::new())
            }
            LoadBalancerType::RoundRobin => Self::RoundRobin(round_robin::RoundRobin::new()),
            LoadBalancerType::WeightedRoundRobin => {
                Self::WeightedRoundRobin(weighted_round_robin::WeightedRoundRobin::new())
            }
        }
    }

    pub fn kind(&self) -> LoadBalancerType {
        match self {
            Self::Random(_) => LoadBalancerType::Random,
            Self::WeightedRandom(_) => LoadBalancerType::WeightedRandom,
            Self::RoundRobin(_) => LoadBalancerType::RoundRobin,
            Self::WeightedRoundRobin(_) => LoadBalancerType::WeightedRoundRobin,
        }
    }
}

impl LoadBalancer for Strategy {
    fn next_endpoint(&self, candidates: &[Arc<Endpoint>]) -> Option<Arc<Endpoint>> {
        match self {
            Self::Random(lb) => lb.next_endpoint(candidates),
            Self::WeightedRandom(lb) => lb.next_endpoint(candidates),
            Self::RoundRobin(lb) => lb.next_endpoint(candidates),
            Self::WeightedRoundRobin(lb) => lb.next_endpoint(candidates),
        }
    }
}
