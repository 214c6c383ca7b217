//! Smooth weighted round-robin load balancing strategy.
//!
//! Over a cycle of `sum(weights)` selections every endpoint is picked exactly
//! `weight` times, interleaved rather than in bursts. The interleaving is the
//! classic smooth rotation: each round every endpoint gains its weight, the
//! highest current value wins and pays back the total.
//!
//! # Design Decisions
//! - The rotation runs online: O(candidates) per pick, no precomputed cycle
//! - Current weights are keyed by endpoint name and live under one short lock
//! - Endpoints that leave the candidate set drop their current weight

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::load_balancer::{endpoint::Endpoint, LoadBalancer};

/// Smooth weighted round-robin selector.
#[derive(Debug, Default)]
pub struct WeightedRoundRobin {
    current: Mutex<HashMap<String, i64>>,
}

impl WeightedRoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, i64>> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl LoadBalancer for WeightedRoundRobin {
    fn next_endpoint(&self, candidates: &[Arc<Endpoint>]) -> Option<Arc<Endpoint>> {
        let total: i64 = candidates.iter().map(|e| i64::from(e.weight())).sum();
        if total == 0 {
            return None;
        }

        let mut current = self.lock();
        let weighted = candidates.iter().filter(|e| e.weight() > 0).count();
        if current.len() != weighted
            || candidates
                .iter()
                .any(|e| e.weight() > 0 && !current.contains_key(e.name()))
        {
            current.retain(|name, _| candidates.iter().any(|e| e.name() == name.as_str()));
        }

        let mut best: Option<(usize, i64)> = None;
        for (i, endpoint) in candidates.iter().enumerate() {
            let weight = i64::from(endpoint.weight());
            if weight == 0 {
                continue;
            }
            let value = current.entry(endpoint.name().to_string()).or_insert(0);
            *value += weight;
            if best.map_or(true, |(_, top)| *value > top) {
                best = Some((i, *value));
            }
        }

        let (index, _) = best?;
        let winner = &candidates[index];
        if let Some(value) = current.get_mut(winner.name()) {
            *value -= total;
        }
        Some(winner.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(name: &str, weight: u32) -> Arc<Endpoint> {
        Arc::new(
            Endpoint::builder(name, "http://localhost")
                .weight(weight)
                .build()
                .unwrap(),
        )
    }

    fn pick(lb: &WeightedRoundRobin, candidates: &[Arc<Endpoint>], n: usize) -> Vec<String> {
        (0..n)
            .map(|_| lb.next_endpoint(candidates).unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn test_smooth_distribution() {
        let lb = WeightedRoundRobin::new();
        let candidates = vec![endpoint("a", 3), endpoint("b", 1)];

        let first = pick(&lb, &candidates, 4);
        assert_eq!(first, vec!["a", "a", "b", "a"]);

        // Every window of one cycle holds exactly the weights.
        let picks = pick(&lb, &candidates, 40);
        for window in picks.windows(4) {
            assert_eq!(window.iter().filter(|n| *n == "a").count(), 3);
            assert_eq!(window.iter().filter(|n| *n == "b").count(), 1);
        }
    }

    #[test]
    fn test_interleaves_instead_of_bursts() {
        let lb = WeightedRoundRobin::new();
        let candidates = vec![endpoint("a", 5), endpoint("b", 1), endpoint("c", 1)];
        let cycle = pick(&lb, &candidates, 7);

        assert_eq!(cycle.iter().filter(|n| *n == "a").count(), 5);
        assert_eq!(cycle.iter().filter(|n| *n == "b").count(), 1);
        assert_eq!(cycle.iter().filter(|n| *n == "c").count(), 1);
        assert_ne!(&cycle[..5], &["a", "a", "a", "a", "a"]);
    }

    #[test]
    fn test_common_factor_keeps_ratio() {
        let lb = WeightedRoundRobin::new();
        let candidates = vec![endpoint("a", 20), endpoint("b", 10)];
        let picks = pick(&lb, &candidates, 30);
        assert_eq!(picks.iter().filter(|n| *n == "a").count(), 20);
        assert_eq!(&picks[..3], &["a", "b", "a"]);
    }

    #[test]
    fn test_zero_weight_never_selected() {
        let lb = WeightedRoundRobin::new();
        let candidates = vec![endpoint("zero", 0), endpoint("a", 1), endpoint("b", 2)];
        let picks = pick(&lb, &candidates, 30);
        assert!(!picks.iter().any(|n| n == "zero"));
        assert!(lb.next_endpoint(&[endpoint("zero", 0)]).is_none());
    }

    #[test]
    fn test_candidate_change_resets_departed_state() {
        let lb = WeightedRoundRobin::new();
        let before = vec![endpoint("a", 3), endpoint("b", 1)];
        pick(&lb, &before, 2);

        let after = vec![endpoint("b", 1)];
        assert_eq!(pick(&lb, &after, 3), vec!["b", "b", "b"]);
        assert_eq!(lb.lock().len(), 1);
    }

    #[test]
    fn test_large_weights_pick_in_constant_space() {
        let lb = WeightedRoundRobin::new();
        let candidates = vec![endpoint("a", u32::MAX), endpoint("b", u32::MAX - 1)];

        let picks = pick(&lb, &candidates, 1000);
        assert_eq!(&picks[..4], &["a", "b", "a", "b"]);
        assert_eq!(picks.iter().filter(|n| *n == "a").count(), 500);
        assert_eq!(lb.lock().len(), 2);
    }
}
