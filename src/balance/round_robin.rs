use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::backend::Backend;

/// Weighted round-robin over whatever `available` slice is passed in.
///
/// Unlike the teacher's variant, there is no cached prefix sum: `available`
/// changes every call as health flips happen, so the prefix sum is recomputed
/// per call from the live snapshot. The only persistent state is the
/// counter — policy-owned, not per-request.
pub struct RoundRobin {
    counter: AtomicU32,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self {
            counter: AtomicU32::new(0),
        }
    }

    pub fn select(&self, available: &[Arc<Backend>]) -> Option<Arc<Backend>> {
        let total_weight: u64 = available.iter().map(|b| b.weight as u64).sum();
        if total_weight == 0 {
            return None;
        }
        let c = self.counter.fetch_add(1, Ordering::Relaxed);
        let k = c as u64 % total_weight;

        let mut running = 0u64;
        for backend in available {
            running += backend.weight as u64;
            if running > k {
                return Some(backend.clone());
            }
        }
        unreachable!("running sum must exceed k before exhausting available")
    }
}

impl Default for RoundRobin {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;
    use std::collections::HashMap;

    fn backend(host: &str, weight: u32) -> Arc<Backend> {
        Arc::new(Backend::new(BackendConfig {
            host: host.to_string(),
            port: 80,
            weight,
        }))
    }

    #[test]
    fn distributes_uniformly_for_equal_weights() {
        let rr = RoundRobin::new();
        let backends = vec![backend("a", 1), backend("b", 1)];
        let mut counts = HashMap::new();
        for _ in 0..1000 {
            let picked = rr.select(&backends).unwrap();
            *counts.entry(picked.host.clone()).or_insert(0) += 1;
        }
        assert_eq!(counts["a"], 500);
        assert_eq!(counts["b"], 500);
    }

    #[test]
    fn distributes_proportionally_for_weighted() {
        let rr = RoundRobin::new();
        let backends = vec![backend("a", 1), backend("b", 3)];
        let mut counts = HashMap::new();
        for _ in 0..4000 {
            let picked = rr.select(&backends).unwrap();
            *counts.entry(picked.host.clone()).or_insert(0) += 1;
        }
        assert_eq!(counts["a"], 1000);
        assert_eq!(counts["b"], 3000);
    }

    #[test]
    fn single_backend_always_selected() {
        let rr = RoundRobin::new();
        let backends = vec![backend("only", 5)];
        for _ in 0..10 {
            assert_eq!(rr.select(&backends).unwrap().host, "only");
        }
    }
}
