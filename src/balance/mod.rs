mod ip_hash;
mod least_connections;
mod round_robin;

use std::sync::Arc;

use crate::backend::Backend;
use crate::config::Algorithm;

pub use round_robin::RoundRobin;

/// Selection contract: `select(available, client_ip) -> Backend | NONE`.
/// NONE iff `available` is empty. Enum-dispatched rather than `dyn Trait`
/// since the set of policies is closed and known at startup.
pub enum SelectionPolicy {
    RoundRobin(RoundRobin),
    LeastConnections,
    IpHash,
}

impl SelectionPolicy {
    pub fn new(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::RoundRobin => SelectionPolicy::RoundRobin(RoundRobin::new()),
            Algorithm::LeastConnections => SelectionPolicy::LeastConnections,
            Algorithm::IpHash => SelectionPolicy::IpHash,
        }
    }

    pub fn select(&self, available: &[Arc<Backend>], client_ip: &str) -> Option<Arc<Backend>> {
        if available.is_empty() {
            return None;
        }
        match self {
            SelectionPolicy::RoundRobin(rr) => rr.select(available),
            SelectionPolicy::LeastConnections => least_connections::select(available),
            SelectionPolicy::IpHash => ip_hash::select(available, client_ip),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;

    fn backend(host: &str, weight: u32) -> Arc<Backend> {
        Arc::new(Backend::new(BackendConfig {
            host: host.to_string(),
            port: 80,
            weight,
        }))
    }

    #[test]
    fn empty_available_returns_none() {
        let policy = SelectionPolicy::new(Algorithm::RoundRobin);
        assert!(policy.select(&[], "1.2.3.4").is_none());
    }

    #[test]
    fn dispatches_to_configured_algorithm() {
        let backends = vec![backend("a", 1)];
        let policy = SelectionPolicy::new(Algorithm::LeastConnections);
        let picked = policy.select(&backends, "1.2.3.4").unwrap();
        assert_eq!(picked.host, "a");
    }
}
