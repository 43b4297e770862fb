use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::sync::Arc;

use crate::config::BackendConfig;

/// Runtime state for one configured origin.
///
/// `host`, `port`, `weight` are immutable after construction. The remaining
/// fields are independently-updated atomics — no mutex is needed because
/// every invariant in spec.md §3 is maintained by reset-before-increment
/// ordering within a single field update, not by cross-field locking.
#[derive(Debug)]
pub struct Backend {
    pub host: String,
    pub port: u16,
    pub weight: u32,

    available: AtomicBool,
    active_connections: AtomicI64,
    consecutive_failures: AtomicU32,
    consecutive_successes: AtomicU32,
}

impl Backend {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            host: config.host,
            port: config.port,
            weight: config.weight.max(1),
            available: AtomicBool::new(true),
            active_connections: AtomicI64::new(0),
            consecutive_failures: AtomicU32::new(0),
            consecutive_successes: AtomicU32::new(0),
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    #[inline]
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set_available(&self, value: bool) {
        self.available.store(value, Ordering::Release);
    }

    #[inline]
    pub fn active_connections(&self) -> i64 {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Increment the in-flight connection counter. Returns the post-increment
    /// value so callers can act without a second read.
    #[inline]
    pub fn inc_active_connections(&self) -> i64 {
        self.active_connections.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Decrement the in-flight connection counter. Called on every exit path
    /// of the handler that incremented it, including error paths.
    #[inline]
    pub fn dec_active_connections(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn consecutive_successes(&self) -> u32 {
        self.consecutive_successes.load(Ordering::Relaxed)
    }

    /// Record one probe success: resets the failure streak and returns the
    /// post-increment success streak.
    pub fn record_success(&self) -> u32 {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.consecutive_successes.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Record one probe failure: resets the success streak and returns the
    /// post-increment failure streak.
    pub fn record_failure(&self) -> u32 {
        self.consecutive_successes.store(0, Ordering::Relaxed);
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Resets the success streak to zero. Called after a recovery transition
    /// flips the backend back to available.
    #[inline]
    pub fn reset_successes(&self) {
        self.consecutive_successes.store(0, Ordering::Relaxed);
    }
}

/// RAII guard returned when a connection is routed to a backend. Decrements
/// `active_connections` on drop, covering every handler exit path including
/// panics/early-returns, per spec.md §4.4 step 3.
pub struct ConnectionGuard {
    backend: Arc<Backend>,
}

impl ConnectionGuard {
    pub fn new(backend: Arc<Backend>) -> Self {
        backend.inc_active_connections();
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<Backend> {
        &self.backend
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.backend.dec_active_connections();
    }
}

/// Ordered, immutable-after-construction set of backends. Order is
/// significant for deterministic tie-breaks in selection policies.
#[derive(Debug, Clone)]
pub struct BackendSet {
    backends: Arc<Vec<Arc<Backend>>>,
}

impl BackendSet {
    pub fn new(configs: Vec<BackendConfig>) -> Self {
        let backends = configs.into_iter().map(|c| Arc::new(Backend::new(c))).collect();
        Self {
            backends: Arc::new(backends),
        }
    }

    pub fn all(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    /// Snapshot of currently-available backends, in original sequence order.
    pub fn available(&self) -> Vec<Arc<Backend>> {
        self.backends
            .iter()
            .filter(|b| b.is_available())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}
