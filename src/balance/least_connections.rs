use std::sync::Arc;

use crate::backend::Backend;

/// Deterministic linear scan for the backend with the smallest
/// `active_connections`, ties broken by sequence order (first wins).
///
/// The per-backend read is atomic but the comparison across backends is not
/// a consistent snapshot — acceptable, it only loosens optimality.
pub fn select(available: &[Arc<Backend>]) -> Option<Arc<Backend>> {
    available
        .iter()
        .min_by_key(|b| b.active_connections())
        .cloned()
}
