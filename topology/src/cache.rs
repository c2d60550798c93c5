//! The two-level path cache (C4): `src -> dst -> Path`, with the admission
//! rule from the routing design and the `minimumPathLatency` tracking that
//! drives the simulator's time-jump callback.

use std::collections::HashMap;
use std::sync::RwLock;

use log::debug;
use petgraph::graph::NodeIndex;

use crate::path::Path;

pub struct PathCache {
    is_directed: bool,
    entries: RwLock<HashMap<NodeIndex, HashMap<NodeIndex, Path>>>,
    minimum_latency_ms: RwLock<Option<f64>>,
}

/// A read-only snapshot of a cached path, cheap to copy out from behind the
/// cache's read lock.
#[derive(Debug, Clone, Copy)]
pub struct PathSnapshot {
    pub is_direct: bool,
    pub latency_ms: f64,
    pub reliability: f64,
}

impl From<&Path> for PathSnapshot {
    fn from(p: &Path) -> Self {
        Self {
            is_direct: p.is_direct,
            latency_ms: p.latency_ms,
            reliability: p.reliability,
        }
    }
}

impl PathCache {
    pub fn new(is_directed: bool) -> Self {
        Self {
            is_directed,
            entries: RwLock::new(HashMap::new()),
            minimum_latency_ms: RwLock::new(None),
        }
    }

    /// Probe the cache for `(s, d)`. On undirected graphs a path stored as
    /// `(d, s)` also satisfies the query, since the route is symmetric.
    pub fn get(&self, s: NodeIndex, d: NodeIndex) -> Option<PathSnapshot> {
        let entries = self.entries.read().unwrap();
        if let Some(path) = entries.get(&s).and_then(|m| m.get(&d)) {
            return Some(path.into());
        }
        if self.is_directed {
            return None;
        }
        entries.get(&d).and_then(|m| m.get(&s)).map(PathSnapshot::from)
    }

    /// Record one packet on the stored path for `(s, d)` (or `(d, s)` on an
    /// undirected graph). No-op if nothing is cached for that pair yet.
    pub fn increment_packet_count(&self, s: NodeIndex, d: NodeIndex) {
        let entries = self.entries.read().unwrap();
        if let Some(path) = entries.get(&s).and_then(|m| m.get(&d)) {
            path.increment_packet_count();
            return;
        }
        if !self.is_directed {
            if let Some(path) = entries.get(&d).and_then(|m| m.get(&s)) {
                path.increment_packet_count();
            }
        }
    }

    /// Admission algorithm:
    /// 1. Refuse if `(s, d)` or `(d, s)` is already cached.
    /// 2. Refuse a non-direct path under a non-shortest-path policy when a
    ///    direct edge between `s` and `d` exists (the direct edge must be
    ///    stored in its place instead).
    /// 3. Otherwise insert at `cache[s][d]`.
    ///
    /// On successful insertion of a new overall minimum latency,
    /// `on_new_minimum` is invoked with the new minimum **after** the
    /// cache's internal locks have been released.
    #[allow(clippy::too_many_arguments)]
    pub fn store(
        &self,
        is_direct: bool,
        s: NodeIndex,
        d: NodeIndex,
        latency_ms: f64,
        reliability: f64,
        use_shortest: bool,
        direct_edge_exists: bool,
        on_new_minimum: impl FnOnce(f64),
    ) -> bool {
        let mut new_minimum = None;
        {
            let mut entries = self.entries.write().unwrap();

            let already_cached = entries.get(&s).map_or(false, |m| m.contains_key(&d))
                || entries.get(&d).map_or(false, |m| m.contains_key(&s));
            if already_cached {
                return false;
            }

            if !is_direct && !use_shortest && direct_edge_exists {
                return false;
            }

            let path = Path::new(is_direct, s, d, latency_ms, reliability);
            entries.entry(s).or_default().insert(d, path);

            let mut minimum = self.minimum_latency_ms.write().unwrap();
            if minimum.map_or(true, |m| latency_ms < m) {
                *minimum = Some(latency_ms);
                new_minimum = Some(latency_ms);
            }
        }

        if let Some(new_minimum) = new_minimum {
            on_new_minimum(new_minimum);
        }

        true
    }

    pub fn minimum_latency_ms(&self) -> f64 {
        self.minimum_latency_ms.read().unwrap().unwrap_or(0.0)
    }

    /// Log every stored path; called once, at shutdown.
    pub fn log_all(&self) {
        let entries = self.entries.read().unwrap();
        for dsts in entries.values() {
            for path in dsts.values() {
                debug!(
                    "cached path {:?}->{:?}: latency={}ms reliability={} packets={}",
                    path.src,
                    path.dst,
                    path.latency_ms,
                    path.reliability,
                    path.packet_count(),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idx(i: usize) -> NodeIndex {
        NodeIndex::new(i)
    }

    #[test]
    fn second_insert_in_either_direction_is_refused() {
        let cache = PathCache::new(false);
        assert!(cache.store(true, idx(0), idx(1), 10.0, 0.9, true, false, |_| {}));
        assert!(!cache.store(true, idx(1), idx(0), 10.0, 0.9, true, false, |_| {}));
        assert!(!cache.store(true, idx(0), idx(1), 10.0, 0.9, true, false, |_| {}));
    }

    #[test]
    fn directed_graph_does_not_serve_reverse_lookup() {
        let cache = PathCache::new(true);
        cache.store(true, idx(0), idx(1), 10.0, 0.9, true, false, |_| {});
        assert!(cache.get(idx(0), idx(1)).is_some());
        assert!(cache.get(idx(1), idx(0)).is_none());
    }

    #[test]
    fn undirected_graph_serves_reverse_lookup() {
        let cache = PathCache::new(false);
        cache.store(true, idx(0), idx(1), 10.0, 0.9, true, false, |_| {});
        assert!(cache.get(idx(1), idx(0)).is_some());
    }

    #[test]
    fn non_direct_path_refused_under_direct_policy_when_edge_exists() {
        let cache = PathCache::new(false);
        assert!(!cache.store(false, idx(0), idx(1), 10.0, 0.9, false, true, |_| {}));
    }

    #[test]
    fn callback_fires_only_on_new_minimum() {
        let cache = PathCache::new(false);
        let mut seen = Vec::new();
        cache.store(true, idx(0), idx(1), 7.0, 0.9, true, false, |m| seen.push(m));
        cache.store(true, idx(0), idx(2), 9.0, 0.9, true, false, |m| seen.push(m));
        cache.store(true, idx(0), idx(3), 3.0, 0.9, true, false, |m| seen.push(m));
        assert_eq!(seen, vec![7.0, 3.0]);
        assert_eq!(cache.minimum_latency_ms(), 3.0);
    }
}
