//! The concurrent facade (C1-C6 tied together): owns the graph, weights,
//! attachment registry, and path cache for the engine's entire lifetime and
//! answers `latency`/`reliability`/`isRoutable` queries from any thread.
//!
//! Lock discipline (see module-level comment on `Locks` below) follows the
//! declared order `graph > edge_weights > virtual_ip > path_cache >
//! stats`. Dijkstra takes `graph` and `edge_weights` together and releases
//! both before it ever touches the cache; the cache's own minimum-latency
//! callback fires after its internal locks are dropped (see
//! `cache::PathCache::store`).

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Mutex, RwLock};

use log::{debug, error, trace, warn};
use petgraph::graph::NodeIndex;

use crate::attach::{self, Attachment, AttachmentHints, Random};
use crate::cache::PathCache;
use crate::error::TopologyError;
use crate::graph::NetworkGraph;
use crate::path;
use crate::registry::AttachmentRegistry;
use crate::validate::{self, GraphProperties};

/// An opaque simulated-host address. The engine only ever needs the two
/// network-order representations below; everything else about a host
/// belongs to collaborators out of scope here.
pub trait Address {
    fn to_network_ip(&self) -> Ipv4Addr;
}

impl Address for Ipv4Addr {
    fn to_network_ip(&self) -> Ipv4Addr {
        *self
    }
}

/// The simulator scheduler collaborator notified when the globally observed
/// minimum path latency drops.
pub trait Worker: Send + Sync {
    fn update_min_time_jump(&self, latency_ms: f64);
}

/// A `Worker` that does nothing, for callers that don't need the callback
/// (e.g. tests, or a CLI that never runs a live simulation).
pub struct NullWorker;

impl Worker for NullWorker {
    fn update_min_time_jump(&self, _latency_ms: f64) {}
}

/// Policy knobs fixed for the lifetime of a `Topology`.
#[derive(Debug, Clone, Copy)]
pub struct TopologyOptions {
    /// Whether to run Dijkstra for distinct-vertex queries (`true`) or
    /// require a direct edge between every pair (`false`, requires a
    /// complete graph).
    pub use_shortest: bool,
}

impl Default for TopologyOptions {
    fn default() -> Self {
        Self { use_shortest: true }
    }
}

/// Derived statistics guarded by their own lock, independent of the graph
/// and the cache.
#[derive(Default)]
struct Stats {
    shortest_path_batches: AtomicU64,
}

/// The topology and routing engine. Holds every lock named in the design:
/// `graph` (exclusive; the parser beneath it is not thread-safe),
/// `edge_weights` is folded into the same exclusive section as the graph
/// since weights are derived directly from the parsed edges and never
/// rebuilt independently, `virtual_ip` (the attachment registry),
/// `path_cache` (internal to [`PathCache`]), and `stats`.
pub struct Topology {
    graph: RwLock<NetworkGraph>,
    properties: GraphProperties,
    options: TopologyOptions,
    virtual_ip: RwLock<AttachmentRegistry>,
    path_cache: PathCache,
    stats: Mutex<Stats>,
    worker: Box<dyn Worker>,
}

impl Topology {
    /// Parse and validate `gml_text`, returning `Err` if the file cannot be
    /// parsed or any structural invariant is violated. No partially
    /// constructed instance is ever observable.
    pub fn new(
        gml_text: &str,
        options: TopologyOptions,
        worker: Box<dyn Worker>,
    ) -> Result<Self, TopologyError> {
        let graph = NetworkGraph::parse(gml_text)?;
        let properties = validate::validate(&graph, options.use_shortest)?;
        let is_directed = properties.is_directed;

        Ok(Self {
            graph: RwLock::new(graph),
            properties,
            options,
            virtual_ip: RwLock::new(AttachmentRegistry::new()),
            path_cache: PathCache::new(is_directed),
            stats: Mutex::new(Stats::default()),
            worker,
        })
    }

    pub fn properties(&self) -> GraphProperties {
        self.properties
    }

    /// Resolve `hints` to a vertex, attach `ip` to it, and return the
    /// vertex's declared bandwidth.
    pub fn attach(
        &self,
        ip: Ipv4Addr,
        hints: &AttachmentHints,
        rng: &mut impl Random,
    ) -> Attachment {
        let graph = self.graph.read().unwrap();
        let attachment = attach::attach(&graph, hints, rng);
        drop(graph);

        let mut registry = self.virtual_ip.write().unwrap();
        registry.attach(ip, attachment.vertex);
        attachment
    }

    pub fn detach(&self, ip: Ipv4Addr) {
        self.virtual_ip.write().unwrap().detach(ip);
    }

    fn resolve(&self, addr: &impl Address) -> Option<NodeIndex> {
        let ip = addr.to_network_ip();
        let registry = self.virtual_ip.read().unwrap();
        let vertex = registry.lookup(ip);
        if vertex.is_none() {
            warn!("address {ip} is not attached to the topology");
        }
        vertex
    }

    /// `latency(src, dst)` in milliseconds. `None` if either address isn't
    /// attached; panics on a routing failure, since a validated topology
    /// (strongly connected, I1) must always be able to route between
    /// attached vertices.
    pub fn latency(&self, src: &impl Address, dst: &impl Address) -> Option<f64> {
        self.query(src, dst).map(|p| p.latency_ms)
    }

    /// `reliability(src, dst) in (0, 1]`.
    pub fn reliability(&self, src: &impl Address, dst: &impl Address) -> Option<f64> {
        self.query(src, dst).map(|p| p.reliability)
    }

    pub fn is_routable(&self, src: &impl Address, dst: &impl Address) -> bool {
        self.query(src, dst).is_some()
    }

    pub fn increment_packet_counter(&self, src: &impl Address, dst: &impl Address) {
        let (Some(s), Some(d)) = (self.resolve(src), self.resolve(dst)) else {
            return;
        };
        self.path_cache.increment_packet_count(s, d);
    }

    fn query(&self, src: &impl Address, dst: &impl Address) -> Option<crate::cache::PathSnapshot> {
        let s = self.resolve(src)?;
        let d = self.resolve(dst)?;

        if let Some(hit) = self.path_cache.get(s, d) {
            trace!(
                "cache hit {:?}->{:?}: latency={}ms reliability={}",
                s,
                d,
                hit.latency_ms,
                hit.reliability
            );
            return Some(hit);
        }

        match self.compute_and_store(s, d) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                error!("{e}");
                panic!("routing failure for a validated topology: {e}");
            }
        }
    }

    fn compute_and_store(
        &self,
        s: NodeIndex,
        d: NodeIndex,
    ) -> Result<crate::cache::PathSnapshot, TopologyError> {
        if s == d {
            let graph = self.graph.read().unwrap();
            let computed = path::self_path(&graph, s);
            let direct_edge_exists = graph.edge_id(s, d).is_some();
            drop(graph);

            self.path_cache.store(
                computed.is_direct,
                s,
                d,
                computed.latency_ms,
                computed.reliability,
                self.options.use_shortest,
                direct_edge_exists,
                |new_min| self.worker.update_min_time_jump(new_min),
            );
            return Ok(self.path_cache.get(s, d).expect("just inserted"));
        }

        if !self.options.use_shortest {
            let graph = self.graph.read().unwrap();
            let computed = path::direct_path(&graph, s, d)?;
            drop(graph);

            self.path_cache.store(
                true,
                s,
                d,
                computed.latency_ms,
                computed.reliability,
                self.options.use_shortest,
                true,
                |new_min| self.worker.update_min_time_jump(new_min),
            );
            return Ok(self.path_cache.get(s, d).expect("just inserted"));
        }

        // Case C: batch-compute from `s` to every point of interest at once.
        let graph = self.graph.read().unwrap();
        let points_of_interest = self.virtual_ip.read().unwrap().vertices_with_hosts();
        let costs = path::shortest_paths_from(&graph, s, &points_of_interest)?;
        let direct_edge_exists = graph.edge_id(s, d).is_some();
        drop(graph);

        self.stats
            .lock()
            .unwrap()
            .shortest_path_batches
            .fetch_add(1, AtomicOrdering::Relaxed);

        for (&dst, cost) in &costs {
            let mut latency_ms = cost.latency_ms;
            if latency_ms == 0.0 {
                // avoid a zero-length simulator time jump
                latency_ms = 1.0;
            }
            debug!(
                "computed path {:?}->{:?}: latency={}ms reliability={}",
                s, dst, latency_ms, cost.reliability
            );
            self.path_cache.store(
                false,
                s,
                dst,
                latency_ms,
                cost.reliability,
                self.options.use_shortest,
                dst == d && direct_edge_exists,
                |new_min| self.worker.update_min_time_jump(new_min),
            );
        }

        self.path_cache
            .get(s, d)
            .ok_or_else(|| TopologyError::Routing(format!("{d:?} is not a point of interest reachable from {s:?}")))
    }

    /// Log every cached path; called once, at shutdown, before the engine
    /// is dropped.
    pub fn log_shutdown(&self) {
        self.path_cache.log_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64 as TestAtomicU64;
    use std::sync::Arc;

    struct RecordingWorker(Arc<TestAtomicU64>);
    impl Worker for RecordingWorker {
        fn update_min_time_jump(&self, latency_ms: f64) {
            self.0.store(latency_ms.to_bits(), AtomicOrdering::SeqCst);
        }
    }

    struct FixedRng(f64);
    impl Random for FixedRng {
        fn next_f64(&mut self) -> f64 {
            self.0
        }
    }

    fn two_vertex_complete_graph() -> &'static str {
        r#"graph [
            directed 0
            node [ id 1 bandwidth_down "1 Mbit" bandwidth_up "1 Mbit" ]
            node [ id 2 bandwidth_down "1 Mbit" bandwidth_up "1 Mbit" ]
            edge [ source 1 target 1 latency "1 ms" packet_loss 0.0 ]
            edge [ source 2 target 2 latency "1 ms" packet_loss 0.0 ]
            edge [ source 1 target 2 latency "10 ms" packet_loss 0.02 ]
        ]"#
    }

    #[test]
    fn direct_policy_matches_scenario_one() {
        let topo = Topology::new(
            two_vertex_complete_graph(),
            TopologyOptions { use_shortest: false },
            Box::new(NullWorker),
        )
        .unwrap();

        let a_ip: Ipv4Addr = "10.0.0.1".parse().unwrap();
        let b_ip: Ipv4Addr = "10.0.0.2".parse().unwrap();
        let mut rng = FixedRng(0.0);
        topo.attach(a_ip, &AttachmentHints { ip: Some(a_ip), city: None, country: None }, &mut rng);
        topo.attach(b_ip, &AttachmentHints { ip: Some(b_ip), city: None, country: None }, &mut rng);

        assert_eq!(topo.latency(&a_ip, &b_ip), Some(10.0));
        assert!((topo.reliability(&a_ip, &b_ip).unwrap() - 0.98).abs() < 1e-9);
        assert_eq!(topo.latency(&a_ip, &a_ip), Some(1.0));
        assert_eq!(topo.reliability(&a_ip, &a_ip), Some(1.0));
    }

    #[test]
    fn minimum_latency_callback_fires_on_new_minimums_only() {
        let seen = Arc::new(TestAtomicU64::new(f64::MAX.to_bits()));
        let topo = Topology::new(
            r#"graph [
                directed 0
                node [ id 1 bandwidth_down "1 Mbit" bandwidth_up "1 Mbit" ]
                node [ id 2 bandwidth_down "1 Mbit" bandwidth_up "1 Mbit" ]
                node [ id 3 bandwidth_down "1 Mbit" bandwidth_up "1 Mbit" ]
                edge [ source 1 target 2 latency "7 ms" packet_loss 0.0 ]
                edge [ source 2 target 3 latency "3 ms" packet_loss 0.0 ]
                edge [ source 1 target 3 latency "20 ms" packet_loss 0.0 ]
            ]"#,
            TopologyOptions { use_shortest: true },
            Box::new(RecordingWorker(seen.clone())),
        )
        .unwrap();

        let a: Ipv4Addr = "10.0.0.1".parse().unwrap();
        let b: Ipv4Addr = "10.0.0.2".parse().unwrap();
        let c: Ipv4Addr = "10.0.0.3".parse().unwrap();
        let mut rng = FixedRng(0.0);
        topo.attach(a, &AttachmentHints { ip: Some(a), city: None, country: None }, &mut rng);
        topo.attach(b, &AttachmentHints { ip: Some(b), city: None, country: None }, &mut rng);
        topo.attach(c, &AttachmentHints { ip: Some(c), city: None, country: None }, &mut rng);

        assert_eq!(topo.latency(&a, &b), Some(7.0));
        assert_eq!(f64::from_bits(seen.load(AtomicOrdering::SeqCst)), 7.0);

        assert_eq!(topo.latency(&b, &c), Some(3.0));
        assert_eq!(f64::from_bits(seen.load(AtomicOrdering::SeqCst)), 3.0);
    }

    #[test]
    fn disconnected_graph_fails_construction() {
        let gml = r#"graph [
            directed 0
            node [ id 1 bandwidth_down "1 Mbit" bandwidth_up "1 Mbit" ]
            node [ id 2 bandwidth_down "1 Mbit" bandwidth_up "1 Mbit" ]
            node [ id 3 bandwidth_down "1 Mbit" bandwidth_up "1 Mbit" ]
            node [ id 4 bandwidth_down "1 Mbit" bandwidth_up "1 Mbit" ]
            edge [ source 1 target 2 latency "1 ms" packet_loss 0.0 ]
            edge [ source 3 target 4 latency "1 ms" packet_loss 0.0 ]
        ]"#;
        match Topology::new(gml, TopologyOptions::default(), Box::new(NullWorker)) {
            Err(TopologyError::GraphStructure(_)) => {}
            other => panic!("expected GraphStructure error, got {other:?}"),
        }
    }

    #[test]
    fn unattached_address_returns_none() {
        let topo = Topology::new(
            two_vertex_complete_graph(),
            TopologyOptions { use_shortest: false },
            Box::new(NullWorker),
        )
        .unwrap();
        let unknown: Ipv4Addr = "192.168.1.1".parse().unwrap();
        assert_eq!(topo.latency(&unknown, &unknown), None);
    }
}
