//! Path properties and the algorithms that compute them: the self-path rule
//! (Case A), the direct-edge lookup (Case B), and batched Dijkstra to every
//! point-of-interest vertex (Case C).

use std::cmp::Ordering;
use std::collections::HashMap;
use std::ops::Add;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use petgraph::graph::NodeIndex;

use crate::error::TopologyError;
use crate::graph::{Edge, NetworkGraph};

/// A stored route between two vertices. Created exactly once per
/// `(src, dst)` pair and never mutated except for `packet_count`.
#[derive(Debug)]
pub struct Path {
    pub is_direct: bool,
    pub src: NodeIndex,
    pub dst: NodeIndex,
    pub latency_ms: f64,
    pub reliability: f64,
    packet_count: AtomicU64,
}

impl Path {
    pub fn new(is_direct: bool, src: NodeIndex, dst: NodeIndex, latency_ms: f64, reliability: f64) -> Self {
        Self {
            is_direct,
            src,
            dst,
            latency_ms,
            reliability,
            packet_count: AtomicU64::new(0),
        }
    }

    pub fn packet_count(&self) -> u64 {
        self.packet_count.load(AtomicOrdering::Relaxed)
    }

    pub fn increment_packet_count(&self) {
        self.packet_count.fetch_add(1, AtomicOrdering::Relaxed);
    }
}

/// The additive cost petgraph's Dijkstra accumulates along a path: latency
/// sums, reliability multiplies. `PartialOrd` only compares latency, which
/// is the sole quantity Dijkstra needs to pick the cheapest path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathCost {
    pub latency_ms: f64,
    pub reliability: f64,
}

impl Default for PathCost {
    fn default() -> Self {
        Self {
            latency_ms: 0.0,
            reliability: 1.0,
        }
    }
}

impl PartialOrd for PathCost {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.latency_ms.partial_cmp(&other.latency_ms)
    }
}

impl Add for PathCost {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        Self {
            latency_ms: self.latency_ms + other.latency_ms,
            reliability: self.reliability * other.reliability,
        }
    }
}

impl From<&Edge> for PathCost {
    fn from(e: &Edge) -> Self {
        Self {
            latency_ms: e.latency_ms(),
            reliability: e.reliability(),
        }
    }
}

/// Case A: `src == dst`. Scan every incident edge in edge-id order; a true
/// self-loop counts once, any other incident edge counts as an out-and-back
/// (latency doubled, reliability squared). No incident edges means a
/// latency-0, fully-unreliable direct path.
pub fn self_path(graph: &NetworkGraph, v: NodeIndex) -> Path {
    let incident = graph.incident_edges(v);

    let mut best: Option<(f64, f64)> = None;
    for e in incident {
        let edge = graph.edge(e);
        let is_self_loop = graph.opposite(e, v) == v;
        let (latency_ms, reliability) = if is_self_loop {
            (edge.latency_ms(), edge.reliability())
        } else {
            (edge.latency_ms() * 2.0, edge.reliability().powi(2))
        };
        best = Some(match best {
            Some((best_latency, best_reliability)) if best_latency <= latency_ms => {
                (best_latency, best_reliability)
            }
            _ => (latency_ms, reliability),
        });
    }

    let (latency_ms, reliability) = best.unwrap_or((0.0, 0.0));
    Path::new(true, v, v, latency_ms, reliability)
}

/// Case B: distinct vertices under a non-shortest-path policy. Requires a
/// direct edge to already exist (enforced by graph completeness at load
/// time).
pub fn direct_path(graph: &NetworkGraph, s: NodeIndex, d: NodeIndex) -> Result<Path, TopologyError> {
    let e = graph
        .edge_id(s, d)
        .ok_or_else(|| TopologyError::Routing(format!("no direct edge between {s:?} and {d:?}")))?;
    let edge = graph.edge(e);
    Ok(Path::new(true, s, d, edge.latency_ms(), edge.reliability()))
}

/// Case C: run Dijkstra once from `src`, covering every vertex in
/// `points_of_interest` simultaneously. Returns the accumulated cost for
/// each reachable point of interest other than `src` itself (self-paths are
/// handled separately by [`self_path`]).
pub fn shortest_paths_from(
    graph: &NetworkGraph,
    src: NodeIndex,
    points_of_interest: &[NodeIndex],
) -> Result<HashMap<NodeIndex, PathCost>, TopologyError> {
    let costs = graph.dijkstra_with(src, PathCost::from);

    let mut result = HashMap::new();
    for &dst in points_of_interest {
        if dst == src {
            continue;
        }
        let cost = costs
            .get(&dst)
            .copied()
            .ok_or_else(|| TopologyError::Routing(format!("{dst:?} is not reachable from {src:?}")))?;
        result.insert(dst, cost);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(gml: &str) -> NetworkGraph {
        NetworkGraph::parse(gml).unwrap()
    }

    #[test]
    fn self_path_without_self_loop_doubles_latency() {
        // S2: single undirected edge A-B (latency 5ms, loss 0.1); latency(A,A) = 10, reliability(A,A) = 0.81
        let g = parse(
            r#"graph [
                directed 0
                node [ id 1 bandwidth_down "1 Mbit" bandwidth_up "1 Mbit" ]
                node [ id 2 bandwidth_down "1 Mbit" bandwidth_up "1 Mbit" ]
                edge [ source 1 target 2 latency "5 ms" packet_loss 0.1 ]
            ]"#,
        );
        let a = g.node_index(1).unwrap();
        let path = self_path(&g, a);
        assert!((path.latency_ms - 10.0).abs() < 1e-9);
        assert!((path.reliability - 0.81).abs() < 1e-9);
    }

    #[test]
    fn self_path_with_no_incident_edges_is_unreliable() {
        // an isolated vertex: latency(A,A) = 0, but reliability(A,A) = 0.0,
        // not 1.0 (ground truth: the source's `reliabilityOfMinLatencyEdge`
        // starts at 0 and is never touched when the incident-edge loop
        // never runs).
        let g = parse(
            r#"graph [
                directed 0
                node [ id 1 bandwidth_down "1 Mbit" bandwidth_up "1 Mbit" ]
            ]"#,
        );
        let a = g.node_index(1).unwrap();
        let path = self_path(&g, a);
        assert_eq!(path.latency_ms, 0.0);
        assert_eq!(path.reliability, 0.0);
    }

    #[test]
    fn self_path_with_self_loop_counts_once() {
        // S1: self-loop A-A latency=1ms 0% loss -> latency(A,A) = 1, reliability = 1.0
        let g = parse(
            r#"graph [
                directed 0
                node [ id 1 bandwidth_down "1 Mbit" bandwidth_up "1 Mbit" ]
                node [ id 2 bandwidth_down "1 Mbit" bandwidth_up "1 Mbit" ]
                edge [ source 1 target 1 latency "1 ms" packet_loss 0.0 ]
                edge [ source 2 target 2 latency "1 ms" packet_loss 0.0 ]
                edge [ source 1 target 2 latency "10 ms" packet_loss 0.02 ]
            ]"#,
        );
        let a = g.node_index(1).unwrap();
        let path = self_path(&g, a);
        assert!((path.latency_ms - 1.0).abs() < 1e-9);
        assert!((path.reliability - 1.0).abs() < 1e-9);
    }

    #[test]
    fn shortest_beats_direct() {
        // S3: A-B 100ms, A-C 10ms, C-B 10ms, 0% loss; useShortest=true => latency(A,B) = 20
        let g = parse(
            r#"graph [
                directed 0
                node [ id 1 bandwidth_down "1 Mbit" bandwidth_up "1 Mbit" ]
                node [ id 2 bandwidth_down "1 Mbit" bandwidth_up "1 Mbit" ]
                node [ id 3 bandwidth_down "1 Mbit" bandwidth_up "1 Mbit" ]
                edge [ source 1 target 2 latency "100 ms" packet_loss 0.0 ]
                edge [ source 1 target 3 latency "10 ms" packet_loss 0.0 ]
                edge [ source 3 target 2 latency "10 ms" packet_loss 0.0 ]
            ]"#,
        );
        let a = g.node_index(1).unwrap();
        let b = g.node_index(2).unwrap();
        let costs = shortest_paths_from(&g, a, &[a, b]).unwrap();
        assert!((costs[&b].latency_ms - 20.0).abs() < 1e-9);
    }
}
