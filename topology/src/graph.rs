//! The graph store (vertex/edge attribute tables plus adjacency) and the
//! one-shot validator that runs over it at load time.
//!
//! Every read of the underlying petgraph graph is meant to be taken under a
//! single exclusive lock by the caller (see `topology::graphLock`); this
//! module itself holds no lock, it only owns the data.

use std::collections::HashMap;
use std::convert::TryFrom;
use std::net::Ipv4Addr;

use log::debug;
use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::error::TopologyError;
use crate::petgraph_wrapper::GraphWrapper;
use crate::units::{self, Unit};

/// A usable IPv4 address excludes the unspecified, loopback, and limited
/// broadcast addresses.
pub fn is_usable_ip(ip: Ipv4Addr) -> bool {
    !ip.is_unspecified() && ip != Ipv4Addr::new(127, 0, 0, 1) && ip != Ipv4Addr::BROADCAST
}

#[derive(Debug, PartialEq)]
pub struct Vertex {
    pub id: u32,
    pub bandwidth_down: units::BitsPerSec<units::SiPrefixUpper>,
    pub bandwidth_up: units::BitsPerSec<units::SiPrefixUpper>,
    pub ip_address: Option<Ipv4Addr>,
    pub city_code: Option<String>,
    pub country_code: Option<String>,
    pub label: Option<String>,
}

impl Vertex {
    /// Downstream bandwidth in KiB/s, per the bits/s -> KiB/s conversion rule.
    pub fn bandwidth_down_kibps(&self) -> f64 {
        bits_per_sec_to_kibps(self.bandwidth_down)
    }

    /// Upstream bandwidth in KiB/s.
    pub fn bandwidth_up_kibps(&self) -> f64 {
        bits_per_sec_to_kibps(self.bandwidth_up)
    }

    /// An IP is "usable" for attachment matching iff it's set and not one of
    /// the reserved sentinels.
    pub fn usable_ip(&self) -> Option<Ipv4Addr> {
        self.ip_address.filter(|ip| is_usable_ip(*ip))
    }
}

fn bits_per_sec_to_kibps(bw: units::BitsPerSec<units::SiPrefixUpper>) -> f64 {
    let bits_per_sec = bw.convert_lossy(units::SiPrefixUpper::Base).value();
    bits_per_sec as f64 / 8192.0
}

fn parse_bandwidth(field: &str, value: gml_parser::gml::Value) -> Result<units::BitsPerSec<units::SiPrefixUpper>, String> {
    let s = value
        .as_str()
        .ok_or_else(|| format!("vertex '{field}' is not a string"))?;
    let bw: units::BitsPerSec<units::SiPrefixUpper> = s
        .parse()
        .map_err(|e| format!("vertex '{field}' is not a valid bandwidth: {e}"))?;
    if bw.convert_lossy(units::SiPrefixUpper::Base).value() == 0 {
        return Err(format!("vertex '{field}' must be greater than 0"));
    }
    Ok(bw)
}

impl TryFrom<gml_parser::gml::Node<'_>> for Vertex {
    type Error = String;

    fn try_from(mut node: gml_parser::gml::Node) -> Result<Self, Self::Error> {
        let bandwidth_down = parse_bandwidth(
            "bandwidth_down",
            node.other
                .remove("bandwidth_down")
                .ok_or("vertex 'bandwidth_down' was not provided")?,
        )?;
        let bandwidth_up = parse_bandwidth(
            "bandwidth_up",
            node.other
                .remove("bandwidth_up")
                .ok_or("vertex 'bandwidth_up' was not provided")?,
        )?;

        let ip_address = node
            .other
            .remove("ip_address")
            .map(|v| {
                v.as_str()
                    .ok_or("vertex 'ip_address' is not a string")?
                    .parse::<Ipv4Addr>()
                    .map_err(|e| format!("vertex 'ip_address' is not a valid IPv4 address: {e}"))
            })
            .transpose()?;

        let city_code = node
            .other
            .remove("city_code")
            .map(|v| v.as_str().ok_or("vertex 'city_code' is not a string"))
            .transpose()?
            .map(|s| s.into_owned());

        let country_code = node
            .other
            .remove("country_code")
            .map(|v| v.as_str().ok_or("vertex 'country_code' is not a string"))
            .transpose()?
            .map(|s| s.into_owned());

        let label = node
            .other
            .remove("label")
            .map(|v| v.as_str().ok_or("vertex 'label' is not a string"))
            .transpose()?
            .map(|s| s.into_owned());

        Ok(Self {
            id: node.id.ok_or("vertex 'id' was not provided")?,
            bandwidth_down,
            bandwidth_up,
            ip_address,
            city_code,
            country_code,
            label,
        })
    }
}

#[derive(Debug, PartialEq)]
pub struct Edge {
    pub source: u32,
    pub target: u32,
    pub latency: units::Time<units::TimePrefix>,
    pub packet_loss: f32,
    pub jitter: Option<units::Time<units::TimePrefix>>,
    pub label: Option<String>,
}

impl Edge {
    /// Latency in fractional milliseconds: parse to ns, then divide by 1e6.
    pub fn latency_ms(&self) -> f64 {
        let ns = self.latency.convert_lossy(units::TimePrefix::Nano).value();
        ns as f64 / 1_000_000.0
    }

    pub fn reliability(&self) -> f64 {
        1.0 - self.packet_loss as f64
    }
}

impl TryFrom<gml_parser::gml::Edge<'_>> for Edge {
    type Error = String;

    fn try_from(mut edge: gml_parser::gml::Edge) -> Result<Self, Self::Error> {
        let latency: units::Time<units::TimePrefix> = edge
            .other
            .remove("latency")
            .ok_or("edge 'latency' was not provided")?
            .as_str()
            .ok_or("edge 'latency' is not a string")?
            .parse()
            .map_err(|e| format!("edge 'latency' is not a valid duration: {e}"))?;

        if latency.convert_lossy(units::TimePrefix::Nano).value() == 0 {
            return Err("edge 'latency' must be greater than 0".to_string());
        }

        let packet_loss = edge
            .other
            .remove("packet_loss")
            .ok_or("edge 'packet_loss' was not provided")?
            .as_float()
            .ok_or("edge 'packet_loss' is not a number")?;
        if !(0.0..=1.0).contains(&packet_loss) {
            return Err("edge 'packet_loss' is not in the range [0.0, 1.0]".to_string());
        }

        let jitter = edge
            .other
            .remove("jitter")
            .map(|v| {
                let jitter: units::Time<units::TimePrefix> = v
                    .as_str()
                    .ok_or("edge 'jitter' is not a string")?
                    .parse()
                    .map_err(|e| format!("edge 'jitter' is not a valid duration: {e}"))?;
                Ok::<_, String>(jitter)
            })
            .transpose()?;

        let label = edge
            .other
            .remove("label")
            .map(|v| v.as_str().ok_or("edge 'label' is not a string"))
            .transpose()?
            .map(|s| s.into_owned());

        Ok(Self {
            source: edge.source,
            target: edge.target,
            latency,
            packet_loss,
            jitter,
            label,
        })
    }
}

/// The loaded graph: a petgraph adjacency structure plus the GML-id ->
/// petgraph-index mapping. Immutable after `parse`.
#[derive(Debug)]
pub struct NetworkGraph {
    graph: GraphWrapper<Vertex, Edge, u32>,
    id_to_index: HashMap<u32, NodeIndex>,
}

impl NetworkGraph {
    pub fn parse(gml_text: &str) -> Result<Self, TopologyError> {
        let gml_graph =
            gml_parser::parse(gml_text).map_err(|e| TopologyError::GraphLoad(e.to_string()))?;

        let mut graph = if gml_graph.directed {
            GraphWrapper::Directed(petgraph::graph::Graph::<_, _, petgraph::Directed, _>::with_capacity(
                gml_graph.nodes.len(),
                gml_graph.edges.len(),
            ))
        } else {
            GraphWrapper::Undirected(petgraph::graph::Graph::<_, _, petgraph::Undirected, _>::with_capacity(
                gml_graph.nodes.len(),
                gml_graph.edges.len(),
            ))
        };

        let mut id_to_index = HashMap::new();
        for node in gml_graph.nodes {
            let vertex =
                Vertex::try_from(node).map_err(TopologyError::Attribute)?;
            let gml_id = vertex.id;
            if id_to_index.contains_key(&gml_id) {
                return Err(TopologyError::Attribute(format!(
                    "duplicate vertex id {gml_id}"
                )));
            }
            let index = graph.add_node(vertex);
            id_to_index.insert(gml_id, index);
        }

        for edge in gml_graph.edges {
            let edge = Edge::try_from(edge).map_err(TopologyError::Attribute)?;
            let source = *id_to_index
                .get(&edge.source)
                .ok_or_else(|| TopologyError::Attribute(format!("edge source {} doesn't exist", edge.source)))?;
            let target = *id_to_index
                .get(&edge.target)
                .ok_or_else(|| TopologyError::Attribute(format!("edge target {} doesn't exist", edge.target)))?;
            graph.add_edge(source, target, edge);
        }

        debug!(
            "parsed graph: {} vertices, {} edges, directed={}",
            graph.node_count(),
            graph.edge_count(),
            graph.is_directed(),
        );

        Ok(Self {
            graph,
            id_to_index,
        })
    }

    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_directed(&self) -> bool {
        self.graph.is_directed()
    }

    pub fn node_index(&self, gml_id: u32) -> Option<NodeIndex> {
        self.id_to_index.get(&gml_id).copied()
    }

    pub fn all_indices(&self) -> Vec<NodeIndex> {
        (0..self.vertex_count()).map(NodeIndex::new).collect()
    }

    pub fn vertex(&self, index: NodeIndex) -> &Vertex {
        self.graph
            .node_weight(index)
            .expect("NodeIndex must be valid for the lifetime of the graph")
    }

    pub fn edge(&self, index: EdgeIndex) -> &Edge {
        self.graph
            .edge_weight(index)
            .expect("EdgeIndex must be valid for the lifetime of the graph")
    }

    pub fn edge_id(&self, u: NodeIndex, v: NodeIndex) -> Option<EdgeIndex> {
        self.graph.find_edge(u, v)
    }

    pub fn edge_endpoints(&self, e: EdgeIndex) -> (NodeIndex, NodeIndex) {
        let edge = self.edge(e);
        (
            self.node_index(edge.source).unwrap(),
            self.node_index(edge.target).unwrap(),
        )
    }

    /// Incident edges of `v`, deduplicated and in ascending edge-id order so
    /// self-path computation is deterministic.
    pub fn incident_edges(&self, v: NodeIndex) -> Vec<EdgeIndex> {
        let mut edges: Vec<EdgeIndex> = match &self.graph {
            GraphWrapper::Directed(g) => g.edges(v).map(|e| e.id()).collect(),
            GraphWrapper::Undirected(g) => g.edges(v).map(|e| e.id()).collect(),
        };
        edges.sort_by_key(|e| e.index());
        edges.dedup();
        edges
    }

    /// Whether `v` has a self-loop edge.
    pub fn has_self_loop(&self, v: NodeIndex) -> bool {
        self.edge_id(v, v).is_some()
    }

    /// The "opposite" endpoint of `e` relative to `v` (`v` itself for a
    /// self-loop).
    pub fn opposite(&self, e: EdgeIndex, v: NodeIndex) -> NodeIndex {
        let (a, b) = self.edge_endpoints(e);
        if a == v {
            b
        } else {
            a
        }
    }

    /// Raw per-vertex degree as it would be reported by an adjacency-list
    /// graph library: an undirected self-loop is counted twice, once per
    /// direction pointer.
    fn raw_degree(&self, v: NodeIndex) -> usize {
        match &self.graph {
            GraphWrapper::Directed(g) => g.edges(v).count(),
            GraphWrapper::Undirected(g) => g.edges(v).count(),
        }
    }

    /// A graph is complete iff every vertex has a self-loop and its
    /// (self-loop-corrected) degree is at least the vertex count.
    pub fn is_complete(&self) -> bool {
        let v_count = self.vertex_count();
        self.all_indices().into_iter().all(|v| {
            if !self.has_self_loop(v) {
                return false;
            }
            let mut degree = self.raw_degree(v);
            if !self.is_directed() {
                degree -= 1;
            }
            degree >= v_count
        })
    }

    /// Number of weakly/strongly connected clusters (directed graphs use
    /// Tarjan's strongly-connected-components test; for undirected graphs
    /// the same algorithm degenerates to ordinary connected components).
    pub fn cluster_count(&self) -> usize {
        match &self.graph {
            GraphWrapper::Directed(g) => petgraph::algo::tarjan_scc(g).len(),
            GraphWrapper::Undirected(g) => petgraph::algo::tarjan_scc(g).len(),
        }
    }

    pub fn is_strongly_connected(&self) -> bool {
        self.cluster_count() == 1
    }

    /// Run Dijkstra from `src` to every reachable vertex, with edge costs
    /// produced by `cost_fn`. Generic so callers can accumulate whatever
    /// `petgraph::algo::Measure` they need (plain latency, or a combined
    /// latency+reliability cost).
    pub fn dijkstra_with<F, K>(&self, src: NodeIndex, cost_fn: F) -> HashMap<NodeIndex, K>
    where
        F: Fn(&Edge) -> K,
        K: petgraph::algo::Measure + Copy,
    {
        match &self.graph {
            GraphWrapper::Directed(g) => petgraph::algo::dijkstra(g, src, None, |e| cost_fn(e.weight())),
            GraphWrapper::Undirected(g) => petgraph::algo::dijkstra(g, src, None, |e| cost_fn(e.weight())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(directed: bool, extra: &str) -> String {
        format!(
            "graph [\n directed {}\n{}\n]",
            if directed { 1 } else { 0 },
            extra
        )
    }

    #[test]
    fn parses_minimal_graph() {
        let g = graph(
            false,
            r#"
            node [ id 1 bandwidth_down "10 Mbit" bandwidth_up "10 Mbit" ]
            node [ id 2 bandwidth_down "10 Mbit" bandwidth_up "10 Mbit" ]
            edge [ source 1 target 2 latency "5 ms" packet_loss 0.0 ]
            "#,
        );
        let g = NetworkGraph::parse(&g).unwrap();
        assert_eq!(g.vertex_count(), 2);
        assert_eq!(g.edge_count(), 1);
        assert!(!g.is_directed());
    }

    #[test]
    fn rejects_missing_bandwidth() {
        let g = graph(
            false,
            r#"
            node [ id 1 bandwidth_up "10 Mbit" ]
            node [ id 2 bandwidth_down "10 Mbit" bandwidth_up "10 Mbit" ]
            edge [ source 1 target 2 latency "5 ms" packet_loss 0.0 ]
            "#,
        );
        assert!(NetworkGraph::parse(&g).is_err());
    }

    #[test]
    fn completeness_requires_self_loops() {
        let g = graph(
            false,
            r#"
            node [ id 1 bandwidth_down "1 Mbit" bandwidth_up "1 Mbit" ]
            node [ id 2 bandwidth_down "1 Mbit" bandwidth_up "1 Mbit" ]
            edge [ source 1 target 2 latency "10 ms" packet_loss 0.0 ]
            "#,
        );
        let g = NetworkGraph::parse(&g).unwrap();
        // no self-loops anywhere, so even though every pair is connected the
        // graph is not "complete" per the self-loop rule.
        assert!(!g.is_complete());
    }

    #[test]
    fn two_vertex_complete_graph_is_complete() {
        let g = graph(
            false,
            r#"
            node [ id 1 bandwidth_down "1 Mbit" bandwidth_up "1 Mbit" ]
            node [ id 2 bandwidth_down "1 Mbit" bandwidth_up "1 Mbit" ]
            edge [ source 1 target 1 latency "1 ms" packet_loss 0.0 ]
            edge [ source 2 target 2 latency "1 ms" packet_loss 0.0 ]
            edge [ source 1 target 2 latency "10 ms" packet_loss 0.02 ]
            "#,
        );
        let g = NetworkGraph::parse(&g).unwrap();
        assert!(g.is_complete());
        assert!(g.is_strongly_connected());
    }
}
