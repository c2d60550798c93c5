//! One-shot structural validation that runs once, at load time, over a
//! freshly parsed [`NetworkGraph`]. Per-attribute type/range checks already
//! happened during parsing (`TryFrom` on vertices/edges); this module
//! classifies the graph as a whole and enforces the invariants that depend
//! on the complete structure.

use log::error;

use crate::error::TopologyError;
use crate::graph::NetworkGraph;

/// Derived graph-wide properties computed once at load time.
#[derive(Debug, Clone, Copy)]
pub struct GraphProperties {
    pub is_directed: bool,
    pub cluster_count: usize,
    pub is_complete: bool,
}

/// Classify `graph` and enforce the structural invariants. `use_shortest`
/// comes from the caller's configured routing policy: when `false`, the
/// graph must be complete (every pair of vertices has a direct edge).
pub fn validate(graph: &NetworkGraph, use_shortest: bool) -> Result<GraphProperties, TopologyError> {
    let cluster_count = graph.cluster_count();
    let is_complete = graph.is_complete();
    let properties = GraphProperties {
        is_directed: graph.is_directed(),
        cluster_count,
        is_complete,
    };

    if cluster_count != 1 {
        error!(
            "validation failed: graph has {} clusters, expected 1 (strongly connected)",
            cluster_count
        );
        return Err(TopologyError::GraphStructure(format!(
            "graph is not strongly connected: found {cluster_count} clusters"
        )));
    }

    if !use_shortest && !is_complete {
        error!("validation failed: useShortest=false requires a complete graph");
        return Err(TopologyError::GraphStructure(
            "useShortest=false requires a complete graph (self-loop at every vertex, direct edge between every pair)".to_string(),
        ));
    }

    Ok(properties)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disconnected_graph_fails() {
        let gml = r#"graph [
            directed 0
            node [ id 1 bandwidth_down "1 Mbit" bandwidth_up "1 Mbit" ]
            node [ id 2 bandwidth_down "1 Mbit" bandwidth_up "1 Mbit" ]
            node [ id 3 bandwidth_down "1 Mbit" bandwidth_up "1 Mbit" ]
            node [ id 4 bandwidth_down "1 Mbit" bandwidth_up "1 Mbit" ]
            edge [ source 1 target 2 latency "1 ms" packet_loss 0.0 ]
            edge [ source 3 target 4 latency "1 ms" packet_loss 0.0 ]
        ]"#;
        let graph = NetworkGraph::parse(gml).unwrap();
        match validate(&graph, true) {
            Err(TopologyError::GraphStructure(_)) => {}
            other => panic!("expected GraphStructure error, got {other:?}"),
        }
    }

    #[test]
    fn incomplete_graph_rejected_under_direct_policy() {
        let gml = r#"graph [
            directed 0
            node [ id 1 bandwidth_down "1 Mbit" bandwidth_up "1 Mbit" ]
            node [ id 2 bandwidth_down "1 Mbit" bandwidth_up "1 Mbit" ]
            edge [ source 1 target 2 latency "1 ms" packet_loss 0.0 ]
        ]"#;
        let graph = NetworkGraph::parse(gml).unwrap();
        assert!(validate(&graph, false).is_err());
        assert!(validate(&graph, true).is_ok());
    }
}
