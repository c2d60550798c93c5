//! The error taxonomy for the topology engine.
//!
//! Three kinds are fatal at construction (`GraphLoad`, `GraphStructure`,
//! `Attribute`); a validated topology is assumed to always route, so a
//! `Routing` failure at query time is a programming-invariant violation
//! rather than a recoverable condition (see `Topology::latency`). Address
//! lookup failures are not represented here at all — they surface as
//! `None`, per the `Lookup` kind in the design notes.

use std::fmt;

/// The reason a topology failed to load, or a query failed to route.
#[derive(Debug)]
pub enum TopologyError {
    /// The GML file could not be opened, decompressed, or parsed.
    GraphLoad(String),
    /// The parsed graph violates a structural invariant: not strongly
    /// connected, more than one cluster, or `useShortest=false` with an
    /// incomplete graph.
    GraphStructure(String),
    /// A required vertex/edge attribute is missing, has the wrong type, or
    /// is out of range.
    Attribute(String),
    /// Dijkstra or an edge lookup failed during path computation.
    Routing(String),
}

impl fmt::Display for TopologyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GraphLoad(msg) => write!(f, "failed to load graph: {msg}"),
            Self::GraphStructure(msg) => write!(f, "invalid graph structure: {msg}"),
            Self::Attribute(msg) => write!(f, "invalid attribute: {msg}"),
            Self::Routing(msg) => write!(f, "routing failure: {msg}"),
        }
    }
}

impl std::error::Error for TopologyError {}

pub type Result<T> = std::result::Result<T, TopologyError>;
