//! A topology and routing engine for a discrete-event network simulator:
//! loads a network graph from GML, validates its structure, and answers
//! latency/reliability/routability queries between simulated hosts attached
//! to it.
//!
//! The module layout mirrors the engine's components directly:
//!
//! - [`graph`]: the parsed graph, its vertex/edge attribute tables, and the
//!   adjacency queries the rest of the crate is built on.
//! - [`validate`]: one-shot structural checks (connectivity, completeness)
//!   run once at load time.
//! - [`path`]: the three path-computation cases (self, direct, shortest).
//! - [`cache`]: the two-level path cache and its admission rule.
//! - [`registry`]: IP-to-vertex attachment bookkeeping.
//! - [`attach`]: the policy that resolves attachment hints to a vertex.
//! - [`topology`]: the concurrent facade tying the above together behind
//!   the engine's lock discipline.

pub mod attach;
pub mod cache;
pub mod error;
pub mod graph;
pub mod path;
pub mod petgraph_wrapper;
pub mod registry;
pub mod topology;
pub mod units;
pub mod validate;

pub use error::{Result, TopologyError};
pub use topology::{Address, NullWorker, Topology, TopologyOptions, Worker};
