//! The attachment registry (C5): which IPs are bound to which graph
//! vertices, and the set of vertices that carry at least one attached host
//! (the Dijkstra target set for Case C).

use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;

use petgraph::graph::NodeIndex;

/// `ip -> vertex`, plus the set of vertices ever populated through it.
#[derive(Debug, Default)]
pub struct AttachmentRegistry {
    virtual_ip: HashMap<Ipv4Addr, NodeIndex>,
    vertices_with_hosts: HashSet<NodeIndex>,
}

impl AttachmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, ip: Ipv4Addr) -> Option<NodeIndex> {
        self.virtual_ip.get(&ip).copied()
    }

    /// Bind `ip` to `vertex`, replacing any existing binding for that IP.
    /// Idempotent on the points-of-interest set.
    pub fn attach(&mut self, ip: Ipv4Addr, vertex: NodeIndex) {
        self.virtual_ip.insert(ip, vertex);
        self.vertices_with_hosts.insert(vertex);
    }

    /// Remove `ip`'s binding only. The vertex is deliberately left in
    /// `vertices_with_hosts` even if it no longer has any attached IP:
    /// Dijkstra keeps targeting it until the topology is rebuilt. This
    /// mirrors the source behaviour (see the design notes on re-counting).
    pub fn detach(&mut self, ip: Ipv4Addr) {
        self.virtual_ip.remove(&ip);
    }

    pub fn vertices_with_hosts(&self) -> Vec<NodeIndex> {
        self.vertices_with_hosts.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idx(i: usize) -> NodeIndex {
        NodeIndex::new(i)
    }

    #[test]
    fn attach_then_lookup_then_detach() {
        let mut reg = AttachmentRegistry::new();
        let ip: Ipv4Addr = "10.0.0.1".parse().unwrap();
        reg.attach(ip, idx(0));
        assert_eq!(reg.lookup(ip), Some(idx(0)));
        reg.detach(ip);
        assert_eq!(reg.lookup(ip), None);
    }

    #[test]
    fn detach_leaves_vertex_in_points_of_interest() {
        let mut reg = AttachmentRegistry::new();
        let ip: Ipv4Addr = "10.0.0.1".parse().unwrap();
        reg.attach(ip, idx(0));
        reg.detach(ip);
        assert!(reg.vertices_with_hosts().contains(&idx(0)));
    }
}
