//! A thin enum wrapper so the graph store can hold either a directed or an
//! undirected petgraph graph behind one type, without duplicating every call
//! site on the directedness of the loaded topology.

use petgraph::graph::{EdgeIndex, Graph, IndexType, NodeIndex};
use petgraph::{Directed, Undirected};

/** A macro that defines a function for an enum, calling the same function on all enum variants.

For example, the usage:

```ignore
enum_passthrough!(self, (node), Directed, Undirected;
    pub fn node_weight(&self, node: NodeIndex<Ix>) -> Option<&N>
);
```

expands to:

```ignore
pub fn node_weight(&self, node: NodeIndex<Ix>) -> Option<&N> {
    match self {
        Self::Directed(x) => x.node_weight(node),
        Self::Undirected(x) => x.node_weight(node),
    }
}
```
**/
macro_rules! enum_passthrough {
    ($self:ident, $args2:tt, $($variant:ident),+; $v:vis fn $name:ident $args:tt $(-> $($rv:tt)+)?) => {
        $v fn $name $args $(-> $($rv)+)? {
            match $self {
                $(
                Self::$variant(x) => x.$name $args2,
                )*
            }
        }
    };
}

#[derive(Debug)]
pub enum GraphWrapper<N, E, Ix: IndexType> {
    Directed(Graph<N, E, Directed, Ix>),
    Undirected(Graph<N, E, Undirected, Ix>),
}

#[allow(dead_code)]
impl<N, E, Ix: IndexType> GraphWrapper<N, E, Ix> {
    enum_passthrough!(self, (weight), Directed, Undirected;
        pub fn add_node(&mut self, weight: N) -> NodeIndex<Ix>
    );
    enum_passthrough!(self, (a, b, weight), Directed, Undirected;
        pub fn add_edge(&mut self, a: NodeIndex<Ix>, b: NodeIndex<Ix>, weight: E) -> EdgeIndex<Ix>
    );
    enum_passthrough!(self, (node), Directed, Undirected;
        pub fn node_weight(&self, node: NodeIndex<Ix>) -> Option<&N>
    );
    enum_passthrough!(self, (edge), Directed, Undirected;
        pub fn edge_weight(&self, edge: EdgeIndex<Ix>) -> Option<&E>
    );
    enum_passthrough!(self, (a, b), Directed, Undirected;
        pub fn find_edge(&self, a: NodeIndex<Ix>, b: NodeIndex<Ix>) -> Option<EdgeIndex<Ix>>
    );
    enum_passthrough!(self, (), Directed, Undirected;
        pub fn node_count(&self) -> usize
    );
    enum_passthrough!(self, (), Directed, Undirected;
        pub fn edge_count(&self) -> usize
    );

    pub fn is_directed(&self) -> bool {
        matches!(self, Self::Directed(_))
    }
}
