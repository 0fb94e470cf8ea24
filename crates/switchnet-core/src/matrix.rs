//! Distance-vector tables
//!
//! A [`NetworkMatrix`] holds one node's view of the network: the cheapest
//! known price to every other node, plus the edge prices that were in effect
//! when the table was computed. Routes are rebuilt from the edge prices, not
//! from the live channel state, so a route always agrees with the table it
//! came from.

use std::collections::BTreeMap;

use crate::identity::NodeId;

/// Price table of a single source node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkMatrix {
    source: Option<NodeId>,
    /// Best known price from the source to each node
    node_prices: BTreeMap<NodeId, f64>,
    /// Edge prices evaluated during the computation, keyed by (from, to)
    price_matrix: BTreeMap<(NodeId, NodeId), f64>,
}

impl NetworkMatrix {
    /// Create an empty table for `source`
    pub fn new(source: NodeId) -> Self {
        Self {
            source: Some(source),
            node_prices: BTreeMap::new(),
            price_matrix: BTreeMap::new(),
        }
    }

    /// The node this table was computed for, `None` for a blank table
    pub fn source(&self) -> Option<NodeId> {
        self.source
    }

    /// Cached price to `node`; unknown nodes are unreachable
    pub fn price_to(&self, node: NodeId) -> f64 {
        self.node_prices.get(&node).copied().unwrap_or(f64::INFINITY)
    }

    pub fn set_price(&mut self, node: NodeId, price: f64) {
        self.node_prices.insert(node, price);
    }

    /// Edge price recorded for the hop `from -> to`
    pub fn edge_price(&self, from: NodeId, to: NodeId) -> f64 {
        self.price_matrix
            .get(&(from, to))
            .copied()
            .unwrap_or(f64::INFINITY)
    }

    pub fn set_edge_price(&mut self, from: NodeId, to: NodeId, price: f64) {
        self.price_matrix.insert((from, to), price);
    }

    /// Whether `node` has a finite price in this table
    pub fn is_reachable(&self, node: NodeId) -> bool {
        self.price_to(node).is_finite()
    }

    /// Iterate over (node, price) pairs in node order
    pub fn node_prices(&self) -> impl Iterator<Item = (NodeId, f64)> + '_ {
        self.node_prices.iter().map(|(node, price)| (*node, *price))
    }

    /// Number of nodes with a finite price
    pub fn reachable_count(&self) -> usize {
        self.node_prices.values().filter(|p| p.is_finite()).count()
    }

    pub fn len(&self) -> usize {
        self.node_prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_prices.is_empty()
    }
}

/// All tables produced by one table-update round
///
/// Matrix-update messages carry a shared reference to the round they belong
/// to; a node adopts its own entry when the message reaches it.
#[derive(Debug, Clone, Default)]
pub struct RoutingTables {
    round: u64,
    matrices: BTreeMap<NodeId, NetworkMatrix>,
}

impl RoutingTables {
    pub fn new(round: u64) -> Self {
        Self {
            round,
            matrices: BTreeMap::new(),
        }
    }

    /// Monotonic number of the round that produced these tables
    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn insert(&mut self, node: NodeId, matrix: NetworkMatrix) {
        self.matrices.insert(node, matrix);
    }

    pub fn get(&self, node: NodeId) -> Option<&NetworkMatrix> {
        self.matrices.get(&node)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &NetworkMatrix)> {
        self.matrices.iter().map(|(node, matrix)| (*node, matrix))
    }

    /// Total number of price entries, used as the data size of update messages
    pub fn entry_count(&self) -> usize {
        self.matrices.values().map(NetworkMatrix::len).sum()
    }

    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }
}
