//! Price computation and route lookup
//!
//! The [`MessageRouter`] is stateless apart from its configuration: it reads
//! channel state and queue lengths from the [`Network`] and writes nothing.
//! Callers decide where computed tables go.

use std::collections::{BTreeMap, BTreeSet};

use switchnet_core::{ChannelId, Network, NetworkMatrix, NodeId, RoutingTables};
use tracing::{debug, trace, warn};

use crate::error::{RoutingError, RoutingResult};

/// Tolerance for price comparisons
pub const EPS: f64 = 1e-6;

/// Tunables of the price formula
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouterConfig {
    /// Added to the error chance so perfectly reliable channels still cost something
    pub error_offset: f64,
    /// Tolerance for tie-breaking and route reconstruction
    pub eps: f64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            error_offset: 0.1,
            eps: EPS,
        }
    }
}

/// Distance-vector router
#[derive(Debug, Clone, Default)]
pub struct MessageRouter {
    config: RouterConfig,
}

impl MessageRouter {
    pub fn new(config: RouterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Price of the single hop `from -> to`
    ///
    /// Zero for `from == to`; `+inf` when a node is missing or inactive or no
    /// channel links the two.
    pub fn count_price(&self, network: &Network, from: NodeId, to: NodeId) -> f64 {
        if from == to {
            return 0.0;
        }
        let (Some(a), Some(b)) = (network.node(from), network.node(to)) else {
            return f64::INFINITY;
        };
        if !a.is_active || !b.is_active {
            return f64::INFINITY;
        }
        let Some(channel) = network.get_channel(from, to) else {
            return f64::INFINITY;
        };
        let congestion = network.queue_len(from, channel.id) as f64 + 1.0;
        channel.price * (channel.error_chance + self.config.error_offset) * congestion
    }

    /// Compute the price table of `source`
    ///
    /// Greedy relaxation: the unvisited node with the smallest tentative price
    /// is settled next, ties within `eps` going to the smaller id. Stops when
    /// every node is settled or the cheapest candidate is unreachable. Every
    /// node of the network appears in the result.
    pub fn count_price_matrix(&self, network: &Network, source: NodeId) -> RoutingResult<NetworkMatrix> {
        if !network.contains_node(source) {
            return Err(RoutingError::UnknownSource(source));
        }

        let mut matrix = NetworkMatrix::new(source);
        let mut tentative: BTreeMap<NodeId, f64> = network
            .node_ids()
            .into_iter()
            .map(|id| (id, f64::INFINITY))
            .collect();
        tentative.insert(source, 0.0);
        let mut unvisited: BTreeSet<NodeId> = tentative.keys().copied().collect();

        while let Some((current, price)) = self.cheapest(&unvisited, &tentative) {
            if price.is_infinite() {
                break;
            }
            unvisited.remove(&current);

            let Some(node) = network.node(current) else {
                continue;
            };
            for &neighbor in &node.linked_nodes {
                if !unvisited.contains(&neighbor) {
                    continue;
                }
                let edge = self.count_price(network, current, neighbor);
                matrix.set_edge_price(current, neighbor, edge);

                let candidate = price + edge;
                let best = tentative.get(&neighbor).copied().unwrap_or(f64::INFINITY);
                if candidate < best - self.config.eps {
                    trace!(source = %source, node = %neighbor, via = %current, price = candidate, "Relaxed");
                    tentative.insert(neighbor, candidate);
                }
            }
        }

        for (node, price) in tentative {
            matrix.set_price(node, price);
        }
        debug!(
            source = %source,
            reachable = matrix.reachable_count(),
            total = matrix.len(),
            "Price matrix computed"
        );
        Ok(matrix)
    }

    fn cheapest(&self, unvisited: &BTreeSet<NodeId>, tentative: &BTreeMap<NodeId, f64>) -> Option<(NodeId, f64)> {
        let mut best: Option<(NodeId, f64)> = None;
        for &node in unvisited {
            let price = tentative.get(&node).copied().unwrap_or(f64::INFINITY);
            match best {
                None => best = Some((node, price)),
                Some((_, best_price)) if price < best_price - self.config.eps => best = Some((node, price)),
                _ => {}
            }
        }
        best
    }

    /// Compute the tables of every node for one update round
    pub fn count_all(&self, network: &Network, round: u64) -> RoutingTables {
        let mut tables = RoutingTables::new(round);
        for id in network.node_ids() {
            match self.count_price_matrix(network, id) {
                Ok(matrix) => tables.insert(id, matrix),
                Err(e) => warn!(error = %e, "Skipping table"),
            }
        }
        tables
    }

    /// Route from `sender` to `receiver` according to the sender's cached table
    ///
    /// Returns an empty route when both are the same node and `None` when the
    /// receiver is unreachable in the cached table or the table no longer
    /// matches the topology. `None` is final: callers must not retry.
    pub fn get_route(&self, network: &Network, sender: NodeId, receiver: NodeId) -> Option<Vec<ChannelId>> {
        if sender == receiver {
            return Some(Vec::new());
        }
        let matrix = &network.node(sender)?.network_matrix;
        let target_price = matrix.price_to(receiver);
        if !target_price.is_finite() {
            trace!(sender = %sender, receiver = %receiver, "Receiver unreachable");
            return None;
        }

        let mut route = Vec::new();
        let mut current = receiver;
        let mut current_price = target_price;
        while current != sender {
            if route.len() >= network.node_count() {
                warn!(sender = %sender, receiver = %receiver, "Route reconstruction did not converge");
                return None;
            }
            let node = network.node(current)?;
            let predecessor = node.linked_nodes.iter().copied().find(|&candidate| {
                let price = matrix.price_to(candidate);
                price.is_finite()
                    && (price + matrix.edge_price(candidate, current) - current_price).abs() <= self.config.eps
            });
            let Some(previous) = predecessor else {
                debug!(sender = %sender, receiver = %receiver, at = %current, "Cached table is stale");
                return None;
            };
            let channel = network.get_channel(previous, current)?;
            route.push(channel.id);
            current = previous;
            current_price = matrix.price_to(previous);
        }

        route.reverse();
        Some(route)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchnet_core::{Channel, Node};

    fn pair(error_chance: f64) -> Network {
        let mut network = Network::new();
        network.add_node(Node::simple(NodeId(0))).unwrap();
        network.add_node(Node::simple(NodeId(1))).unwrap();
        network
            .add_channel(Channel::new(ChannelId(0), NodeId(0), NodeId(1), 10.0, error_chance))
            .unwrap();
        network
    }

    #[test]
    fn test_count_price_formula() {
        let router = MessageRouter::default();
        let network = pair(0.4);
        let price = router.count_price(&network, NodeId(0), NodeId(1));
        assert!((price - 10.0 * 0.5).abs() < EPS);
    }

    #[test]
    fn test_count_price_grows_with_queue() {
        let router = MessageRouter::default();
        let mut network = pair(0.0);
        network.enqueue(NodeId(0), ChannelId(0), switchnet_core::MessageId(1));
        network.enqueue(NodeId(0), ChannelId(0), switchnet_core::MessageId(2));

        let loaded = router.count_price(&network, NodeId(0), NodeId(1));
        let idle = router.count_price(&network, NodeId(1), NodeId(0));
        assert!((loaded - 3.0).abs() < EPS);
        assert!((idle - 1.0).abs() < EPS);
    }

    #[test]
    fn test_count_price_self_is_zero() {
        let router = MessageRouter::default();
        let mut network = pair(0.0);
        network.set_node_active(NodeId(0), false).unwrap();
        assert_eq!(router.count_price(&network, NodeId(0), NodeId(0)), 0.0);
    }

    #[test]
    fn test_inactive_node_is_unreachable() {
        let router = MessageRouter::default();
        let mut network = pair(0.0);
        network.set_node_active(NodeId(1), false).unwrap();
        assert!(router.count_price(&network, NodeId(0), NodeId(1)).is_infinite());

        let matrix = router.count_price_matrix(&network, NodeId(0)).unwrap();
        assert!(!matrix.is_reachable(NodeId(1)));
        assert_eq!(matrix.price_to(NodeId(0)), 0.0);
    }

    #[test]
    fn test_unknown_source() {
        let router = MessageRouter::default();
        let network = pair(0.0);
        assert_eq!(
            router.count_price_matrix(&network, NodeId(7)),
            Err(RoutingError::UnknownSource(NodeId(7)))
        );
    }

    #[test]
    fn test_route_to_self_is_empty() {
        let router = MessageRouter::default();
        let network = pair(0.0);
        assert_eq!(router.get_route(&network, NodeId(1), NodeId(1)), Some(vec![]));
    }

    #[test]
    fn test_route_needs_cached_table() {
        let router = MessageRouter::default();
        let mut network = pair(0.0);
        assert_eq!(router.get_route(&network, NodeId(0), NodeId(1)), None);

        let matrix = router.count_price_matrix(&network, NodeId(0)).unwrap();
        network.node_mut(NodeId(0)).unwrap().network_matrix = matrix;
        assert_eq!(router.get_route(&network, NodeId(0), NodeId(1)), Some(vec![ChannelId(0)]));
    }
}
