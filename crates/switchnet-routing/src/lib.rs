//! # Switchnet Routing
//!
//! Distance-vector routing for the switchnet simulator.
//!
//! Each node keeps a [`NetworkMatrix`](switchnet_core::NetworkMatrix): the
//! cheapest known price to every other node. Tables are recomputed in rounds
//! triggered by the simulation driver; between rounds, routes are read from
//! the cached table and cost O(hops).
//!
//! ## Pricing
//!
//! The price of one hop grows with the channel's base price, its
//! unreliability and the congestion of the queue feeding it:
//!
//! ```text
//! price(u, v) = channel.price * (channel.error_chance + 0.1) * (queue_len(u, channel) + 1)
//! ```
//!
//! A hop touching an inactive node, or between nodes with no channel, costs
//! `+inf`.
//!
//! ## Route Reconstruction
//!
//! A route is rebuilt backward from the receiver: the predecessor of `v` is
//! the neighbour `u` with `price[u] + edge(u, v) == price[v]` (within
//! [`EPS`]). The edge prices used are those recorded when the table was
//! computed, so the route always agrees with the cached prices.
//!
//! ## Example
//!
//! ```rust,ignore
//! use switchnet_routing::MessageRouter;
//!
//! let router = MessageRouter::default();
//! let matrix = router.count_price_matrix(&network, NodeId(0))?;
//! network.node_mut(NodeId(0)).unwrap().network_matrix = matrix;
//!
//! match router.get_route(&network, NodeId(0), NodeId(3)) {
//!     Some(route) => { /* enqueue along route */ }
//!     None => { /* partitioned, do not retry */ }
//! }
//! ```

pub mod error;
pub mod router;

// Re-export main types
pub use error::{RoutingError, RoutingResult};
pub use router::{EPS, MessageRouter, RouterConfig};
