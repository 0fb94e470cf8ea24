//! Routing error types
//!
//! Only misuse of the router is an error. An unreachable destination is an
//! ordinary outcome and is reported as `None` by
//! [`MessageRouter::get_route`](crate::MessageRouter::get_route).

use switchnet_core::NodeId;
use thiserror::Error;

/// Errors raised by the router
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoutingError {
    /// The node to compute a table for is not part of the network
    #[error("Source node {0} not found")]
    UnknownSource(NodeId),
}

/// Result type for routing operations
pub type RoutingResult<T> = Result<T, RoutingError>;
