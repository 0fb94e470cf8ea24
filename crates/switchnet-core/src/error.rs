//! Error types for the network model

use thiserror::Error;

use crate::identity::{ChannelId, NodeId};

/// Top-level error type for structural network mutations
#[derive(Debug, Error, PartialEq)]
pub enum NetworkError {
    #[error("Node error: {0}")]
    Node(#[from] NodeError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Message error: {0}")]
    Message(#[from] MessageError),
}

/// Errors related to nodes
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NodeError {
    #[error("Node {0} already exists")]
    Duplicate(NodeId),

    #[error("Node {0} not found")]
    NotFound(NodeId),
}

/// Errors related to channels
#[derive(Debug, Error, PartialEq)]
pub enum ChannelError {
    #[error("Channel {0} already exists")]
    Duplicate(ChannelId),

    #[error("Channel {0} not found")]
    NotFound(ChannelId),

    #[error("Nodes {first} and {second} are already linked")]
    AlreadyLinked { first: NodeId, second: NodeId },

    #[error("Channel endpoint {0} does not exist")]
    MissingEndpoint(NodeId),

    #[error("Channel cannot link node {0} to itself")]
    SelfLoop(NodeId),

    #[error("Channel price must be positive and finite, got {0}")]
    InvalidPrice(f64),

    #[error("Channel error chance must lie in [0, 1], got {0}")]
    InvalidErrorChance(f64),
}

/// Errors related to malformed messages
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessageError {
    #[error("Message refers to unknown node {0}")]
    UnknownNode(NodeId),

    #[error("Message from {sender} to {receiver} has an empty route")]
    EmptyRoute { sender: NodeId, receiver: NodeId },

    #[error("Message route is broken at channel {0}")]
    BrokenRoute(ChannelId),

    #[error("General message must carry data")]
    ZeroSize,
}

/// Result type for network mutations
pub type NetworkResult<T> = Result<T, NetworkError>;
