//! Error types for the simulation layer

use switchnet_core::{ChannelError, MessageError, NetworkError, NodeError};
use thiserror::Error;

/// Errors raised while configuring or building a network
#[derive(Debug, Error, PartialEq)]
pub enum BuildError {
    #[error("A metropolitan network needs at least {min} nodes, got {actual}")]
    TooFewNodes { min: u32, actual: u32 },

    #[error("A wide-area network needs at least one metropolitan network")]
    NoMetropolitanNetworks,

    #[error("Price list is empty")]
    EmptyPriceList,

    #[error("Price must be positive and finite, got {0}")]
    InvalidPrice(f64),

    #[error("{name} must lie in [0, 1], got {value}")]
    InvalidProbability { name: &'static str, value: f64 },

    #[error("Average degree must be at least 1, got {0}")]
    InvalidDegree(f64),

    #[error("Message sizes must satisfy 0 < min <= max, got {min}..={max}")]
    InvalidMessageSize { min: u32, max: u32 },

    #[error(transparent)]
    Network(#[from] NetworkError),
}

/// Errors raised by the simulation driver
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Node(#[from] NodeError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Message(#[from] MessageError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot format error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type SimulationResult<T> = Result<T, SimulationError>;
