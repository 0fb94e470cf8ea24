//! # Switchnet Core
//!
//! Core types, the network model and the error taxonomy for the switchnet
//! message-switching network simulator.
//!
//! The network owns every entity of a simulation run. Nodes, channels and
//! messages refer to each other by id only, so the whole object graph lives
//! in one arena and can be mutated tick by tick without shared ownership.
//!
//! ## Key Types
//!
//! - [`Network`]: nodes, channels, adjacency and the [`MessageStore`]
//! - [`Node`]: a switching node with one [`MessageQueue`] per incident channel
//! - [`Channel`]: an undirected link with price, error chance and two in-flight slots
//! - [`Message`]: a unit of transmission, grouped by [`GroupId`]
//! - [`NetworkMatrix`]: one node's distance-vector table
//! - [`NetworkSnapshot`]: serde form of a network for persistence collaborators
//!
//! ## Errors
//!
//! Structural mistakes (duplicate ids, missing endpoints, prices or error
//! chances out of range, malformed messages) surface as [`NodeError`],
//! [`ChannelError`] and [`MessageError`]. A failed mutation leaves the
//! network unchanged.

pub mod channel;
pub mod error;
pub mod identity;
pub mod matrix;
pub mod message;
pub mod network;
pub mod node;
pub mod snapshot;

// Re-export main types
pub use channel::*;
pub use error::*;
pub use identity::*;
pub use matrix::*;
pub use message::*;
pub use network::*;
pub use node::*;
pub use snapshot::*;
