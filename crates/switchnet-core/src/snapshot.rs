//! Serializable snapshot of a network's structure
//!
//! Persistence collaborators load and save networks through these records.
//! Only structure is captured: runtime state (queues, slots, tables,
//! messages) starts fresh when a snapshot is loaded.

use serde::{Deserialize, Serialize};

use crate::channel::{Channel, ChannelType, ConnectionType};
use crate::error::NetworkError;
use crate::identity::{ChannelId, NodeId};
use crate::network::Network;
use crate::node::{Node, NodeType};

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    #[serde(default)]
    pub node_type: NodeType,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub id: ChannelId,
    pub first_node: NodeId,
    pub second_node: NodeId,
    pub price: f64,
    pub error_chance: f64,
    #[serde(default)]
    pub connection_type: ConnectionType,
    #[serde(default)]
    pub channel_type: ChannelType,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub nodes: Vec<NodeRecord>,
    pub channels: Vec<ChannelRecord>,
}

impl Network {
    /// Capture the structure of this network
    pub fn to_snapshot(&self) -> NetworkSnapshot {
        NetworkSnapshot {
            nodes: self
                .nodes()
                .map(|n| NodeRecord {
                    id: n.id,
                    node_type: n.node_type,
                    is_active: n.is_active,
                })
                .collect(),
            channels: self
                .channels()
                .map(|c| ChannelRecord {
                    id: c.id,
                    first_node: c.first_node,
                    second_node: c.second_node,
                    price: c.price,
                    error_chance: c.error_chance,
                    connection_type: c.connection_type,
                    channel_type: c.channel_type,
                })
                .collect(),
        }
    }

    /// Build a network from a snapshot, validating every record
    pub fn from_snapshot(snapshot: &NetworkSnapshot) -> Result<Self, NetworkError> {
        let mut network = Network::new();
        for record in &snapshot.nodes {
            let mut node = Node::new(record.id, record.node_type);
            node.is_active = record.is_active;
            network.add_node(node)?;
        }
        for record in &snapshot.channels {
            let channel = Channel::new(
                record.id,
                record.first_node,
                record.second_node,
                record.price,
                record.error_chance,
            )
            .with_connection_type(record.connection_type)
            .with_channel_type(record.channel_type);
            network.add_channel(channel)?;
        }
        Ok(network)
    }
}
