//! Channels between nodes

use serde::{Deserialize, Serialize};

use crate::error::ChannelError;
use crate::identity::{ChannelId, GroupId, MessageId, NodeId};

/// How many directions a channel carries at once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ConnectionType {
    /// Both directions simultaneously, one slot per direction
    #[default]
    Duplex,
    /// One message at a time, first slot only
    HalfDuplex,
}

/// Physical medium of a channel
///
/// Informational only; it does not take part in pricing or exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ChannelType {
    #[default]
    Ground,
    Satellite,
}

/// One of the two in-flight positions of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    First,
    Second,
}

impl Slot {
    pub const ALL: [Slot; 2] = [Slot::First, Slot::Second];
}

/// An undirected link between two nodes
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub id: ChannelId,
    pub first_node: NodeId,
    pub second_node: NodeId,
    /// Base price of a hop, strictly positive
    pub price: f64,
    /// Probability that a crossing fails, in [0, 1]
    pub error_chance: f64,
    pub connection_type: ConnectionType,
    pub channel_type: ChannelType,
    /// Reserved by a sending request
    pub is_busy: bool,
    /// Group holding the reservation while `is_busy`
    pub message_owner: Option<GroupId>,
    pub first_message: Option<MessageId>,
    pub second_message: Option<MessageId>,
}

impl Channel {
    /// Create an idle duplex ground channel
    pub fn new(id: ChannelId, first_node: NodeId, second_node: NodeId, price: f64, error_chance: f64) -> Self {
        Self {
            id,
            first_node,
            second_node,
            price,
            error_chance,
            connection_type: ConnectionType::Duplex,
            channel_type: ChannelType::Ground,
            is_busy: false,
            message_owner: None,
            first_message: None,
            second_message: None,
        }
    }

    pub fn with_connection_type(mut self, connection_type: ConnectionType) -> Self {
        self.connection_type = connection_type;
        self
    }

    pub fn with_channel_type(mut self, channel_type: ChannelType) -> Self {
        self.channel_type = channel_type;
        self
    }

    /// Check the value invariants that do not depend on the network
    pub fn validate(&self) -> Result<(), ChannelError> {
        if self.first_node == self.second_node {
            return Err(ChannelError::SelfLoop(self.first_node));
        }
        if !self.price.is_finite() || self.price <= 0.0 {
            return Err(ChannelError::InvalidPrice(self.price));
        }
        if !(0.0..=1.0).contains(&self.error_chance) {
            return Err(ChannelError::InvalidErrorChance(self.error_chance));
        }
        Ok(())
    }

    /// Order-insensitive endpoint match
    pub fn connects(&self, a: NodeId, b: NodeId) -> bool {
        (self.first_node == a && self.second_node == b) || (self.first_node == b && self.second_node == a)
    }

    pub fn is_incident(&self, node: NodeId) -> bool {
        self.first_node == node || self.second_node == node
    }

    /// The endpoint opposite to `node`
    pub fn other_end(&self, node: NodeId) -> Option<NodeId> {
        if self.first_node == node {
            Some(self.second_node)
        } else if self.second_node == node {
            Some(self.first_node)
        } else {
            None
        }
    }

    /// Endpoints in normalized (smaller, larger) order
    pub fn key(&self) -> (NodeId, NodeId) {
        link_key(self.first_node, self.second_node)
    }

    pub fn slot(&self, slot: Slot) -> Option<MessageId> {
        match slot {
            Slot::First => self.first_message,
            Slot::Second => self.second_message,
        }
    }

    pub fn set_slot(&mut self, slot: Slot, message: MessageId) {
        match slot {
            Slot::First => self.first_message = Some(message),
            Slot::Second => self.second_message = Some(message),
        }
    }

    pub fn take_slot(&mut self, slot: Slot) -> Option<MessageId> {
        match slot {
            Slot::First => self.first_message.take(),
            Slot::Second => self.second_message.take(),
        }
    }

    /// Messages currently on the wire
    pub fn in_flight(&self) -> impl Iterator<Item = MessageId> {
        self.first_message.into_iter().chain(self.second_message)
    }

    /// Whether a reservation held by another group blocks `group`
    pub fn is_reserved_for_other(&self, group: GroupId) -> bool {
        self.is_busy && self.message_owner != Some(group)
    }

    pub fn reserve(&mut self, group: GroupId) {
        self.is_busy = true;
        self.message_owner = Some(group);
    }

    pub fn release(&mut self) {
        self.is_busy = false;
        self.message_owner = None;
    }
}

/// Normalized key for an unordered node pair
pub fn link_key(a: NodeId, b: NodeId) -> (NodeId, NodeId) {
    if a <= b { (a, b) } else { (b, a) }
}
