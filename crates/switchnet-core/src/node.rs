//! Nodes and their per-channel message queues

use std::collections::{BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::identity::{ChannelId, MessageId, NodeId};
use crate::matrix::NetworkMatrix;

/// Role of a node in the network hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum NodeType {
    #[default]
    Simple,
    /// Seeds routing-table propagation
    CentralMachine,
    /// Gateway of a metropolitan sub-network
    MainMetropolitanMachine,
}

/// Ordered queue of messages bound to one (node, channel) pair
///
/// Holds both messages waiting to leave through the channel and messages
/// that just arrived through it and wait to be received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageQueue {
    channel_id: ChannelId,
    messages: VecDeque<MessageId>,
}

impl MessageQueue {
    pub fn new(channel_id: ChannelId) -> Self {
        Self {
            channel_id,
            messages: VecDeque::new(),
        }
    }

    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    pub fn front(&self) -> Option<MessageId> {
        self.messages.front().copied()
    }

    pub fn push_back(&mut self, message: MessageId) {
        self.messages.push_back(message);
    }

    /// Priority insertion, used for retries and table updates
    pub fn push_front(&mut self, message: MessageId) {
        self.messages.push_front(message);
    }

    pub fn pop_front(&mut self) -> Option<MessageId> {
        self.messages.pop_front()
    }

    /// Remove a message by identity, returning whether it was present
    pub fn remove(&mut self, message: MessageId) -> bool {
        match self.messages.iter().position(|m| *m == message) {
            Some(index) => {
                self.messages.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, message: MessageId) -> bool {
        self.messages.contains(&message)
    }

    pub fn iter(&self) -> impl Iterator<Item = MessageId> + '_ {
        self.messages.iter().copied()
    }

    /// Remove every message matching `pred`, returning the removed ids in order
    pub fn extract_if(&mut self, mut pred: impl FnMut(MessageId) -> bool) -> Vec<MessageId> {
        let mut removed = Vec::new();
        self.messages.retain(|m| {
            if pred(*m) {
                removed.push(*m);
                false
            } else {
                true
            }
        });
        removed
    }

    pub fn drain(&mut self) -> Vec<MessageId> {
        self.messages.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// A switching node
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub node_type: NodeType,
    /// Neighbours reachable through one channel
    pub linked_nodes: BTreeSet<NodeId>,
    /// One queue per incident channel, ordered by channel id
    pub queues: Vec<MessageQueue>,
    /// Inactive nodes are unreachable for routing
    pub is_active: bool,
    /// Whether the node holds the tables of the current round
    pub is_table_updated: bool,
    /// Round of the tables the node last adopted
    pub table_round: Option<u64>,
    pub network_matrix: NetworkMatrix,
    pub received_messages: Vec<MessageId>,
    pub canceled_messages: Vec<MessageId>,
}

impl Node {
    pub fn new(id: NodeId, node_type: NodeType) -> Self {
        Self {
            id,
            node_type,
            linked_nodes: BTreeSet::new(),
            queues: Vec::new(),
            is_active: true,
            is_table_updated: false,
            table_round: None,
            network_matrix: NetworkMatrix::default(),
            received_messages: Vec::new(),
            canceled_messages: Vec::new(),
        }
    }

    /// Create an active simple node
    pub fn simple(id: NodeId) -> Self {
        Self::new(id, NodeType::Simple)
    }

    pub fn is_central_machine(&self) -> bool {
        self.node_type == NodeType::CentralMachine
    }

    pub fn queue(&self, channel: ChannelId) -> Option<&MessageQueue> {
        self.queues.iter().find(|q| q.channel_id() == channel)
    }

    pub fn queue_mut(&mut self, channel: ChannelId) -> Option<&mut MessageQueue> {
        self.queues.iter_mut().find(|q| q.channel_id() == channel)
    }

    /// Add an empty queue for `channel`, keeping channel order; no-op if present
    pub fn add_queue(&mut self, channel: ChannelId) {
        match self.queues.binary_search_by_key(&channel, MessageQueue::channel_id) {
            Ok(_) => {}
            Err(index) => self.queues.insert(index, MessageQueue::new(channel)),
        }
    }

    pub fn remove_queue(&mut self, channel: ChannelId) -> Option<MessageQueue> {
        let index = self.queues.iter().position(|q| q.channel_id() == channel)?;
        Some(self.queues.remove(index))
    }

    pub fn queue_channel_ids(&self) -> Vec<ChannelId> {
        self.queues.iter().map(MessageQueue::channel_id).collect()
    }

    /// Number of messages waiting in all queues of this node
    pub fn total_queue_len(&self) -> usize {
        self.queues.iter().map(MessageQueue::len).sum()
    }
}
