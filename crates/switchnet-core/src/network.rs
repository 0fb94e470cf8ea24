//! Network model
//!
//! The [`Network`] owns nodes, channels and the message arena. Every
//! structural mutation is validated before anything is changed, so a failed
//! call never leaves a half-built channel or node behind.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::channel::{Channel, ConnectionType, link_key};
use crate::error::{ChannelError, MessageError, NodeError};
use crate::identity::{ChannelId, GroupId, MessageId, NodeId};
use crate::message::{Message, MessageKind, MessageStore};
use crate::node::{MessageQueue, Node, NodeType};

/// Nodes, channels and messages of one simulation
#[derive(Debug, Clone, Default)]
pub struct Network {
    nodes: BTreeMap<NodeId, Node>,
    channels: BTreeMap<ChannelId, Channel>,
    /// Adjacency: normalized node pair to the channel linking it
    links: BTreeMap<(NodeId, NodeId), ChannelId>,
    messages: MessageStore,
}

impl Network {
    /// Create an empty network
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node
    ///
    /// Links and queues are derived from channels, so any the node carries
    /// are discarded.
    pub fn add_node(&mut self, mut node: Node) -> Result<(), NodeError> {
        if self.nodes.contains_key(&node.id) {
            return Err(NodeError::Duplicate(node.id));
        }
        node.linked_nodes.clear();
        node.queues.clear();
        debug!(node = %node.id, node_type = ?node.node_type, "Node added");
        self.nodes.insert(node.id, node);
        Ok(())
    }

    /// Add a channel, linking its endpoints and creating one queue per endpoint
    pub fn add_channel(&mut self, mut channel: Channel) -> Result<(), ChannelError> {
        self.check_channel(&channel)?;
        if self.channels.contains_key(&channel.id) {
            return Err(ChannelError::Duplicate(channel.id));
        }
        let key = channel.key();
        if self.links.contains_key(&key) {
            return Err(ChannelError::AlreadyLinked {
                first: key.0,
                second: key.1,
            });
        }

        channel.release();
        channel.first_message = None;
        channel.second_message = None;

        let (a, b) = (channel.first_node, channel.second_node);
        for (node, other) in [(a, b), (b, a)] {
            if let Some(n) = self.nodes.get_mut(&node) {
                n.linked_nodes.insert(other);
                n.add_queue(channel.id);
            }
        }
        debug!(channel = %channel.id, first = %a, second = %b, price = channel.price, "Channel added");
        self.links.insert(key, channel.id);
        self.channels.insert(channel.id, channel);
        Ok(())
    }

    /// Remove the channel between `a` and `b`, if any
    ///
    /// Messages waiting in its queues or crossing it are canceled.
    pub fn remove_channel(&mut self, a: NodeId, b: NodeId) -> Option<Channel> {
        let id = self.links.remove(&link_key(a, b))?;
        let channel = self.channels.remove(&id)?;

        let mut orphaned: Vec<MessageId> = channel.in_flight().collect();
        for (node, other) in [
            (channel.first_node, channel.second_node),
            (channel.second_node, channel.first_node),
        ] {
            if let Some(n) = self.nodes.get_mut(&node) {
                n.linked_nodes.remove(&other);
                if let Some(mut queue) = n.remove_queue(id) {
                    orphaned.extend(queue.drain());
                }
            }
        }
        for message in orphaned {
            self.cancel_message(message);
        }
        debug!(channel = %id, first = %channel.first_node, second = %channel.second_node, "Channel removed");
        Some(channel)
    }

    /// Remove a node together with its channels, if present
    pub fn remove_node(&mut self, id: NodeId) -> Option<Node> {
        let linked: Vec<NodeId> = self.nodes.get(&id)?.linked_nodes.iter().copied().collect();
        for other in linked {
            self.remove_channel(id, other);
        }
        debug!(node = %id, "Node removed");
        self.nodes.remove(&id)
    }

    /// Replace the channel with the same id
    ///
    /// When the endpoints are unchanged the in-flight slots, the reservation
    /// and both queues are kept. A channel turned half-duplex sends the
    /// message in its second slot back to the head of its origin queue.
    /// Otherwise the old channel is removed and the new one added fresh.
    pub fn update_channel(&mut self, mut channel: Channel) -> Result<(), ChannelError> {
        let old = self
            .channels
            .get(&channel.id)
            .ok_or(ChannelError::NotFound(channel.id))?;
        self.check_channel(&channel)?;

        let old_key = old.key();
        let new_key = channel.key();
        if old_key == new_key {
            channel.is_busy = old.is_busy;
            channel.message_owner = old.message_owner;
            channel.first_message = old.first_message;
            let mut displaced = None;
            match channel.connection_type {
                ConnectionType::Duplex => channel.second_message = old.second_message,
                ConnectionType::HalfDuplex => displaced = old.second_message,
            }
            let id = channel.id;
            debug!(channel = %id, price = channel.price, error_chance = channel.error_chance, "Channel updated");
            self.channels.insert(id, channel);
            if let Some(message) = displaced {
                self.return_to_origin(id, message);
            }
            return Ok(());
        }

        if self.links.contains_key(&new_key) {
            return Err(ChannelError::AlreadyLinked {
                first: new_key.0,
                second: new_key.1,
            });
        }
        self.remove_channel(old_key.0, old_key.1);
        self.add_channel(channel)
    }

    /// Put a message taken off `channel` back at the head of its origin queue
    fn return_to_origin(&mut self, channel: ChannelId, message: MessageId) {
        let origin = self.messages.get(message).map(|m| m.last_transfer_node_id);
        let requeued = origin.is_some_and(|node| self.enqueue_front(node, channel, message));
        if requeued {
            debug!(msg = %message, channel = %channel, "Slot closed, message returned to origin");
        } else {
            self.cancel_message(message);
        }
    }

    fn check_channel(&self, channel: &Channel) -> Result<(), ChannelError> {
        channel.validate()?;
        for endpoint in [channel.first_node, channel.second_node] {
            if !self.nodes.contains_key(&endpoint) {
                return Err(ChannelError::MissingEndpoint(endpoint));
            }
        }
        Ok(())
    }

    /// Order-independent channel lookup
    pub fn get_channel(&self, a: NodeId, b: NodeId) -> Option<&Channel> {
        self.links.get(&link_key(a, b)).and_then(|id| self.channels.get(id))
    }

    pub fn get_channel_mut(&mut self, a: NodeId, b: NodeId) -> Option<&mut Channel> {
        let id = *self.links.get(&link_key(a, b))?;
        self.channels.get_mut(&id)
    }

    pub fn channel(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.get(&id)
    }

    pub fn channel_mut(&mut self, id: ChannelId) -> Option<&mut Channel> {
        self.channels.get_mut(&id)
    }

    /// Channels incident to `node`, in channel id order
    pub fn channels_of(&self, node: NodeId) -> Vec<&Channel> {
        self.nodes
            .get(&node)
            .map(|n| {
                n.queues
                    .iter()
                    .filter_map(|q| self.channels.get(&q.channel_id()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.values_mut()
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    pub fn channel_ids(&self) -> Vec<ChannelId> {
        self.channels.keys().copied().collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// The first node acting as central machine
    pub fn central_machine(&self) -> Option<NodeId> {
        self.nodes
            .values()
            .find(|n| n.node_type == NodeType::CentralMachine)
            .map(|n| n.id)
    }

    /// Toggle whether a node takes part in routing
    pub fn set_node_active(&mut self, id: NodeId, active: bool) -> Result<(), NodeError> {
        let node = self.nodes.get_mut(&id).ok_or(NodeError::NotFound(id))?;
        node.is_active = active;
        debug!(node = %id, active, "Node activity changed");
        Ok(())
    }

    pub fn messages(&self) -> &MessageStore {
        &self.messages
    }

    pub fn messages_mut(&mut self) -> &mut MessageStore {
        &mut self.messages
    }

    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.messages.get(id)
    }

    pub fn message_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        self.messages.get_mut(id)
    }

    pub fn queue(&self, node: NodeId, channel: ChannelId) -> Option<&MessageQueue> {
        self.nodes.get(&node).and_then(|n| n.queue(channel))
    }

    pub fn queue_mut(&mut self, node: NodeId, channel: ChannelId) -> Option<&mut MessageQueue> {
        self.nodes.get_mut(&node).and_then(|n| n.queue_mut(channel))
    }

    /// Length of the queue `node` keeps for `channel`, zero when absent
    pub fn queue_len(&self, node: NodeId, channel: ChannelId) -> usize {
        self.queue(node, channel).map_or(0, MessageQueue::len)
    }

    /// Append to the tail of a queue, returning false when the queue does not exist
    pub fn enqueue(&mut self, node: NodeId, channel: ChannelId, message: MessageId) -> bool {
        match self.queue_mut(node, channel) {
            Some(queue) => {
                queue.push_back(message);
                trace!(node = %node, channel = %channel, msg = %message, "Enqueued");
                true
            }
            None => false,
        }
    }

    /// Insert at the head of a queue, returning false when the queue does not exist
    pub fn enqueue_front(&mut self, node: NodeId, channel: ChannelId, message: MessageId) -> bool {
        match self.queue_mut(node, channel) {
            Some(queue) => {
                queue.push_front(message);
                trace!(node = %node, channel = %channel, msg = %message, "Enqueued at head");
                true
            }
            None => false,
        }
    }

    /// Take a message off every queue and channel slot holding it
    pub fn detach_message(&mut self, message: MessageId) -> bool {
        let mut found = false;
        for node in self.nodes.values_mut() {
            for queue in &mut node.queues {
                found |= queue.remove(message);
            }
        }
        for channel in self.channels.values_mut() {
            for slot in crate::channel::Slot::ALL {
                if channel.slot(slot) == Some(message) {
                    channel.take_slot(slot);
                    found = true;
                }
            }
        }
        found
    }

    /// Mark a message canceled and record it with its receiver
    ///
    /// Resolved messages are left untouched.
    pub fn cancel_message(&mut self, id: MessageId) {
        let Some(message) = self.messages.get_mut(id) else {
            return;
        };
        if message.is_resolved() {
            return;
        }
        message.is_canceled = true;
        let receiver = message.receiver_id;
        let kind = message.kind;
        if let Some(node) = self.nodes.get_mut(&receiver) {
            node.canceled_messages.push(id);
        }
        debug!(msg = %id, kind = %kind, receiver = %receiver, "Message canceled");
    }

    /// Drop every channel reservation held by `group`, returning how many were held
    pub fn release_group(&mut self, group: GroupId) -> usize {
        let mut released = 0;
        for channel in self.channels.values_mut() {
            if channel.is_busy && channel.message_owner == Some(group) {
                channel.release();
                released += 1;
            }
        }
        if released > 0 {
            debug!(group = %group, released, "Reservations released");
        }
        released
    }

    /// Record a message in the received list of `node`
    pub fn record_received(&mut self, node: NodeId, id: MessageId) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.received_messages.push(id);
        }
    }

    /// Check that a message refers to existing nodes and follows a contiguous route
    pub fn validate_message(&self, message: &Message) -> Result<(), MessageError> {
        for node in [message.sender_id, message.receiver_id, message.last_transfer_node_id] {
            if !self.nodes.contains_key(&node) {
                return Err(MessageError::UnknownNode(node));
            }
        }
        if message.kind == MessageKind::General && message.data_size == 0 {
            return Err(MessageError::ZeroSize);
        }
        if message.route.is_empty() {
            if message.last_transfer_node_id != message.receiver_id {
                return Err(MessageError::EmptyRoute {
                    sender: message.sender_id,
                    receiver: message.receiver_id,
                });
            }
            return Ok(());
        }

        let mut current = message.last_transfer_node_id;
        for channel_id in &message.route {
            current = self
                .channels
                .get(channel_id)
                .and_then(|c| c.other_end(current))
                .ok_or(MessageError::BrokenRoute(*channel_id))?;
        }
        if current != message.receiver_id {
            let last = message.route.back().copied().unwrap_or(ChannelId(0));
            return Err(MessageError::BrokenRoute(last));
        }
        Ok(())
    }

    /// Validate and store a message, returning its id
    pub fn insert_message(&mut self, message: Message) -> Result<MessageId, MessageError> {
        self.validate_message(&message)?;
        Ok(self.messages.insert(message))
    }

    /// Messages neither received nor canceled
    pub fn pending_message_count(&self) -> usize {
        self.messages.iter().filter(|m| !m.is_resolved()).count()
    }

    /// Messages currently crossing a channel
    pub fn in_flight_count(&self) -> usize {
        self.channels.values().map(|c| c.in_flight().count()).sum()
    }
}
