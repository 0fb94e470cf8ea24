//! Messages and the message store
//!
//! A message travels along a route of channels. While it waits in a queue or
//! sits in a channel slot it is referred to by its [`MessageId`]; the message
//! itself stays in the [`MessageStore`] for the whole run so statistics can
//! be gathered after it completes.

use std::collections::{BTreeMap, VecDeque};
use std::fmt::Display;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::identity::{ChannelId, GroupId, MessageId, NodeId};
use crate::matrix::RoutingTables;

/// Protocol role of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    /// User data
    General,
    /// Carries freshly computed routing tables
    MatrixUpdate,
    /// Asks the receiver to accept a batch, reserving channels on the way
    SendingRequest,
    PositiveSendingResponse,
    NegativeSendingResponse,
}

impl MessageKind {
    pub fn is_response(&self) -> bool {
        matches!(
            self,
            MessageKind::PositiveSendingResponse | MessageKind::NegativeSendingResponse
        )
    }
}

impl Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MessageKind::General => "general",
            MessageKind::MatrixUpdate => "matrix-update",
            MessageKind::SendingRequest => "sending-request",
            MessageKind::PositiveSendingResponse => "positive-response",
            MessageKind::NegativeSendingResponse => "negative-response",
        };
        write!(f, "{}", name)
    }
}

/// Data carried by protocol messages
#[derive(Debug, Clone)]
pub enum MessagePayload {
    /// Tables of one update round
    Tables(Arc<RoutingTables>),
    /// Messages waiting for a reservation handshake to finish
    Batch(Vec<Message>),
}

/// A unit of transmission
#[derive(Debug, Clone)]
pub struct Message {
    pub id: MessageId,
    pub parent_id: GroupId,
    pub kind: MessageKind,
    pub sender_id: NodeId,
    pub receiver_id: NodeId,
    /// Node the message currently belongs to
    pub last_transfer_node_id: NodeId,
    /// Channels still to cross; the front one is being crossed or waited for
    pub route: VecDeque<ChannelId>,
    /// Channels already crossed, in order
    pub traversed: Vec<ChannelId>,
    pub data_size: u32,
    pub service_size: u32,
    /// Failed crossing attempts
    pub send_attempts: u32,
    /// Position inside a split transmission
    pub number_in_package: Option<u32>,
    pub is_canceled: bool,
    pub payload: Option<MessagePayload>,
}

impl Message {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: MessageId,
        parent_id: GroupId,
        kind: MessageKind,
        sender_id: NodeId,
        receiver_id: NodeId,
        route: Vec<ChannelId>,
        data_size: u32,
        service_size: u32,
    ) -> Self {
        Self {
            id,
            parent_id,
            kind,
            sender_id,
            receiver_id,
            last_transfer_node_id: sender_id,
            route: route.into(),
            traversed: Vec::new(),
            data_size,
            service_size,
            send_attempts: 0,
            number_in_package: None,
            is_canceled: false,
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: MessagePayload) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_number_in_package(mut self, number: u32) -> Self {
        self.number_in_package = Some(number);
        self
    }

    /// Total size on the wire
    pub fn size(&self) -> u32 {
        self.data_size + self.service_size
    }

    pub fn is_received(&self) -> bool {
        self.last_transfer_node_id == self.receiver_id
    }

    /// Received or canceled; a resolved message never changes again
    pub fn is_resolved(&self) -> bool {
        self.is_received() || self.is_canceled
    }

    /// Channel the message is waiting for or crossing
    pub fn next_channel(&self) -> Option<ChannelId> {
        self.route.front().copied()
    }

    /// Move the front channel of the route to the crossed list
    pub fn complete_hop(&mut self) -> Option<ChannelId> {
        let channel = self.route.pop_front()?;
        self.traversed.push(channel);
        Some(channel)
    }

    pub fn tables(&self) -> Option<&Arc<RoutingTables>> {
        match &self.payload {
            Some(MessagePayload::Tables(tables)) => Some(tables),
            _ => None,
        }
    }

    pub fn take_batch(&mut self) -> Option<Vec<Message>> {
        match self.payload.take() {
            Some(MessagePayload::Batch(batch)) => Some(batch),
            other => {
                self.payload = other;
                None
            }
        }
    }
}

/// Arena owning every message created during a run
#[derive(Debug, Clone, Default)]
pub struct MessageStore {
    messages: BTreeMap<MessageId, Message>,
    next_message: u64,
    next_group: u64,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh message id
    pub fn next_message_id(&mut self) -> MessageId {
        let id = MessageId(self.next_message);
        self.next_message += 1;
        id
    }

    /// Allocate a fresh group id
    pub fn next_group_id(&mut self) -> GroupId {
        let id = GroupId(self.next_group);
        self.next_group += 1;
        id
    }

    pub fn insert(&mut self, message: Message) -> MessageId {
        let id = message.id;
        self.messages.insert(id, message);
        id
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.get(&id)
    }

    pub fn get_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        self.messages.get_mut(&id)
    }

    pub fn remove(&mut self, id: MessageId) -> Option<Message> {
        self.messages.remove(&id)
    }

    pub fn contains(&self, id: MessageId) -> bool {
        self.messages.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.values()
    }

    /// Messages belonging to `group`
    pub fn group(&self, group: GroupId) -> impl Iterator<Item = &Message> {
        self.messages.values().filter(move |m| m.parent_id == group)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(store: &mut MessageStore) -> Message {
        let id = store.next_message_id();
        Message::new(
            id,
            GroupId(0),
            MessageKind::General,
            NodeId(0),
            NodeId(2),
            vec![ChannelId(0), ChannelId(1)],
            100,
            8,
        )
    }

    #[test]
    fn test_new_message_sits_at_sender() {
        let mut store = MessageStore::new();
        let m = message(&mut store);

        assert_eq!(m.last_transfer_node_id, NodeId(0));
        assert_eq!(m.next_channel(), Some(ChannelId(0)));
        assert_eq!(m.size(), 108);
        assert!(!m.is_received());
        assert!(!m.is_resolved());
    }

    #[test]
    fn test_received_when_at_receiver() {
        let mut store = MessageStore::new();
        let mut m = message(&mut store);
        m.last_transfer_node_id = NodeId(2);
        assert!(m.is_received());
        assert!(m.is_resolved());
    }

    #[test]
    fn test_complete_hop() {
        let mut store = MessageStore::new();
        let mut m = message(&mut store);
        assert_eq!(m.complete_hop(), Some(ChannelId(0)));
        assert_eq!(m.next_channel(), Some(ChannelId(1)));
        assert_eq!(m.traversed, vec![ChannelId(0)]);
        m.complete_hop();
        assert_eq!(m.complete_hop(), None);
        assert_eq!(m.traversed, vec![ChannelId(0), ChannelId(1)]);
    }

    #[test]
    fn test_take_batch_keeps_other_payloads() {
        let mut store = MessageStore::new();
        let mut m = message(&mut store).with_payload(MessagePayload::Tables(Arc::new(RoutingTables::new(1))));
        assert!(m.take_batch().is_none());
        assert!(m.tables().is_some());

        let inner = message(&mut store);
        let mut request = message(&mut store).with_payload(MessagePayload::Batch(vec![inner]));
        assert_eq!(request.take_batch().map(|b| b.len()), Some(1));
        assert!(request.payload.is_none());
    }

    #[test]
    fn test_store_ids_are_unique() {
        let mut store = MessageStore::new();
        let a = store.next_message_id();
        let b = store.next_message_id();
        assert_ne!(a, b);
        assert_ne!(store.next_group_id(), store.next_group_id());
    }

    #[test]
    fn test_group_filter() {
        let mut store = MessageStore::new();
        let a = message(&mut store);
        let mut b = message(&mut store);
        b.parent_id = GroupId(1);
        store.insert(a);
        store.insert(b);

        assert_eq!(store.group(GroupId(0)).count(), 1);
        assert_eq!(store.group(GroupId(1)).count(), 1);
        assert_eq!(store.len(), 2);
    }
}
