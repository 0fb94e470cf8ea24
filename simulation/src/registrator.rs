//! Per-group timing
//!
//! The registrator looks at the message store once per tick and notes when
//! each group was first seen and when all of its messages were resolved.

use std::collections::BTreeMap;

use switchnet_core::{GroupId, Network};
use tracing::trace;

/// Start and end ticks of every message group
#[derive(Debug, Clone, Default)]
pub struct MessageRegistrator {
    tick: u64,
    start_times: BTreeMap<GroupId, u64>,
    end_times: BTreeMap<GroupId, u64>,
}

impl MessageRegistrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current tick for new and newly finished groups, then advance
    pub fn register_messages(&mut self, network: &Network) {
        let mut resolved: BTreeMap<GroupId, bool> = BTreeMap::new();
        for message in network.messages().iter() {
            let entry = resolved.entry(message.parent_id).or_insert(true);
            *entry &= message.is_resolved();
        }

        for (group, done) in resolved {
            self.start_times.entry(group).or_insert(self.tick);
            if done && !self.end_times.contains_key(&group) {
                self.end_times.insert(group, self.tick);
                trace!(group = %group, tick = self.tick, "Group finished");
            }
        }
        self.tick += 1;
    }

    /// Number of registrations so far
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn start_time(&self, group: GroupId) -> Option<u64> {
        self.start_times.get(&group).copied()
    }

    pub fn end_time(&self, group: GroupId) -> Option<u64> {
        self.end_times.get(&group).copied()
    }

    /// Ticks between first sighting and completion
    pub fn delivery_time(&self, group: GroupId) -> Option<u64> {
        Some(self.end_time(group)? - self.start_time(group)?)
    }

    pub fn start_times(&self) -> &BTreeMap<GroupId, u64> {
        &self.start_times
    }

    pub fn end_times(&self) -> &BTreeMap<GroupId, u64> {
        &self.end_times
    }

    /// Groups whose every message is received or canceled
    pub fn finished_groups(&self) -> impl Iterator<Item = GroupId> + '_ {
        self.end_times.keys().copied()
    }

    pub fn is_finished(&self, group: GroupId) -> bool {
        self.end_times.contains_key(&group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchnet_core::{Channel, ChannelId, Message, MessageKind, Node, NodeId};

    fn network_with_message() -> (Network, GroupId) {
        let mut network = Network::new();
        network.add_node(Node::simple(NodeId(0))).unwrap();
        network.add_node(Node::simple(NodeId(1))).unwrap();
        network
            .add_channel(Channel::new(ChannelId(0), NodeId(0), NodeId(1), 1.0, 0.0))
            .unwrap();
        let id = network.messages_mut().next_message_id();
        let group = network.messages_mut().next_group_id();
        let message = Message::new(id, group, MessageKind::General, NodeId(0), NodeId(1), vec![ChannelId(0)], 8, 0);
        network.insert_message(message).unwrap();
        (network, group)
    }

    #[test]
    fn test_start_recorded_once() {
        let (network, group) = network_with_message();
        let mut registrator = MessageRegistrator::new();

        registrator.register_messages(&network);
        registrator.register_messages(&network);

        assert_eq!(registrator.start_time(group), Some(0));
        assert_eq!(registrator.end_time(group), None);
        assert_eq!(registrator.tick(), 2);
    }

    #[test]
    fn test_end_recorded_once() {
        let (mut network, group) = network_with_message();
        let mut registrator = MessageRegistrator::new();
        registrator.register_messages(&network);

        let id = network.messages().group(group).next().unwrap().id;
        network.message_mut(id).unwrap().last_transfer_node_id = NodeId(1);
        registrator.register_messages(&network);
        registrator.register_messages(&network);

        assert_eq!(registrator.end_time(group), Some(1));
        assert_eq!(registrator.delivery_time(group), Some(1));
        assert_eq!(registrator.finished_groups().collect::<Vec<_>>(), vec![group]);
    }

    #[test]
    fn test_canceled_message_finishes_group() {
        let (mut network, group) = network_with_message();
        let mut registrator = MessageRegistrator::new();

        let id = network.messages().group(group).next().unwrap().id;
        network.cancel_message(id);
        registrator.register_messages(&network);

        assert!(registrator.is_finished(group));
        assert_eq!(registrator.delivery_time(group), Some(0));
    }
}
