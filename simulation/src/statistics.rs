//! Delivery statistics over finished message groups

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use switchnet_core::{GroupId, Message, MessageKind, Network};

use crate::registrator::MessageRegistrator;

/// Figures for one slice of the finished traffic
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct KindStatistics {
    pub groups: usize,
    pub messages: usize,
    pub received: usize,
    pub canceled: usize,
    pub total_data_size: u64,
    pub total_service_size: u64,
    /// Mean ticks from a group's first sighting to its completion
    pub average_delivery_time: f64,
    /// Mean failed crossings per message
    pub average_send_attempts: f64,
}

/// Statistics for every kind of message and for general traffic alone
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MessagesStatistics {
    pub all: KindStatistics,
    pub general: KindStatistics,
}

pub struct MessagesStatisticCounter;

impl MessagesStatisticCounter {
    /// Summarise the groups the registrator has seen finish
    pub fn count(network: &Network, registrator: &MessageRegistrator) -> MessagesStatistics {
        let finished: BTreeSet<GroupId> = registrator.finished_groups().collect();
        let messages: Vec<&Message> = network
            .messages()
            .iter()
            .filter(|m| finished.contains(&m.parent_id))
            .collect();

        MessagesStatistics {
            all: summarize(&messages, registrator),
            general: summarize(
                &messages
                    .iter()
                    .copied()
                    .filter(|m| m.kind == MessageKind::General)
                    .collect::<Vec<_>>(),
                registrator,
            ),
        }
    }
}

fn summarize(messages: &[&Message], registrator: &MessageRegistrator) -> KindStatistics {
    let groups: BTreeSet<GroupId> = messages.iter().map(|m| m.parent_id).collect();
    let mut stats = KindStatistics {
        groups: groups.len(),
        messages: messages.len(),
        ..Default::default()
    };

    for message in messages {
        if message.is_canceled {
            stats.canceled += 1;
        } else if message.is_received() {
            stats.received += 1;
        }
        stats.total_data_size += u64::from(message.data_size);
        stats.total_service_size += u64::from(message.service_size);
    }

    if !messages.is_empty() {
        let attempts: u64 = messages.iter().map(|m| u64::from(m.send_attempts)).sum();
        stats.average_send_attempts = attempts as f64 / messages.len() as f64;
    }
    if !groups.is_empty() {
        let total_time: u64 = groups.iter().filter_map(|g| registrator.delivery_time(*g)).sum();
        stats.average_delivery_time = total_time as f64 / groups.len() as f64;
    }
    stats
}

impl fmt::Display for KindStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Groups:                {}", self.groups)?;
        writeln!(f, "  Messages:              {}", self.messages)?;
        writeln!(f, "  Received:              {}", self.received)?;
        writeln!(f, "  Canceled:              {}", self.canceled)?;
        writeln!(f, "  Data size:             {}", self.total_data_size)?;
        writeln!(f, "  Service size:          {}", self.total_service_size)?;
        writeln!(f, "  Avg delivery time:     {:.2} ticks", self.average_delivery_time)?;
        write!(f, "  Avg send attempts:     {:.2}", self.average_send_attempts)
    }
}

impl fmt::Display for MessagesStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "All messages:")?;
        writeln!(f, "{}", self.all)?;
        writeln!(f, "General messages:")?;
        write!(f, "{}", self.general)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchnet_core::{Channel, ChannelId, Node, NodeId};

    fn network() -> Network {
        let mut network = Network::new();
        network.add_node(Node::simple(NodeId(0))).unwrap();
        network.add_node(Node::simple(NodeId(1))).unwrap();
        network
            .add_channel(Channel::new(ChannelId(0), NodeId(0), NodeId(1), 1.0, 0.0))
            .unwrap();
        network
    }

    fn add(network: &mut Network, group: GroupId, kind: MessageKind, data: u32, service: u32) -> switchnet_core::MessageId {
        let id = network.messages_mut().next_message_id();
        let message = Message::new(id, group, kind, NodeId(0), NodeId(1), vec![ChannelId(0)], data, service);
        network.insert_message(message).unwrap()
    }

    #[test]
    fn test_only_finished_groups_count() {
        let mut network = network();
        let done = network.messages_mut().next_group_id();
        let open = network.messages_mut().next_group_id();
        let a = add(&mut network, done, MessageKind::General, 10, 2);
        add(&mut network, open, MessageKind::General, 99, 2);

        let mut registrator = MessageRegistrator::new();
        registrator.register_messages(&network);
        let message = network.message_mut(a).unwrap();
        message.last_transfer_node_id = NodeId(1);
        message.send_attempts = 3;
        registrator.register_messages(&network);
        registrator.register_messages(&network);

        let stats = MessagesStatisticCounter::count(&network, &registrator);
        assert_eq!(stats.all.groups, 1);
        assert_eq!(stats.all.messages, 1);
        assert_eq!(stats.all.received, 1);
        assert_eq!(stats.all.total_data_size, 10);
        assert_eq!(stats.all.total_service_size, 2);
        assert_eq!(stats.all.average_delivery_time, 1.0);
        assert_eq!(stats.all.average_send_attempts, 3.0);
    }

    #[test]
    fn test_general_slice_excludes_service_traffic() {
        let mut network = network();
        let general = network.messages_mut().next_group_id();
        let update = network.messages_mut().next_group_id();
        add(&mut network, general, MessageKind::General, 10, 0);
        let u = add(&mut network, update, MessageKind::MatrixUpdate, 4, 1);
        let g = network.messages().group(general).next().unwrap().id;
        network.cancel_message(g);
        network.cancel_message(u);

        let mut registrator = MessageRegistrator::new();
        registrator.register_messages(&network);
        let stats = MessagesStatisticCounter::count(&network, &registrator);

        assert_eq!(stats.all.groups, 2);
        assert_eq!(stats.all.canceled, 2);
        assert_eq!(stats.general.groups, 1);
        assert_eq!(stats.general.messages, 1);
        assert_eq!(stats.general.total_data_size, 10);
    }

    #[test]
    fn test_empty_store_is_zeroed() {
        let network = network();
        let registrator = MessageRegistrator::new();
        let stats = MessagesStatisticCounter::count(&network, &registrator);
        assert_eq!(stats, MessagesStatistics::default());
        assert!(stats.to_string().contains("General messages:"));
    }
}
