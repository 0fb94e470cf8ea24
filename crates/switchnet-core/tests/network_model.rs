//! Structural invariants of the network model
//!
//! Every mutation either succeeds completely or fails with a distinguishable
//! error and leaves the network as it was.

use switchnet_core::{
    Channel, ChannelError, ChannelId, ConnectionType, GroupId, Message, MessageKind, Network,
    NetworkError, Node, NodeError, NodeId, NodeType, Slot,
};

fn square() -> Network {
    // 0 - 1
    // |   |
    // 2 - 3
    let mut network = Network::new();
    network.add_node(Node::new(NodeId(0), NodeType::CentralMachine)).unwrap();
    for i in 1..4 {
        network.add_node(Node::simple(NodeId(i))).unwrap();
    }
    let edges = [(0, 0, 1, 10.0), (1, 0, 2, 20.0), (2, 1, 3, 100.0), (3, 2, 3, 1.0)];
    for (id, a, b, price) in edges {
        network
            .add_channel(Channel::new(ChannelId(id), NodeId(a), NodeId(b), price, 0.0))
            .unwrap();
    }
    network
}

#[test]
fn test_channel_lookup_is_symmetric() {
    let network = square();
    for channel in network.channels() {
        let forward = network.get_channel(channel.first_node, channel.second_node);
        let backward = network.get_channel(channel.second_node, channel.first_node);
        assert_eq!(forward.map(|c| c.id), backward.map(|c| c.id));
        assert_eq!(forward.map(|c| c.id), Some(channel.id));
    }
    assert!(network.get_channel(NodeId(0), NodeId(3)).is_none());
}

#[test]
fn test_duplicate_channel_id_leaves_network_unchanged() {
    let mut network = square();
    network.add_node(Node::simple(NodeId(4))).unwrap();
    let before = network.to_snapshot();

    let result = network.add_channel(Channel::new(ChannelId(2), NodeId(0), NodeId(4), 1.0, 0.0));

    assert_eq!(result, Err(ChannelError::Duplicate(ChannelId(2))));
    assert_eq!(network.to_snapshot(), before);
    assert!(network.node(NodeId(4)).unwrap().linked_nodes.is_empty());
    assert!(network.node(NodeId(4)).unwrap().queues.is_empty());
}

#[test]
fn test_out_of_range_values_are_rejected() {
    let mut network = square();
    network.add_node(Node::simple(NodeId(4))).unwrap();

    let negative = Channel::new(ChannelId(9), NodeId(0), NodeId(4), -1.0, 0.0);
    assert_eq!(network.add_channel(negative), Err(ChannelError::InvalidPrice(-1.0)));

    let unreliable = Channel::new(ChannelId(9), NodeId(0), NodeId(4), 1.0, -0.1);
    assert_eq!(network.add_channel(unreliable), Err(ChannelError::InvalidErrorChance(-0.1)));

    assert_eq!(network.channel_count(), 4);
}

#[test]
fn test_duplicate_node() {
    let mut network = square();
    assert_eq!(
        network.add_node(Node::simple(NodeId(2))),
        Err(NodeError::Duplicate(NodeId(2)))
    );
    assert_eq!(network.node_count(), 4);
}

#[test]
fn test_channel_creates_exactly_two_queues() {
    let network = square();
    let queues_for = |channel: ChannelId| {
        network
            .nodes()
            .filter(|n| n.queue(channel).is_some())
            .count()
    };
    for id in network.channel_ids() {
        assert_eq!(queues_for(id), 2);
    }
}

#[test]
fn test_update_channel_keeps_in_flight_state() {
    let mut network = square();
    {
        let channel = network.channel_mut(ChannelId(3)).unwrap();
        channel.set_slot(Slot::First, switchnet_core::MessageId(77));
        channel.reserve(GroupId(5));
    }

    let replacement = Channel::new(ChannelId(3), NodeId(3), NodeId(2), 4.0, 0.5)
        .with_connection_type(ConnectionType::HalfDuplex);
    network.update_channel(replacement).unwrap();

    let channel = network.channel(ChannelId(3)).unwrap();
    assert_eq!(channel.price, 4.0);
    assert_eq!(channel.connection_type, ConnectionType::HalfDuplex);
    assert_eq!(channel.first_message, Some(switchnet_core::MessageId(77)));
    assert_eq!(channel.message_owner, Some(GroupId(5)));
    assert!(network.queue(NodeId(2), ChannelId(3)).is_some());
}

#[test]
fn test_update_channel_requires_existing_id() {
    let mut network = square();
    let result = network.update_channel(Channel::new(ChannelId(40), NodeId(0), NodeId(3), 1.0, 0.0));
    assert_eq!(result, Err(ChannelError::NotFound(ChannelId(40))));
    assert!(network.get_channel(NodeId(0), NodeId(3)).is_none());
}

#[test]
fn test_update_channel_moves_endpoints() {
    let mut network = square();
    network
        .update_channel(Channel::new(ChannelId(2), NodeId(0), NodeId(3), 2.0, 0.0))
        .unwrap();

    assert!(network.get_channel(NodeId(1), NodeId(3)).is_none());
    assert_eq!(network.get_channel(NodeId(3), NodeId(0)).map(|c| c.id), Some(ChannelId(2)));
    assert!(!network.node(NodeId(1)).unwrap().linked_nodes.contains(&NodeId(3)));
    assert!(network.node(NodeId(0)).unwrap().linked_nodes.contains(&NodeId(3)));
}

#[test]
fn test_remove_node_drops_its_channels() {
    let mut network = square();
    let removed = network.remove_node(NodeId(3)).unwrap();
    assert_eq!(removed.id, NodeId(3));
    assert_eq!(network.channel_count(), 2);
    assert!(network.channels_of(NodeId(1)).iter().all(|c| !c.is_incident(NodeId(3))));
    assert!(!network.node(NodeId(2)).unwrap().linked_nodes.contains(&NodeId(3)));
}

#[test]
fn test_insert_message_validates() {
    let mut network = square();
    let id = network.messages_mut().next_message_id();
    let message = Message::new(
        id,
        GroupId(0),
        MessageKind::General,
        NodeId(0),
        NodeId(9),
        vec![ChannelId(0)],
        10,
        2,
    );
    let err = network.insert_message(message).unwrap_err();
    assert_eq!(
        NetworkError::from(err),
        NetworkError::Message(switchnet_core::MessageError::UnknownNode(NodeId(9)))
    );
    assert!(network.messages().is_empty());
}

#[test]
fn test_set_node_active() {
    let mut network = square();
    network.set_node_active(NodeId(1), false).unwrap();
    assert!(!network.node(NodeId(1)).unwrap().is_active);
    assert_eq!(network.set_node_active(NodeId(8), false), Err(NodeError::NotFound(NodeId(8))));
}
