//! End-to-end tests for the tick-based exchange
//!
//! These drive whole ticks through `handle_messages_once` or the
//! `Simulation` driver and check channel occupancy, retries, ordering and
//! the request/response flow.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use switchnet_core::{Channel, ChannelId, ConnectionType, Message, MessageKind, Network, Node, NodeId, NodeType};
use switchnet_routing::MessageRouter;
use switchnet_simulation::scenarios::{line_network, square_network};
use switchnet_simulation::{
    Creators, ExchangeContext, MessageId, SimConfig, Simulation, TableUpdater, TransferMode, handle_messages_once,
};
use uuid::Uuid;

// Test helpers
fn pair(connection_type: ConnectionType, error_chance: f64) -> Network {
    let mut network = Network::new();
    network.add_node(Node::simple(NodeId(0))).unwrap();
    network.add_node(Node::simple(NodeId(1))).unwrap();
    network
        .add_channel(Channel::new(ChannelId(0), NodeId(0), NodeId(1), 2.0, error_chance).with_connection_type(connection_type))
        .unwrap();
    network
}

fn queue(network: &mut Network, from: NodeId, to: NodeId, route: Vec<ChannelId>) -> MessageId {
    let id = network.messages_mut().next_message_id();
    let group = network.messages_mut().next_group_id();
    let first = route[0];
    network
        .insert_message(Message::new(id, group, MessageKind::General, from, to, route, 16, 4))
        .unwrap();
    network.enqueue(from, first, id);
    id
}

struct Harness {
    router: MessageRouter,
    creators: Creators,
    rng: ChaCha8Rng,
    run_id: Uuid,
}

impl Harness {
    fn new() -> Self {
        Self {
            router: MessageRouter::default(),
            creators: Creators::new(1024, 4),
            rng: ChaCha8Rng::seed_from_u64(7),
            run_id: Uuid::new_v4(),
        }
    }

    fn tick(&mut self, network: &mut Network) -> switchnet_simulation::ExchangeReport {
        let ctx = ExchangeContext::new(&self.router, &self.creators, self.run_id);
        handle_messages_once(network, &mut self.rng, &ctx)
    }
}

fn quiet(mode: TransferMode) -> SimConfig {
    SimConfig {
        message_generate_chance: 0.0,
        transfer_mode: mode,
        ..Default::default()
    }
}

#[test]
fn test_reliable_channel_crosses_in_two_ticks() {
    let mut network = pair(ConnectionType::Duplex, 0.0);
    let mut harness = Harness::new();
    let id = queue(&mut network, NodeId(0), NodeId(1), vec![ChannelId(0)]);

    harness.tick(&mut network);
    assert_eq!(network.queue_len(NodeId(0), ChannelId(0)), 0);
    assert_eq!(network.channel(ChannelId(0)).unwrap().first_message, Some(id));

    harness.tick(&mut network);
    let channel = network.channel(ChannelId(0)).unwrap();
    assert_eq!(channel.first_message, None);
    assert_eq!(channel.second_message, None);
    assert_eq!(network.queue(NodeId(1), ChannelId(0)).unwrap().front(), Some(id));
    assert_eq!(network.message(id).unwrap().send_attempts, 0);
}

#[test]
fn test_broken_channel_always_bounces() {
    let mut network = pair(ConnectionType::Duplex, 1.0);
    let mut harness = Harness::new();
    let id = queue(&mut network, NodeId(0), NodeId(1), vec![ChannelId(0)]);

    for resolution in 1..=5 {
        harness.tick(&mut network);
        assert!(network.channel(ChannelId(0)).unwrap().first_message.is_some());

        let report = harness.tick(&mut network);
        assert_eq!(report.bounced, 1);
        assert_eq!(network.in_flight_count(), 0);
        assert_eq!(network.queue(NodeId(0), ChannelId(0)).unwrap().front(), Some(id));
        assert_eq!(network.message(id).unwrap().send_attempts, resolution);
    }
    assert_eq!(network.queue_len(NodeId(1), ChannelId(0)), 0);
}

#[test]
fn test_half_duplex_carries_one_direction_at_a_time() {
    let mut network = pair(ConnectionType::HalfDuplex, 0.0);
    let mut harness = Harness::new();
    let a = queue(&mut network, NodeId(0), NodeId(1), vec![ChannelId(0)]);
    let b = queue(&mut network, NodeId(1), NodeId(0), vec![ChannelId(0)]);

    let report = harness.tick(&mut network);
    assert_eq!(report.moved, 1);
    assert_eq!(network.in_flight_count(), 1);
    assert_eq!(network.channel(ChannelId(0)).unwrap().first_message, Some(a));
    assert_eq!(network.queue(NodeId(1), ChannelId(0)).unwrap().front(), Some(b));

    // Resolution frees the slot; the waiting message takes it next tick
    harness.tick(&mut network);
    harness.tick(&mut network);
    assert_eq!(network.channel(ChannelId(0)).unwrap().first_message, Some(b));
}

#[test]
fn test_duplex_never_holds_two_from_one_side() {
    let mut network = pair(ConnectionType::Duplex, 0.0);
    let mut harness = Harness::new();
    queue(&mut network, NodeId(0), NodeId(1), vec![ChannelId(0)]);
    let second = queue(&mut network, NodeId(0), NodeId(1), vec![ChannelId(0)]);
    queue(&mut network, NodeId(1), NodeId(0), vec![ChannelId(0)]);

    let report = harness.tick(&mut network);
    assert_eq!(report.moved, 2);
    assert_eq!(network.in_flight_count(), 2);
    assert_eq!(network.queue(NodeId(0), ChannelId(0)).unwrap().front(), Some(second));
}

#[test]
fn test_each_message_steps_once_per_tick() {
    let mut network = line_network(3).unwrap();
    let mut harness = Harness::new();
    let id = queue(&mut network, NodeId(0), NodeId(2), vec![ChannelId(0), ChannelId(1)]);

    // Enter, cross, forward, enter, cross, deliver
    for _ in 0..5 {
        harness.tick(&mut network);
        assert!(!network.message(id).unwrap().is_received());
    }
    let report = harness.tick(&mut network);
    assert_eq!(report.delivered, 1);
    assert!(network.message(id).unwrap().is_received());
    assert_eq!(network.message(id).unwrap().traversed, vec![ChannelId(0), ChannelId(1)]);
}

#[test]
fn test_tables_spread_along_a_line() {
    let mut network = Network::new();
    network.add_node(Node::new(NodeId(0), NodeType::CentralMachine)).unwrap();
    for i in 1..4 {
        network.add_node(Node::simple(NodeId(i))).unwrap();
    }
    for i in 1..4 {
        network
            .add_channel(Channel::new(ChannelId(i - 1), NodeId(i - 1), NodeId(i), 1.0, 0.0))
            .unwrap();
    }
    let mut harness = Harness::new();
    let mut updater = TableUpdater::new(4);

    let seeded = updater.update_tables(&mut network, &harness.router);
    assert_eq!(seeded.len(), 1);
    assert_eq!(network.node(NodeId(0)).unwrap().table_round, Some(1));
    assert_eq!(network.node(NodeId(3)).unwrap().table_round, None);

    for _ in 0..20 {
        harness.tick(&mut network);
    }

    assert!(network.nodes().all(|n| n.table_round == Some(1) && n.is_table_updated));
    let updates: Vec<&Message> = network
        .messages()
        .iter()
        .filter(|m| m.kind == MessageKind::MatrixUpdate)
        .collect();
    assert_eq!(updates.len(), 3);
    assert!(updates.iter().all(|m| m.is_received()));
    assert_eq!(
        harness.router.get_route(&network, NodeId(3), NodeId(0)),
        Some(vec![ChannelId(2), ChannelId(1), ChannelId(0)])
    );
}

#[test]
fn test_square_route_prefers_cheap_detour() {
    let mut sim = Simulation::new(square_network().unwrap(), quiet(TransferMode::Datagram)).unwrap();
    sim.step();

    assert_eq!(
        sim.router().get_route(&sim.network, NodeId(0), NodeId(3)),
        Some(vec![ChannelId(1), ChannelId(3)])
    );
}

#[test]
fn test_large_transmission_is_split_into_packets() {
    let config = SimConfig {
        packet_size: 1024,
        ..quiet(TransferMode::Datagram)
    };
    let mut sim = Simulation::new(line_network(3).unwrap(), config).unwrap();
    sim.step();

    let ids = sim.send_message(NodeId(0), NodeId(2), 2500).unwrap().unwrap();
    let packets: Vec<&Message> = ids.iter().map(|id| sim.network.message(*id).unwrap()).collect();
    assert_eq!(packets.iter().map(|m| m.data_size).collect::<Vec<_>>(), vec![1024, 1024, 452]);
    assert_eq!(
        packets.iter().map(|m| m.number_in_package).collect::<Vec<_>>(),
        vec![Some(0), Some(1), Some(2)]
    );
    assert!(packets.iter().all(|m| m.parent_id == packets[0].parent_id));

    sim.run_ticks(20);
    let stats = sim.statistics();
    assert_eq!(stats.general.groups, 1);
    assert_eq!(stats.general.received, 3);
}

#[test]
fn test_registrator_records_group_once() {
    let mut sim = Simulation::new(line_network(2).unwrap(), quiet(TransferMode::Datagram)).unwrap();
    sim.step();
    let ids = sim.send_message(NodeId(0), NodeId(1), 10).unwrap().unwrap();
    let group = sim.network.message(ids[0]).unwrap().parent_id;

    sim.run_ticks(3);
    let start = sim.registrator().start_time(group);
    let end = sim.registrator().end_time(group);
    assert_eq!(start, Some(1));
    assert_eq!(end, Some(3));

    sim.run_ticks(10);
    assert_eq!(sim.registrator().start_time(group), start);
    assert_eq!(sim.registrator().end_time(group), end);
}

#[test]
fn test_refused_request_is_resent_as_one_message() {
    let config = SimConfig {
        packet_size: 1024,
        ..quiet(TransferMode::VirtualCircuit)
    };
    let mut sim = Simulation::new(line_network(4).unwrap(), config).unwrap();
    sim.step();
    sim.set_node_active(NodeId(3), false).unwrap();

    let ids = sim.send_message(NodeId(0), NodeId(3), 3000).unwrap().unwrap();
    let request = sim.network.message(ids[0]).unwrap();
    assert_eq!(request.kind, MessageKind::SendingRequest);
    let group = request.parent_id;

    sim.run_ticks(40);

    assert_eq!(sim.stats.exchange.responses, 1);
    assert_eq!(sim.stats.exchange.retries, 1);
    let kinds: Vec<MessageKind> = sim.network.messages().group(group).map(|m| m.kind).collect();
    assert!(kinds.contains(&MessageKind::NegativeSendingResponse));
    let resent: Vec<&Message> = sim
        .network
        .messages()
        .group(group)
        .filter(|m| m.kind == MessageKind::General)
        .collect();
    assert_eq!(resent.len(), 1);
    assert_eq!(resent[0].data_size, 3000);
    assert!(resent[0].is_received());
    assert!(sim.network.channels().all(|c| !c.is_busy));
}

#[test]
fn test_accepted_request_delivers_every_packet() {
    let config = SimConfig {
        packet_size: 1024,
        ..quiet(TransferMode::VirtualCircuit)
    };
    let mut sim = Simulation::new(line_network(3).unwrap(), config).unwrap();
    sim.step();

    let ids = sim.send_message(NodeId(0), NodeId(2), 2048).unwrap().unwrap();
    let group = sim.network.message(ids[0]).unwrap().parent_id;
    sim.run_ticks(40);

    assert!(sim.registrator().is_finished(group));
    let packets: Vec<&Message> = sim
        .network
        .messages()
        .group(group)
        .filter(|m| m.kind == MessageKind::General)
        .collect();
    assert_eq!(packets.len(), 2);
    assert!(packets.iter().all(|m| m.is_received()));
    assert!(sim.network.channels().all(|c| !c.is_busy));
}

#[test]
fn test_table_update_wakes_inactive_neighbour() {
    let mut network = Network::new();
    network.add_node(Node::new(NodeId(0), NodeType::CentralMachine)).unwrap();
    network.add_node(Node::simple(NodeId(1))).unwrap();
    network.add_node(Node::simple(NodeId(2))).unwrap();
    network
        .add_channel(Channel::new(ChannelId(0), NodeId(0), NodeId(1), 1.0, 0.0))
        .unwrap();
    network
        .add_channel(Channel::new(ChannelId(1), NodeId(1), NodeId(2), 1.0, 0.0))
        .unwrap();
    network.set_node_active(NodeId(2), false).unwrap();
    let mut harness = Harness::new();
    let mut updater = TableUpdater::new(4);

    updater.update_tables(&mut network, &harness.router);
    for _ in 0..20 {
        harness.tick(&mut network);
    }

    let woken = network.node(NodeId(2)).unwrap();
    assert!(woken.is_active);
    assert!(woken.is_table_updated);
    assert_eq!(woken.table_round, Some(1));
    let addressed: Vec<&Message> = network
        .messages()
        .iter()
        .filter(|m| m.kind == MessageKind::MatrixUpdate && m.receiver_id == NodeId(2))
        .collect();
    assert_eq!(addressed.len(), 1);
    assert!(addressed[0].is_received());
}

#[test]
fn test_request_cut_off_from_sender_counts_as_canceled() {
    let config = SimConfig {
        packet_size: 1024,
        ..quiet(TransferMode::VirtualCircuit)
    };
    let mut sim = Simulation::new(line_network(3).unwrap(), config).unwrap();
    sim.step();

    let request = sim.send_message(NodeId(0), NodeId(2), 2048).unwrap().unwrap()[0];
    let group = sim.network.message(request).unwrap().parent_id;
    for _ in 0..10 {
        if sim.network.message(request).unwrap().last_transfer_node_id == NodeId(1) {
            break;
        }
        sim.step();
    }
    assert_eq!(sim.network.message(request).unwrap().last_transfer_node_id, NodeId(1));
    sim.network.remove_channel(NodeId(0), NodeId(1));
    sim.run_ticks(20);

    assert!(sim.registrator().is_finished(group));
    assert_eq!(sim.stats.exchange.responses, 0);
    let packets: Vec<&Message> = sim
        .network
        .messages()
        .group(group)
        .filter(|m| m.kind == MessageKind::General)
        .collect();
    assert_eq!(packets.len(), 2);
    assert!(packets.iter().all(|m| m.is_canceled));
    assert_eq!(sim.network.node(NodeId(2)).unwrap().canceled_messages.len(), 2);

    let stats = sim.statistics();
    assert_eq!(stats.general.received, 0);
    assert_eq!(stats.general.canceled, 2);
    assert_eq!(stats.general.total_data_size, 2048);
    assert!(sim.network.channels().all(|c| !c.is_busy));
}
