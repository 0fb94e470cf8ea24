//! Pre-defined simulation scenarios for switchnet
//!
//! Each scenario prints its progress and returns the finished simulation so
//! callers and tests can inspect the final state.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use switchnet_core::{Channel, ChannelId, Network, Node, NodeId};
use tracing::info;

use crate::builder::{WideAreaConfig, WideAreaNetworkBuilder};
use crate::creators::TransferMode;
use crate::error::SimulationResult;
use crate::simulation::{SimConfig, Simulation};

/// The four-node square used by several scenarios
///
/// ```text
///        10
///    0 ------ 1
///    |        |
///  20|        |100
///    |        |
///    2 ------ 3
///        1
/// ```
pub fn square_network() -> SimulationResult<Network> {
    let mut network = Network::new();
    for i in 0..4 {
        network.add_node(Node::simple(NodeId(i)))?;
    }
    for (id, a, b, price) in [(0, 0, 1, 10.0), (1, 0, 2, 20.0), (2, 1, 3, 100.0), (3, 2, 3, 1.0)] {
        network.add_channel(Channel::new(ChannelId(id), NodeId(a), NodeId(b), price, 0.0))?;
    }
    Ok(network)
}

/// A chain `0 - 1 - ... - (n-1)` of reliable duplex channels with price 1
pub fn line_network(nodes: u32) -> SimulationResult<Network> {
    let mut network = Network::new();
    for i in 0..nodes {
        network.add_node(Node::simple(NodeId(i)))?;
    }
    for i in 1..nodes {
        network.add_channel(Channel::new(ChannelId(i - 1), NodeId(i - 1), NodeId(i), 1.0, 0.0))?;
    }
    Ok(network)
}

fn manual_config() -> SimConfig {
    SimConfig {
        message_generate_chance: 0.0,
        trace_exchange: true,
        ..Default::default()
    }
}

fn print_route(sim: &Simulation, from: NodeId, to: NodeId) {
    match sim.router().get_route(&sim.network, from, to) {
        Some(route) => {
            let hops: Vec<String> = route.iter().map(|c| c.to_string()).collect();
            println!("  Route {} -> {}: [{}]", from, to, hops.join(", "));
        }
        None => println!("  Route {} -> {}: unreachable", from, to),
    }
}

/// Route selection on the square: the cheap detour through 2 wins
pub fn run_square_scenario() -> SimulationResult<Simulation> {
    info!("=== Running Square Scenario ===");

    let mut sim = Simulation::new(square_network()?, manual_config())?;

    println!("\n--- Step 1: First table round ---");
    sim.step();
    println!("  {}", sim.state_summary());
    print_route(&sim, NodeId(0), NodeId(3));

    println!("\n--- Step 2: Node 0 sends 100 bytes to node 3 ---");
    sim.send_message(NodeId(0), NodeId(3), 100)?;
    for _ in 0..6 {
        sim.step();
        println!("  {}", sim.state_summary());
    }

    println!("\n--- Result ---");
    println!("{}", sim.statistics());
    Ok(sim)
}

/// A message bounces on a broken channel until the channel is repaired
pub fn run_unreliable_channel_scenario() -> SimulationResult<Simulation> {
    info!("=== Running Unreliable Channel Scenario ===");

    let mut sim = Simulation::new(line_network(2)?, manual_config())?;
    sim.step();

    println!("\n--- Step 1: Channel c0 fails every crossing ---");
    if let Some(channel) = sim.network.channel_mut(ChannelId(0)) {
        channel.error_chance = 1.0;
    }
    let ids = sim.send_message(NodeId(0), NodeId(1), 50)?.unwrap_or_default();
    sim.run_ticks(6);
    for id in &ids {
        if let Some(message) = sim.network.message(*id) {
            println!("  {} failed {} times, still at {}", id, message.send_attempts, message.last_transfer_node_id);
        }
    }

    println!("\n--- Step 2: Channel repaired ---");
    if let Some(channel) = sim.network.channel_mut(ChannelId(0)) {
        channel.error_chance = 0.0;
    }
    sim.run_ticks(4);
    println!("  {}", sim.state_summary());

    println!("\n--- Result ---");
    println!("{}", sim.statistics());
    Ok(sim)
}

/// A reservation request clears the path before the packets follow
pub fn run_virtual_circuit_scenario() -> SimulationResult<Simulation> {
    info!("=== Running Virtual Circuit Scenario ===");

    let config = SimConfig {
        transfer_mode: TransferMode::VirtualCircuit,
        packet_size: 1024,
        ..manual_config()
    };
    let mut sim = Simulation::new(line_network(4)?, config)?;
    sim.step();

    println!("\n--- Node 0 reserves a circuit to node 3 for 3000 bytes ---");
    sim.send_message(NodeId(0), NodeId(3), 3000)?;

    let mut ticks = 0;
    while sim.network.pending_message_count() + sim.network.in_flight_count() > 0 && ticks < 100 {
        sim.step();
        ticks += 1;
    }
    println!("  Settled after {} ticks", ticks);
    println!("  {}", sim.state_summary());
    println!("  Responses: {}, retries: {}", sim.stats.exchange.responses, sim.stats.exchange.retries);

    println!("\n--- Result ---");
    println!("{}", sim.statistics());
    Ok(sim)
}

/// A random wide-area network with generated traffic
pub fn run_wide_area_scenario(ticks: u64, seed: u64) -> SimulationResult<Simulation> {
    info!("=== Running Wide-Area Scenario ===");

    let builder = WideAreaNetworkBuilder::new(WideAreaConfig::default())?;
    let network = builder.build(&mut ChaCha8Rng::seed_from_u64(seed))?;
    println!(
        "  Built {} nodes and {} channels",
        network.node_count(),
        network.channel_count()
    );

    let mut sim = Simulation::new(
        network,
        SimConfig {
            seed,
            max_ticks: ticks,
            update_tables_period: 25,
            ..Default::default()
        },
    )?;

    let checkpoint = (ticks / 5).max(1);
    while sim.tick < ticks {
        sim.step();
        if sim.tick % checkpoint == 0 {
            println!("  {}", sim.state_summary());
        }
    }

    println!("\n--- Result ---");
    println!("  Table rounds: {}", sim.stats.table_rounds);
    println!("  Transmissions started: {}", sim.stats.generated);
    println!("{}", sim.statistics());
    Ok(sim)
}

/// Tables spread outward from the central machine one hop per crossing
pub fn run_table_propagation_scenario(seed: u64) -> SimulationResult<Simulation> {
    info!("=== Running Table Propagation Scenario ===");

    let config = WideAreaConfig {
        metropolitan_count: 2,
        ..Default::default()
    };
    let network = WideAreaNetworkBuilder::new(config)?.build(&mut ChaCha8Rng::seed_from_u64(seed))?;
    let mut sim = Simulation::new(
        network,
        SimConfig {
            seed,
            update_tables_period: 1000,
            ..manual_config()
        },
    )?;

    let total = sim.network.node_count();
    let mut ticks = 0;
    loop {
        sim.step();
        ticks += 1;
        let updated = sim.network.nodes().filter(|n| n.table_round == Some(1)).count();
        println!("  Tick {}: {}/{} nodes hold round 1", sim.tick, updated, total);
        if updated == total || ticks >= 200 {
            break;
        }
    }

    Ok(sim)
}
