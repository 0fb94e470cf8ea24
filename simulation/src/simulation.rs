//! Simulation driver for switchnet
//!
//! Each tick runs, in order:
//! - A routing table round, every `update_tables_period` ticks
//! - Random traffic generation
//! - One pass of message exchange
//! - Group registration for statistics

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use switchnet_core::{MessageId, Network, NodeId};
use switchnet_routing::MessageRouter;
use tracing::{debug, info, trace_span};
use uuid::Uuid;

use crate::creators::{Creators, MessageInitializer, TableUpdater, TransferMode};
use crate::error::{SimulationError, SimulationResult};
use crate::exchanger::{ExchangeContext, ExchangeReport, handle_messages_once};
use crate::generator::{TrafficConfig, generate};
use crate::registrator::MessageRegistrator;
use crate::statistics::{MessagesStatisticCounter, MessagesStatistics};

/// Configuration for the simulation
#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    /// Seed for every random draw of the run
    pub seed: u64,
    /// Ticks between routing table rounds
    pub update_tables_period: u64,
    /// Chance an active node starts a transmission each tick
    pub message_generate_chance: f64,
    pub min_message_size: u32,
    pub max_message_size: u32,
    /// Largest data size a single packet carries
    pub packet_size: u32,
    /// Header size added to every message
    pub service_size: u32,
    pub transfer_mode: TransferMode,
    /// Ticks `run` executes
    pub max_ticks: u64,
    /// Log the exchange report of every tick
    pub trace_exchange: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            update_tables_period: 50,
            message_generate_chance: 0.05,
            min_message_size: 64,
            max_message_size: 4096,
            packet_size: 1024,
            service_size: 32,
            transfer_mode: TransferMode::Datagram,
            max_ticks: 500,
            trace_exchange: false,
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> SimulationResult<()> {
        if self.update_tables_period == 0 {
            return Err(SimulationError::InvalidConfig(
                "update_tables_period must be at least 1".to_string(),
            ));
        }
        if self.packet_size == 0 {
            return Err(SimulationError::InvalidConfig("packet_size must be at least 1".to_string()));
        }
        self.traffic().validate()?;
        Ok(())
    }

    /// The traffic generator's share of the configuration
    pub fn traffic(&self) -> TrafficConfig {
        TrafficConfig {
            message_generate_chance: self.message_generate_chance,
            min_message_size: self.min_message_size,
            max_message_size: self.max_message_size,
            transfer_mode: self.transfer_mode,
        }
    }
}

/// Running totals of a simulation
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SimStats {
    pub table_rounds: u64,
    pub table_updates_sent: u64,
    /// Transmissions started by the traffic generator
    pub generated: u64,
    /// Transmissions started through `send_message`
    pub manual: u64,
    /// Transmissions that had no route when started
    pub unroutable: u64,
    pub exchange: ExchangeReport,
}

/// The simulation state
#[derive(Debug)]
pub struct Simulation {
    /// The simulated network
    pub network: Network,
    /// Current simulation tick
    pub tick: u64,
    config: SimConfig,
    /// Statistics
    pub stats: SimStats,
    rng: ChaCha8Rng,
    router: MessageRouter,
    creators: Creators,
    table_updater: TableUpdater,
    registrator: MessageRegistrator,
    run_id: Uuid,
}

impl Simulation {
    /// Create a simulation over `network`
    pub fn new(network: Network, config: SimConfig) -> SimulationResult<Self> {
        config.validate()?;
        let run_id = Uuid::new_v4();
        info!(
            run = %run_id,
            seed = config.seed,
            nodes = network.node_count(),
            channels = network.channel_count(),
            mode = %config.transfer_mode,
            "Simulation created"
        );
        Ok(Self {
            network,
            tick: 0,
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            router: MessageRouter::default(),
            creators: Creators::new(config.packet_size, config.service_size),
            table_updater: TableUpdater::new(config.service_size),
            registrator: MessageRegistrator::new(),
            run_id,
            stats: SimStats::default(),
            config,
        })
    }

    /// Configuration, fixed once validated
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Run a single simulation tick
    pub fn step(&mut self) {
        let _span = trace_span!("tick", tick = self.tick).entered();

        if self.tick % self.config.update_tables_period == 0 {
            self.update_tables();
        }

        let traffic = self.config.traffic();
        let started = generate(&mut self.network, &self.router, &self.creators, &traffic, &mut self.rng);
        self.stats.generated += started as u64;

        let ctx = ExchangeContext::new(&self.router, &self.creators, self.run_id);
        let report = handle_messages_once(&mut self.network, &mut self.rng, &ctx);
        self.stats.exchange += report;
        if self.config.trace_exchange {
            debug!(tick = self.tick, ?report, "Exchange pass");
        }

        self.registrator.register_messages(&self.network);
        self.tick += 1;
    }

    /// Run until `max_ticks`
    pub fn run(&mut self) {
        while self.tick < self.config.max_ticks {
            self.step();
        }

        info!(tick = self.tick, "Simulation complete");
        info!(stats = ?self.stats, "Run totals");
    }

    /// Run for a specific number of ticks
    pub fn run_ticks(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.step();
        }
    }

    /// Start a routing table round now
    pub fn update_tables(&mut self) -> Vec<MessageId> {
        let sent = self.table_updater.update_tables(&mut self.network, &self.router);
        self.stats.table_rounds += 1;
        self.stats.table_updates_sent += sent.len() as u64;
        sent
    }

    /// Start a transmission of `data_size` from `from` to `to`
    ///
    /// Returns the created messages, or `None` when `from` has no route to
    /// `to` in its current table.
    pub fn send_message(&mut self, from: NodeId, to: NodeId, data_size: u32) -> SimulationResult<Option<Vec<MessageId>>> {
        let initializer = MessageInitializer::new(from, to, data_size);
        let creator = self.creators.for_mode(self.config.transfer_mode);
        let created = creator.create_messages(&mut self.network, &self.router, &initializer)?;
        match &created {
            Some(_) => self.stats.manual += 1,
            None => self.stats.unroutable += 1,
        }
        Ok(created)
    }

    /// Take a node in or out of routing; effective from the next table round
    pub fn set_node_active(&mut self, node: NodeId, active: bool) -> SimulationResult<()> {
        self.network.set_node_active(node, active)?;
        Ok(())
    }

    /// Statistics over every group finished so far
    pub fn statistics(&self) -> MessagesStatistics {
        MessagesStatisticCounter::count(&self.network, &self.registrator)
    }

    pub fn registrator(&self) -> &MessageRegistrator {
        &self.registrator
    }

    pub fn router(&self) -> &MessageRouter {
        &self.router
    }

    /// Number of the last routing table round
    pub fn table_round(&self) -> u64 {
        self.table_updater.round()
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Get a summary of the current state
    pub fn state_summary(&self) -> String {
        let active = self.network.nodes().filter(|n| n.is_active).count();
        format!(
            "Tick {}: {}/{} nodes active, {} queued, {} in flight, {} groups finished",
            self.tick,
            active,
            self.network.node_count(),
            self.network.pending_message_count(),
            self.network.in_flight_count(),
            self.registrator.end_times().len()
        )
    }
}
