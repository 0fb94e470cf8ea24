//! # switchnet
//!
//! A tick-based simulation of a message-switched network.
//!
//! ## Overview
//!
//! Nodes joined by priced, unreliable channels exchange data messages and
//! routing tables. Every tick each message moves at most one step: from a
//! queue onto a channel, or across a channel into the next queue.
//!
//! - **Distance-vector routing**: tables are recomputed in rounds and spread
//!   from the central machine as matrix update messages
//! - **Channel occupancy**: half-duplex channels carry one message, duplex
//!   channels one per direction
//! - **Retries**: a failed crossing returns the message to the head of its
//!   queue with one more attempt recorded
//! - **Virtual circuits**: a sending request reserves the path before the
//!   packets follow
//!
//! ## Architecture
//!
//! - **Creators** (`creators.rs`): turn a transmission into queued messages
//! - **Exchanger** (`exchanger.rs`): the per-tick queue and channel passes
//! - **Handler** (`handler.rs`): what happens when a message arrives
//! - **Registrator** (`registrator.rs`) and **Statistics** (`statistics.rs`)
//! - **Generator** (`generator.rs`): random traffic
//! - **Builder** (`builder.rs`): random wide-area topologies
//! - **Simulation** (`simulation.rs`): the driver tying the above together
//! - **Scenarios** (`scenarios.rs`): canned runs
//!
//! ## Example
//!
//! ```rust,ignore
//! use switchnet_simulation::*;
//!
//! let network = scenarios::square_network()?;
//! let mut sim = Simulation::new(network, SimConfig {
//!     message_generate_chance: 0.0,
//!     ..Default::default()
//! })?;
//!
//! // First tick computes routing tables
//! sim.step();
//!
//! sim.send_message(NodeId(0), NodeId(3), 100)?;
//! sim.run_ticks(6);
//!
//! assert_eq!(sim.statistics().general.received, 1);
//! ```

pub mod builder;
pub mod creators;
pub mod error;
pub mod exchanger;
pub mod generator;
pub mod handler;
pub mod persistence;
pub mod registrator;
pub mod scenarios;
pub mod simulation;
pub mod statistics;

// Re-export main types
pub use builder::{
    IdAllocator,
    MetropolitanConfig,
    MetropolitanNetworkBuilder,
    WideAreaConfig,
    WideAreaNetworkBuilder,
};

pub use creators::{
    Creators,
    MessageCreator,
    MessageInitializer,
    ResponseCreator,
    RouteSource,
    TableUpdater,
    TransferMode,
};

pub use error::{BuildError, SimulationError, SimulationResult};
pub use exchanger::{ExchangeContext, ExchangeReport, handle_messages_once, try_move_message_to_channel};
pub use generator::TrafficConfig;
pub use registrator::MessageRegistrator;
pub use statistics::{KindStatistics, MessagesStatisticCounter, MessagesStatistics};

pub use simulation::{
    Simulation,
    SimConfig,
    SimStats,
};

// Re-export core types for convenience
pub use switchnet_core::{ChannelId, GroupId, MessageId, Network, NodeId};
