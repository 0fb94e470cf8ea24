//! switchnet - message-switched network simulator
//!
//! Builds or loads a network, runs the tick-based exchange on it and prints
//! delivery statistics.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use switchnet_logging::{LogConfig, RotationStrategy, SubscriberBuilder};

use switchnet_simulation::builder::{MetropolitanConfig, WideAreaConfig, WideAreaNetworkBuilder};
use switchnet_simulation::creators::TransferMode;
use switchnet_simulation::persistence::{load_network, save_network};
use switchnet_simulation::scenarios;
use switchnet_simulation::simulation::{SimConfig, Simulation};

#[derive(Parser)]
#[command(
    name = "switchnet",
    about = "Message-switched network simulation with distance-vector routing",
    version
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Seed for network generation and the simulation
    #[arg(short, long, global = true, default_value = "42")]
    seed: u64,

    /// Write a JSONL trace into this directory instead of logging to the console
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Split the trace into daily or hourly files (daily, hourly, never)
    #[arg(long, global = true, default_value = "never")]
    log_rotation: RotationStrategy,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ScenarioName {
    /// Route selection on a four-node square
    Square,
    /// Retries on a channel that fails every crossing
    Unreliable,
    /// Request and response before the packets
    VirtualCircuit,
    /// Random wide-area network with generated traffic
    WideArea,
    /// Spread of routing tables from the central machine
    Tables,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation on a generated or loaded network
    Run {
        /// Load the network from a JSON snapshot instead of generating one
        #[arg(short, long)]
        network: Option<PathBuf>,

        /// Number of ticks to run
        #[arg(short, long, default_value = "500")]
        ticks: u64,

        /// How user traffic is transferred
        #[arg(short, long, value_enum, default_value_t = TransferMode::Datagram)]
        mode: TransferMode,

        /// Chance an active node starts a transmission each tick
        #[arg(short, long, default_value = "0.05")]
        generate_chance: f64,

        /// Ticks between routing table rounds
        #[arg(short, long, default_value = "50")]
        period: u64,

        #[command(flatten)]
        shape: ShapeArgs,

        /// Print the statistics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a canned scenario
    Scenario {
        #[arg(value_enum)]
        name: ScenarioName,

        /// Number of ticks for scenarios that run freely
        #[arg(short, long, default_value = "200")]
        ticks: u64,
    },

    /// Generate a wide-area network and print or save it as JSON
    Build {
        #[command(flatten)]
        shape: ShapeArgs,

        /// File to write; printed to stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
struct ShapeArgs {
    /// Number of metropolitan networks
    #[arg(long, default_value = "3")]
    metropolitan: u32,

    /// Nodes per metropolitan network
    #[arg(long, default_value = "8")]
    nodes: u32,

    /// Target mean channels per node inside a metropolitan network
    #[arg(long, default_value = "2.5")]
    degree: f64,
}

impl ShapeArgs {
    fn config(&self) -> WideAreaConfig {
        WideAreaConfig {
            metropolitan_count: self.metropolitan,
            metropolitan: MetropolitanConfig {
                nodes_count: self.nodes,
                average_degree: self.degree,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn build(&self, seed: u64) -> anyhow::Result<switchnet_core::Network> {
        let builder = WideAreaNetworkBuilder::new(self.config())?;
        Ok(builder.build(&mut ChaCha8Rng::seed_from_u64(seed))?)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = LogConfig::for_run(cli.verbose, cli.log_dir.clone()).with_rotation(cli.log_rotation);
    let _guard = SubscriberBuilder::new()
        .with_config(config)
        .init()
        .context("installing log subscriber")?;

    match cli.command {
        Commands::Run {
            network,
            ticks,
            mode,
            generate_chance,
            period,
            shape,
            json,
        } => {
            let network = match network {
                Some(path) => load_network(&path).with_context(|| format!("loading {}", path.display()))?,
                None => shape.build(cli.seed)?,
            };
            let mut sim = Simulation::new(
                network,
                SimConfig {
                    seed: cli.seed,
                    max_ticks: ticks,
                    transfer_mode: mode,
                    message_generate_chance: generate_chance,
                    update_tables_period: period,
                    trace_exchange: cli.verbose,
                    ..Default::default()
                },
            )?;
            sim.run();

            let stats = sim.statistics();
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("{}", sim.state_summary());
                println!("{}", stats);
            }
        }
        Commands::Scenario { name, ticks } => {
            match name {
                ScenarioName::Square => scenarios::run_square_scenario()?,
                ScenarioName::Unreliable => scenarios::run_unreliable_channel_scenario()?,
                ScenarioName::VirtualCircuit => scenarios::run_virtual_circuit_scenario()?,
                ScenarioName::WideArea => scenarios::run_wide_area_scenario(ticks, cli.seed)?,
                ScenarioName::Tables => scenarios::run_table_propagation_scenario(cli.seed)?,
            };
        }
        Commands::Build { shape, output } => {
            let network = shape.build(cli.seed)?;
            match output {
                Some(path) => {
                    save_network(&network, &path).with_context(|| format!("writing {}", path.display()))?;
                    println!(
                        "Wrote {} nodes and {} channels to {}",
                        network.node_count(),
                        network.channel_count(),
                        path.display()
                    );
                }
                None => println!("{}", serde_json::to_string_pretty(&network.to_snapshot())?),
            }
        }
    }

    Ok(())
}
