//! Random network topologies
//!
//! A wide-area network is a central machine with several metropolitan
//! networks hanging off it:
//!
//! ```text
//!            [central]
//!          /     |     \        satellite channels
//!      [main]--[main]--[main]   ground ring between main machines
//!       /  \     |      / \
//!      o -- o    o     o   o    metropolitan nodes
//! ```
//!
//! Node and channel ids are allocated contiguously in build order, and the
//! same seed always yields the same network.

use rand::Rng;
use rand::seq::IndexedRandom;
use switchnet_core::{
    Channel, ChannelId, ChannelType, ConnectionType, Network, NetworkError, Node, NodeId, NodeType,
};
use tracing::{debug, info};

use crate::error::BuildError;

/// Prices channels are drawn from unless configured otherwise
pub const DEFAULT_PRICES: [f64; 12] = [2.0, 4.0, 7.0, 8.0, 11.0, 15.0, 17.0, 20.0, 21.0, 24.0, 25.0, 28.0];

/// Smallest metropolitan network: a main machine and one simple node
pub const MIN_METROPOLITAN_NODES: u32 = 2;

/// Hands out node and channel ids in order
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    next_node: u32,
    next_channel: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&mut self) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        id
    }

    pub fn channel(&mut self) -> ChannelId {
        let id = ChannelId(self.next_channel);
        self.next_channel += 1;
        id
    }
}

fn check_probability(name: &'static str, value: f64) -> Result<(), BuildError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(BuildError::InvalidProbability { name, value })
    }
}

fn check_price(price: f64) -> Result<(), BuildError> {
    if price.is_finite() && price > 0.0 {
        Ok(())
    } else {
        Err(BuildError::InvalidPrice(price))
    }
}

/// Shape of one metropolitan network
#[derive(Debug, Clone, PartialEq)]
pub struct MetropolitanConfig {
    /// Nodes including the main machine
    pub nodes_count: u32,
    /// Target mean number of channels per node
    pub average_degree: f64,
    pub prices: Vec<f64>,
    /// Error chances are drawn uniformly from `[0, max_error_chance]`
    pub max_error_chance: f64,
    pub half_duplex_probability: f64,
}

impl Default for MetropolitanConfig {
    fn default() -> Self {
        Self {
            nodes_count: 8,
            average_degree: 2.5,
            prices: DEFAULT_PRICES.to_vec(),
            max_error_chance: 0.1,
            half_duplex_probability: 0.3,
        }
    }
}

impl MetropolitanConfig {
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.nodes_count < MIN_METROPOLITAN_NODES {
            return Err(BuildError::TooFewNodes {
                min: MIN_METROPOLITAN_NODES,
                actual: self.nodes_count,
            });
        }
        if self.average_degree.is_nan() || self.average_degree < 1.0 {
            return Err(BuildError::InvalidDegree(self.average_degree));
        }
        if self.prices.is_empty() {
            return Err(BuildError::EmptyPriceList);
        }
        for &price in &self.prices {
            check_price(price)?;
        }
        check_probability("max_error_chance", self.max_error_chance)?;
        check_probability("half_duplex_probability", self.half_duplex_probability)
    }
}

/// Builds one metropolitan network around a main machine
#[derive(Debug, Clone)]
pub struct MetropolitanNetworkBuilder {
    config: MetropolitanConfig,
}

impl MetropolitanNetworkBuilder {
    pub fn new(config: MetropolitanConfig) -> Result<Self, BuildError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &MetropolitanConfig {
        &self.config
    }

    /// Build a standalone metropolitan network
    pub fn build<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Network, BuildError> {
        let mut network = Network::new();
        let mut ids = IdAllocator::new();
        self.build_into(&mut network, &mut ids, rng)?;
        Ok(network)
    }

    /// Add a metropolitan network to `network`, returning its main machine
    ///
    /// Nodes are joined by a random spanning tree, then extra random links
    /// are added until the average degree target is met or the graph is
    /// complete.
    pub fn build_into<R: Rng + ?Sized>(
        &self,
        network: &mut Network,
        ids: &mut IdAllocator,
        rng: &mut R,
    ) -> Result<NodeId, BuildError> {
        let n = self.config.nodes_count as usize;
        let mut members = Vec::with_capacity(n);

        let main = ids.node();
        network
            .add_node(Node::new(main, NodeType::MainMetropolitanMachine))
            .map_err(NetworkError::from)?;
        members.push(main);
        for _ in 1..n {
            let id = ids.node();
            network.add_node(Node::simple(id)).map_err(NetworkError::from)?;
            members.push(id);
        }

        for i in 1..n {
            let parent = members[rng.random_range(0..i)];
            self.link(network, ids, rng, parent, members[i])?;
        }

        let complete = n * (n - 1) / 2;
        let target = ((n as f64 * self.config.average_degree / 2.0).ceil() as usize).min(complete);
        let mut links = n - 1;
        while links < target {
            let a = members[rng.random_range(0..n)];
            let b = members[rng.random_range(0..n)];
            if a == b || network.get_channel(a, b).is_some() {
                continue;
            }
            self.link(network, ids, rng, a, b)?;
            links += 1;
        }

        debug!(main = %main, nodes = n, links, "Metropolitan network built");
        Ok(main)
    }

    fn link<R: Rng + ?Sized>(
        &self,
        network: &mut Network,
        ids: &mut IdAllocator,
        rng: &mut R,
        a: NodeId,
        b: NodeId,
    ) -> Result<(), BuildError> {
        let price = self.draw_price(rng)?;
        let error_chance = rng.random_range(0.0..=self.config.max_error_chance);
        let connection_type = if rng.random_bool(self.config.half_duplex_probability) {
            ConnectionType::HalfDuplex
        } else {
            ConnectionType::Duplex
        };
        let channel = Channel::new(ids.channel(), a, b, price, error_chance)
            .with_connection_type(connection_type)
            .with_channel_type(ChannelType::Ground);
        network.add_channel(channel).map_err(NetworkError::from)?;
        Ok(())
    }

    fn draw_price<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<f64, BuildError> {
        self.config.prices.choose(rng).copied().ok_or(BuildError::EmptyPriceList)
    }
}

/// Shape of a wide-area network
#[derive(Debug, Clone, PartialEq)]
pub struct WideAreaConfig {
    pub metropolitan_count: u32,
    pub metropolitan: MetropolitanConfig,
    pub satellite_price: f64,
    pub satellite_error_chance: f64,
}

impl Default for WideAreaConfig {
    fn default() -> Self {
        Self {
            metropolitan_count: 3,
            metropolitan: MetropolitanConfig::default(),
            satellite_price: 30.0,
            satellite_error_chance: 0.05,
        }
    }
}

impl WideAreaConfig {
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.metropolitan_count == 0 {
            return Err(BuildError::NoMetropolitanNetworks);
        }
        check_price(self.satellite_price)?;
        check_probability("satellite_error_chance", self.satellite_error_chance)?;
        self.metropolitan.validate()
    }
}

/// Builds a central machine plus linked metropolitan networks
#[derive(Debug, Clone)]
pub struct WideAreaNetworkBuilder {
    config: WideAreaConfig,
    metropolitan: MetropolitanNetworkBuilder,
}

impl WideAreaNetworkBuilder {
    pub fn new(config: WideAreaConfig) -> Result<Self, BuildError> {
        config.validate()?;
        let metropolitan = MetropolitanNetworkBuilder::new(config.metropolitan.clone())?;
        Ok(Self { config, metropolitan })
    }

    pub fn config(&self) -> &WideAreaConfig {
        &self.config
    }

    pub fn build<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Network, BuildError> {
        let mut network = Network::new();
        let mut ids = IdAllocator::new();

        let central = ids.node();
        network
            .add_node(Node::new(central, NodeType::CentralMachine))
            .map_err(NetworkError::from)?;

        let mut mains = Vec::with_capacity(self.config.metropolitan_count as usize);
        for _ in 0..self.config.metropolitan_count {
            let main = self.metropolitan.build_into(&mut network, &mut ids, rng)?;
            let satellite = Channel::new(
                ids.channel(),
                central,
                main,
                self.config.satellite_price,
                self.config.satellite_error_chance,
            )
            .with_channel_type(ChannelType::Satellite);
            network.add_channel(satellite).map_err(NetworkError::from)?;
            mains.push(main);
        }

        // Ring of ground channels; two mains get a single link
        let ring = match mains.len() {
            0 | 1 => 0,
            2 => 1,
            len => len,
        };
        for i in 0..ring {
            let (a, b) = (mains[i], mains[(i + 1) % mains.len()]);
            self.metropolitan.link(&mut network, &mut ids, rng, a, b)?;
        }

        info!(
            nodes = network.node_count(),
            channels = network.channel_count(),
            metropolitan = mains.len(),
            "Wide-area network built"
        );
        Ok(network)
    }
}
