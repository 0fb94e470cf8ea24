//! Random user traffic

use rand::Rng;
use rand::seq::IndexedRandom;
use switchnet_core::{Network, NodeId};
use tracing::{debug, warn};

use crate::creators::{Creators, MessageInitializer, RouteSource, TransferMode};
use crate::error::BuildError;

/// How much traffic to start each tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrafficConfig {
    /// Chance that an active node starts a transmission in a tick
    pub message_generate_chance: f64,
    pub min_message_size: u32,
    pub max_message_size: u32,
    pub transfer_mode: TransferMode,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            message_generate_chance: 0.05,
            min_message_size: 64,
            max_message_size: 4096,
            transfer_mode: TransferMode::Datagram,
        }
    }
}

impl TrafficConfig {
    pub fn validate(&self) -> Result<(), BuildError> {
        if !(0.0..=1.0).contains(&self.message_generate_chance) {
            return Err(BuildError::InvalidProbability {
                name: "message_generate_chance",
                value: self.message_generate_chance,
            });
        }
        if self.min_message_size == 0 || self.min_message_size > self.max_message_size {
            return Err(BuildError::InvalidMessageSize {
                min: self.min_message_size,
                max: self.max_message_size,
            });
        }
        Ok(())
    }
}

/// Start random transmissions between active nodes
///
/// Every active node rolls once; on success it picks another active node at
/// random as receiver. Returns the number of transmissions started.
pub fn generate<R: Rng + ?Sized>(
    network: &mut Network,
    routes: &dyn RouteSource,
    creators: &Creators,
    config: &TrafficConfig,
    rng: &mut R,
) -> usize {
    let active: Vec<NodeId> = network.nodes().filter(|n| n.is_active).map(|n| n.id).collect();
    if active.len() < 2 {
        return 0;
    }
    let creator = creators.for_mode(config.transfer_mode);

    let mut started = 0;
    for &sender in &active {
        if !rng.random_bool(config.message_generate_chance) {
            continue;
        }
        let others: Vec<NodeId> = active.iter().copied().filter(|&n| n != sender).collect();
        let Some(&receiver) = others.choose(rng) else {
            continue;
        };
        let size = rng.random_range(config.min_message_size..=config.max_message_size);

        let initializer = MessageInitializer::new(sender, receiver, size);
        match creator.create_messages(network, routes, &initializer) {
            Ok(Some(ids)) => {
                started += 1;
                debug!(from = %sender, to = %receiver, size, messages = ids.len(), "Traffic generated");
            }
            Ok(None) => debug!(from = %sender, to = %receiver, "No route for generated traffic"),
            Err(e) => warn!(from = %sender, to = %receiver, error = %e, "Generated traffic rejected"),
        }
    }
    started
}
