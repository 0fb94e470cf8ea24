//! JSON files holding network snapshots

use std::fs;
use std::path::Path;

use switchnet_core::{Network, NetworkSnapshot};
use tracing::info;

use crate::error::SimulationResult;

/// Read a network from a JSON snapshot
///
/// The network is rebuilt through the ordinary mutation API, so a snapshot
/// with duplicate ids or dangling channels is rejected.
pub fn load_network(path: impl AsRef<Path>) -> SimulationResult<Network> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let snapshot: NetworkSnapshot = serde_json::from_str(&text)?;
    let network = Network::from_snapshot(&snapshot)?;
    info!(
        path = %path.display(),
        nodes = network.node_count(),
        channels = network.channel_count(),
        "Network loaded"
    );
    Ok(network)
}

/// Write the structure of `network` as pretty-printed JSON
pub fn save_network(network: &Network, path: impl AsRef<Path>) -> SimulationResult<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(&network.to_snapshot())?;
    fs::write(path, json)?;
    info!(path = %path.display(), "Network saved");
    Ok(())
}
