//! In-process mesh over the simulated medium

use rootmesh_core::{
    FixedQuality, MacAddress, MeshConfig, MeshError, Node, NodeStatus, SimMedium,
};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum SimulateError {
    #[error("at least one node is required")]
    Empty,

    #[error("too many nodes: {0} (max 255)")]
    TooMany(usize),

    #[error("node {0} failed to start: {1}")]
    Start(MacAddress, MeshError),

    #[error("node {0} did not settle in time")]
    Unsettled(MacAddress),

    #[error("nodes disagree on the root")]
    Disagreement,
}

/// Locally administered address of simulated node `index`
pub fn sim_address(index: usize) -> MacAddress {
    MacAddress([0x02, 0, 0, 0, 0, index as u8 + 1])
}

/// Start one node per quality, wait for every node to settle and return
/// their final status in start order.
pub async fn run(
    config: MeshConfig,
    qualities: &[i8],
    loss: f64,
) -> Result<Vec<NodeStatus>, SimulateError> {
    if qualities.is_empty() {
        return Err(SimulateError::Empty);
    }
    if qualities.len() > u8::MAX as usize {
        return Err(SimulateError::TooMany(qualities.len()));
    }

    let medium = SimMedium::with_loss(loss);
    let mut nodes = Vec::with_capacity(qualities.len());
    for (index, quality) in qualities.iter().enumerate() {
        let address = sim_address(index);
        let node = Node::start(config.clone(), medium.attach(address), &FixedQuality(*quality))
            .map_err(|e| SimulateError::Start(address, e))?;
        nodes.push(node);
    }

    info!(
        "Simulating {} nodes (interval {:?}, loss {:.2})",
        nodes.len(),
        config.interval,
        loss
    );

    let limit = config.convergence_bound() * 4;
    for node in &nodes {
        if !node.wait_settled(limit).await {
            return Err(SimulateError::Unsettled(node.this_node().address));
        }
    }

    let statuses: Vec<NodeStatus> = nodes.iter().map(Node::status).collect();
    let root = statuses[0].root_node.address;
    if statuses.iter().any(|s| s.root_node.address != root) {
        warn!("Simulation ended with more than one root");
        return Err(SimulateError::Disagreement);
    }

    info!("All {} nodes settled on root {}", statuses.len(), root);
    Ok(statuses)
}
