//! Reassembly of a captured run into a replayable simulation.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use constellation_core::links::{LinkKind, NodeId, ReplayProtocol};
use constellation_core::{Node, Topology};
use orbital_mechanics::Vector;

use crate::config::SimulationConfig;
use crate::driver::Simulation;
use crate::factory::NodeFactory;
use crate::plugins::SimulationPlugin;
use crate::state::SimulationMetadata;
use crate::{Result, RuntimeError};

/// Builds a replay simulation from captured metadata. Node positions and
/// established sets come from the recording; routers and computing are
/// rebuilt from the current configuration.
pub fn build_replay(
    config: SimulationConfig,
    metadata: &SimulationMetadata,
    factory: &NodeFactory,
    plugins: Vec<Box<dyn SimulationPlugin>>,
) -> Result<Simulation> {
    let timeline: Vec<DateTime<Utc>> = metadata.states.iter().map(|s| s.time).collect();

    // Per-node position history and established-link schedule, in state
    // order. Recorded link indexes equal the pool ids assigned below.
    let mut positions: HashMap<&str, HashMap<DateTime<Utc>, Vector>> = HashMap::new();
    let mut schedules: HashMap<&str, Vec<Vec<usize>>> = HashMap::new();
    for state in &metadata.states {
        for node in &state.nodes {
            positions
                .entry(node.name.as_str())
                .or_default()
                .insert(state.time, node.position);
            schedules
                .entry(node.name.as_str())
                .or_default()
                .push(node.established.clone());
        }
    }

    let mut topo = Topology::new();
    let mut satellites = Vec::with_capacity(metadata.satellites.len());
    let mut grounds = Vec::with_capacity(metadata.grounds.len());

    for (metas, ids) in [
        (&metadata.satellites, &mut satellites),
        (&metadata.grounds, &mut grounds),
    ] {
        for meta in metas.iter() {
            let protocol = ReplayProtocol::new();
            protocol.inject_schedule(
                schedules
                    .get(meta.name.as_str())
                    .cloned()
                    .unwrap_or_default(),
            );
            let node = Node::replay(
                meta.name.clone(),
                positions
                    .get(meta.name.as_str())
                    .cloned()
                    .unwrap_or_default(),
                Box::new(protocol),
                factory.build_router(factory.router_protocol())?,
                factory.computing().build(meta.computing_type),
            );
            let id: NodeId = topo.push_node(node)?;
            ids.push(id);
        }
    }

    // Recreate the link table; pool ids follow the recorded indexes.
    let ground_names: std::collections::HashSet<&str> =
        metadata.grounds.iter().map(|g| g.name.as_str()).collect();
    for link in &metadata.links {
        let a = topo
            .node_id(&link.node1)
            .ok_or_else(|| RuntimeError::UnknownNode(link.node1.clone()))?;
        let b = topo
            .node_id(&link.node2)
            .ok_or_else(|| RuntimeError::UnknownNode(link.node2.clone()))?;
        let kind = if ground_names.contains(link.node1.as_str())
            || ground_names.contains(link.node2.as_str())
        {
            LinkKind::Ground
        } else {
            LinkKind::Isl
        };
        topo.pool().add(kind, a, b);
    }

    Ok(Simulation::replay(
        config, topo, satellites, grounds, timeline, plugins,
    ))
}
