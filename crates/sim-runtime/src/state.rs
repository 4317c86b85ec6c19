//! Per-step topology capture and serialization.
//!
//! Links are referenced by stable index into a table that grows as new links
//! first appear in an established set. `save` writes the binary state file
//! and a pretty-printed `.json` sibling.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use constellation_core::computing::ComputingType;
use constellation_core::links::LinkId;
use orbital_mechanics::Vector;

use crate::driver::{Simulation, SimulationController};
use crate::plugins::StatePlugin;
use crate::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RecordedLink {
    pub node1: String,
    pub node2: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RecordedNode {
    pub name: String,
    pub position: Vector,
    /// Indexes into the link table.
    pub established: Vec<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RecordedState {
    pub time: DateTime<Utc>,
    pub nodes: Vec<RecordedNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawNodeMeta {
    pub name: String,
    pub computing_type: ComputingType,
}

/// Everything needed to replay a run offline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SimulationMetadata {
    pub satellites: Vec<RawNodeMeta>,
    pub grounds: Vec<RawNodeMeta>,
    pub links: Vec<RecordedLink>,
    pub states: Vec<RecordedState>,
    pub state_plugins: Vec<String>,
}

/// Accumulates one state record per step and serializes the run.
pub struct StateRecorder {
    output: PathBuf,
    metadata: SimulationMetadata,
    link_index: HashMap<LinkId, usize>,
    state_plugins: Vec<Box<dyn StatePlugin>>,
}

impl StateRecorder {
    pub fn new(output: PathBuf, state_plugins: Vec<Box<dyn StatePlugin>>) -> Self {
        Self {
            output,
            metadata: SimulationMetadata::default(),
            link_index: HashMap::new(),
            state_plugins,
        }
    }

    pub fn add_state(&mut self, sim: &Simulation) {
        let topo = sim.topology();
        let time = sim.sim_time();

        let mut nodes = Vec::with_capacity(topo.nodes().len());
        for (id, node) in topo.nodes().iter().enumerate() {
            let established = topo.established_links(id);
            let mut indexes = Vec::with_capacity(established.len());
            for link_id in established {
                let index = match self.link_index.get(&link_id) {
                    Some(&index) => index,
                    None => {
                        let link = topo.pool().get(link_id);
                        let (a, b) = link.nodes();
                        let index = self.metadata.links.len();
                        self.metadata.links.push(RecordedLink {
                            node1: topo.node(a).name().to_owned(),
                            node2: topo.node(b).name().to_owned(),
                        });
                        self.link_index.insert(link_id, index);
                        index
                    }
                };
                indexes.push(index);
            }
            nodes.push(RecordedNode {
                name: node.name().to_owned(),
                position: node.position(),
                established: indexes,
            });
        }
        drop(topo);

        self.metadata.states.push(RecordedState { time, nodes });
        for plugin in &self.state_plugins {
            plugin.add_state(sim);
        }
    }

    /// Writes the binary state file plus the `.json` sibling.
    pub fn save(&mut self, sim: &Simulation) -> Result<()> {
        self.metadata.satellites = sim
            .satellites()
            .iter()
            .map(|node| RawNodeMeta {
                name: node.name().to_owned(),
                computing_type: node.computing().kind(),
            })
            .collect();
        self.metadata.grounds = sim
            .ground_stations()
            .iter()
            .map(|node| RawNodeMeta {
                name: node.name().to_owned(),
                computing_type: node.computing().kind(),
            })
            .collect();
        self.metadata.state_plugins = self
            .state_plugins
            .iter()
            .map(|p| p.name().to_owned())
            .collect();

        let file = BufWriter::new(File::create(&self.output)?);
        bincode::serialize_into(file, &self.metadata)?;

        let json_path = json_sibling(&self.output);
        let json_file = BufWriter::new(File::create(&json_path)?);
        serde_json::to_writer_pretty(json_file, &self.metadata)?;

        for plugin in &self.state_plugins {
            plugin.save(&self.output);
        }

        info!(
            states = self.metadata.states.len(),
            links = self.metadata.links.len(),
            output = %self.output.display(),
            "saved simulation state"
        );
        Ok(())
    }
}

fn json_sibling(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".json");
    PathBuf::from(os)
}

/// Reads a state file written by [`StateRecorder::save`]; accepts either the
/// binary or the JSON flavor.
pub fn load_metadata(path: impl AsRef<Path>) -> Result<SimulationMetadata> {
    let bytes = std::fs::read(path.as_ref())?;
    match bincode::deserialize(&bytes) {
        Ok(metadata) => Ok(metadata),
        Err(_) => Ok(serde_json::from_slice(&bytes)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_roundtrips_through_both_encodings() {
        let metadata = SimulationMetadata {
            satellites: vec![RawNodeMeta {
                name: "SAT-0".into(),
                computing_type: ComputingType::Edge,
            }],
            grounds: vec![RawNodeMeta {
                name: "GS".into(),
                computing_type: ComputingType::Cloud,
            }],
            links: vec![RecordedLink {
                node1: "SAT-0".into(),
                node2: "GS".into(),
            }],
            states: vec![RecordedState {
                time: chrono::TimeZone::with_ymd_and_hms(&Utc, 2024, 1, 1, 0, 0, 0).unwrap(),
                nodes: vec![RecordedNode {
                    name: "SAT-0".into(),
                    position: Vector::new(1.0, 2.0, 3.0),
                    established: vec![0],
                }],
            }],
            state_plugins: vec![],
        };

        let binary = bincode::serialize(&metadata).unwrap();
        let decoded: SimulationMetadata = bincode::deserialize(&binary).unwrap();
        assert_eq!(decoded.states[0].nodes[0].position, Vector::new(1.0, 2.0, 3.0));
        assert_eq!(decoded.links[0].node2, "GS");

        let json = serde_json::to_vec(&metadata).unwrap();
        let decoded: SimulationMetadata = serde_json::from_slice(&json).unwrap();
        assert_eq!(decoded.states[0].nodes[0].established, vec![0]);
        assert_eq!(decoded.satellites[0].computing_type, ComputingType::Edge);
    }

    #[test]
    fn json_sibling_appends_extension() {
        assert_eq!(
            json_sibling(Path::new("/tmp/run.state")),
            PathBuf::from("/tmp/run.state.json")
        );
    }
}
