//! Simulation nodes: satellites, ground stations, and replayed recordings.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::warn;

use orbital_mechanics::{geodetic, KeplerianElements, Vector};

use crate::computing::Computing;
use crate::links::{GroundNearestProtocol, LinkProtocol, NodeId};
use crate::routing::Router;
use crate::CoreResult;

/// Node kinematics. Position is derived from the variant and the simulation
/// time; the step driver is the only writer.
#[derive(Debug)]
pub enum NodeBody {
    Satellite {
        elements: KeplerianElements,
    },
    GroundStation {
        latitude_deg: f64,
        longitude_deg: f64,
        start_time: DateTime<Utc>,
    },
    /// Positions recorded by an earlier run, replayed by timestamp.
    Replay {
        positions: HashMap<DateTime<Utc>, Vector>,
    },
}

/// The link protocol slot of a node. Ground stations keep their concrete
/// protocol accessible for satellite-list maintenance.
pub enum NodeProtocol {
    Isl(Box<dyn LinkProtocol>),
    Ground(GroundNearestProtocol),
}

impl NodeProtocol {
    pub fn link_protocol(&self) -> &dyn LinkProtocol {
        match self {
            NodeProtocol::Isl(p) => p.as_ref(),
            NodeProtocol::Ground(p) => p,
        }
    }

    pub fn ground(&self) -> Option<&GroundNearestProtocol> {
        match self {
            NodeProtocol::Ground(p) => Some(p),
            NodeProtocol::Isl(_) => None,
        }
    }
}

/// A node in the constellation. The name is the identity across the whole
/// system; positions are mutated only through `update_position`.
pub struct Node {
    name: String,
    body: NodeBody,
    position: RwLock<Vector>,
    protocol: NodeProtocol,
    router: Box<dyn Router>,
    computing: Computing,
}

impl Node {
    pub fn satellite(
        name: impl Into<String>,
        elements: KeplerianElements,
        protocol: Box<dyn LinkProtocol>,
        router: Box<dyn Router>,
        computing: Computing,
    ) -> Self {
        Self {
            name: name.into(),
            body: NodeBody::Satellite { elements },
            position: RwLock::new(Vector::default()),
            protocol: NodeProtocol::Isl(protocol),
            router,
            computing,
        }
    }

    pub fn ground_station(
        name: impl Into<String>,
        latitude_deg: f64,
        longitude_deg: f64,
        start_time: DateTime<Utc>,
        protocol: GroundNearestProtocol,
        router: Box<dyn Router>,
        computing: Computing,
    ) -> Self {
        Self {
            name: name.into(),
            body: NodeBody::GroundStation {
                latitude_deg,
                longitude_deg,
                start_time,
            },
            position: RwLock::new(Vector::default()),
            protocol: NodeProtocol::Ground(protocol),
            router,
            computing,
        }
    }

    pub fn replay(
        name: impl Into<String>,
        positions: HashMap<DateTime<Utc>, Vector>,
        protocol: Box<dyn LinkProtocol>,
        router: Box<dyn Router>,
        computing: Computing,
    ) -> Self {
        Self {
            name: name.into(),
            body: NodeBody::Replay { positions },
            position: RwLock::new(Vector::new(-1.0, -1.0, -1.0)),
            protocol: NodeProtocol::Isl(protocol),
            router,
            computing,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn body(&self) -> &NodeBody {
        &self.body
    }

    pub fn is_satellite(&self) -> bool {
        matches!(self.body, NodeBody::Satellite { .. } | NodeBody::Replay { .. })
    }

    pub fn is_ground_station(&self) -> bool {
        matches!(self.body, NodeBody::GroundStation { .. })
    }

    pub fn position(&self) -> Vector {
        *self.position.read()
    }

    pub fn distance_to(&self, other: &Node) -> f64 {
        self.position().distance_to(other.position())
    }

    pub fn protocol(&self) -> &NodeProtocol {
        &self.protocol
    }

    pub fn router(&self) -> &dyn Router {
        self.router.as_ref()
    }

    pub fn computing(&self) -> &Computing {
        &self.computing
    }

    /// Recomputes the position for the given simulation time.
    pub fn update_position(&self, sim_time: DateTime<Utc>) {
        let new_position = match &self.body {
            NodeBody::Satellite { elements } => elements.propagate(sim_time),
            NodeBody::GroundStation {
                latitude_deg,
                longitude_deg,
                start_time,
            } => {
                let elapsed_s = (sim_time - *start_time).num_milliseconds() as f64 / 1_000.0;
                geodetic::ground_position(*latitude_deg, *longitude_deg, elapsed_s)
            }
            NodeBody::Replay { positions } => match positions.get(&sim_time) {
                Some(p) => *p,
                None => {
                    warn!(node = %self.name, time = %sim_time, "no recorded position for time");
                    return;
                }
            },
        };
        *self.position.write() = new_position;
    }

    pub(crate) fn mount(&self, id: NodeId) -> CoreResult<()> {
        self.protocol.link_protocol().mount(id)?;
        self.router.mount(id)?;
        Ok(())
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Node {}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("position", &self.position())
            .finish()
    }
}
