//! Link model and the shared link pool.
//!
//! Every link in the simulation lives in exactly one [`LinkPool`] as an
//! `(a, b)` pair of node indexes. Protocols reference links by [`LinkId`];
//! geometry (`distance`, `latency`, `reachable`) is computed on demand from
//! the current node positions, which are frozen for the duration of the
//! links phase.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use orbital_mechanics::constants::{EARTH_RADIUS_M, MAX_ISL_DISTANCE_M, SPEED_OF_LIGHT_M_S};

use crate::topology::Topology;
use crate::{CoreError, CoreResult};

pub mod filter;
pub mod ground;
pub mod loops;
pub mod mst;
pub mod nearest;
pub mod prim;
pub mod protocol;
pub mod pst;
pub mod replay;
#[cfg(test)]
mod tests;

pub use filter::LinkFilterProtocol;
pub use ground::GroundNearestProtocol;
pub use loops::{AddLoopProtocol, AddSmartLoopProtocol};
pub use mst::GlobalMstProtocol;
pub use nearest::NearestProtocol;
pub use prim::PrimMstProtocol;
pub use protocol::{GroundProtocolBuilder, IslProtocolBuilder, LinkProtocol};
pub use pst::PstProtocol;
pub use replay::ReplayProtocol;

/// Stable index of a node in the topology.
pub type NodeId = usize;

/// Stable index of a link in the pool.
pub type LinkId = usize;

/// ISLs run at 99% of c, ground uplinks at 98%.
const ISL_LIGHT_FRACTION: f64 = 0.99;
const GROUND_LIGHT_FRACTION: f64 = 0.98;

const ISL_BANDWIDTH_BPS: f64 = 200e9;
const GROUND_BANDWIDTH_BPS: f64 = 500e6;

/// Line-of-sight safety clearance above the Earth surface, in meters.
const LOS_CLEARANCE_M: f64 = 10_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Isl,
    Ground,
}

/// An undirected link between two nodes.
#[derive(Debug)]
pub struct Link {
    id: LinkId,
    kind: LinkKind,
    a: NodeId,
    b: NodeId,
    established: AtomicBool,
}

impl Link {
    pub fn id(&self) -> LinkId {
        self.id
    }

    pub fn kind(&self) -> LinkKind {
        self.kind
    }

    pub fn nodes(&self) -> (NodeId, NodeId) {
        (self.a, self.b)
    }

    pub fn involves(&self, node: NodeId) -> bool {
        self.a == node || self.b == node
    }

    /// The opposite endpoint, or `NotAnEndpoint` if `node` is neither.
    pub fn other(&self, node: NodeId) -> CoreResult<NodeId> {
        if node == self.a {
            Ok(self.b)
        } else if node == self.b {
            Ok(self.a)
        } else {
            Err(CoreError::NotAnEndpoint(self.id))
        }
    }

    pub fn is_established(&self) -> bool {
        self.established.load(Ordering::Acquire)
    }

    pub fn set_established(&self, value: bool) {
        self.established.store(value, Ordering::Release);
    }

    /// Link length in meters at the current node positions.
    pub fn distance(&self, topo: &Topology) -> f64 {
        topo.node(self.a)
            .position()
            .distance_to(topo.node(self.b).position())
    }

    /// One-way latency in milliseconds.
    pub fn latency_ms(&self, topo: &Topology) -> f64 {
        let fraction = match self.kind {
            LinkKind::Isl => ISL_LIGHT_FRACTION,
            LinkKind::Ground => GROUND_LIGHT_FRACTION,
        };
        self.distance(topo) / (fraction * SPEED_OF_LIGHT_M_S) * 1_000.0
    }

    pub fn bandwidth_bps(&self) -> f64 {
        match self.kind {
            LinkKind::Isl => ISL_BANDWIDTH_BPS,
            LinkKind::Ground => GROUND_BANDWIDTH_BPS,
        }
    }

    /// Whether the link can be operated right now.
    ///
    /// ISLs need line-of-sight clearing the Earth by [`LOS_CLEARANCE_M`] and
    /// a length within [`MAX_ISL_DISTANCE_M`]. Ground links are always
    /// reachable.
    pub fn reachable(&self, topo: &Topology) -> bool {
        match self.kind {
            LinkKind::Ground => true,
            LinkKind::Isl => {
                let p1 = topo.node(self.a).position();
                let p2 = topo.node(self.b).position();
                let v = p2 - p1;
                let chord = v.magnitude();
                if chord == 0.0 || chord > MAX_ISL_DISTANCE_M {
                    return false;
                }
                let clearance = v.cross(p1).magnitude() / chord;
                clearance > EARTH_RADIUS_M + LOS_CLEARANCE_M
            }
        }
    }
}

/// Owner of every link in the simulation. Append-only; ids are stable.
#[derive(Debug, Default)]
pub struct LinkPool {
    links: RwLock<Vec<Arc<Link>>>,
}

impl LinkPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, kind: LinkKind, a: NodeId, b: NodeId) -> Arc<Link> {
        let mut links = self.links.write();
        let link = Arc::new(Link {
            id: links.len(),
            kind,
            a,
            b,
            established: AtomicBool::new(false),
        });
        links.push(Arc::clone(&link));
        link
    }

    pub fn get(&self, id: LinkId) -> Arc<Link> {
        Arc::clone(&self.links.read()[id])
    }

    pub fn len(&self) -> usize {
        self.links.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.read().is_empty()
    }

    pub fn snapshot(&self) -> Vec<Arc<Link>> {
        self.links.read().clone()
    }
}
