//! Ground station to nearest-satellite uplink.

use parking_lot::Mutex;

use crate::links::{LinkId, LinkKind, LinkProtocol, NodeId};
use crate::topology::Topology;
use crate::{CoreError, CoreResult};

#[derive(Default)]
struct GroundState {
    station: Option<NodeId>,
    satellites: Vec<NodeId>,
    link: Option<LinkId>,
}

/// Keeps at most one active uplink, always to the nearest satellite. The
/// link object is created lazily and replaced whenever the nearest satellite
/// changes.
pub struct GroundNearestProtocol {
    state: Mutex<GroundState>,
}

impl GroundNearestProtocol {
    pub fn new(satellites: Vec<NodeId>) -> Self {
        Self {
            state: Mutex::new(GroundState {
                station: None,
                satellites,
                link: None,
            }),
        }
    }

    /// Makes a new satellite eligible for selection.
    pub fn add_satellite(&self, satellite: NodeId) {
        let mut state = self.state.lock();
        if !state.satellites.contains(&satellite) {
            state.satellites.push(satellite);
        }
    }

    /// Drops a satellite; clears the active link if it pointed there.
    pub fn remove_satellite(&self, satellite: NodeId, topo: &Topology) -> CoreResult<()> {
        let cleared = {
            let mut state = self.state.lock();
            state.satellites.retain(|&s| s != satellite);
            let station = state.station.ok_or(CoreError::NotMounted)?;
            match state.link {
                Some(id) if topo.pool().get(id).other(station)? == satellite => {
                    state.link = None;
                    Some(id)
                }
                _ => None,
            }
        };
        if let Some(id) = cleared {
            topo.node(satellite)
                .protocol()
                .link_protocol()
                .disconnect_link(id, topo)?;
            topo.pool().get(id).set_established(false);
        }
        Ok(())
    }

    /// The active uplink, if any.
    pub fn link(&self) -> Option<LinkId> {
        self.state.lock().link
    }
}

impl LinkProtocol for GroundNearestProtocol {
    fn mount(&self, node: NodeId) -> CoreResult<()> {
        let mut state = self.state.lock();
        if state.station.is_some() {
            return Err(CoreError::AlreadyMounted);
        }
        state.station = Some(node);
        Ok(())
    }

    fn add_link(&self, _link: LinkId, _topo: &Topology) {}

    fn connect_link(&self, _link: LinkId, _topo: &Topology) -> CoreResult<()> {
        Ok(())
    }

    fn disconnect_link(&self, _link: LinkId, _topo: &Topology) -> CoreResult<()> {
        Ok(())
    }

    fn update_links(&self, topo: &Topology) -> CoreResult<Vec<LinkId>> {
        let (new_id, nearest, old) = {
            let mut state = self.state.lock();
            let station = state.station.ok_or(CoreError::NotMounted)?;
            if state.satellites.is_empty() {
                return Err(CoreError::NoCandidateSatellite);
            }

            let station_pos = topo.node(station).position();
            let mut nearest = state.satellites[0];
            let mut best = topo.node(nearest).position().distance_to(station_pos);
            for &sat in &state.satellites[1..] {
                let distance = topo.node(sat).position().distance_to(station_pos);
                if distance < best {
                    best = distance;
                    nearest = sat;
                }
            }

            if let Some(id) = state.link {
                if topo.pool().get(id).other(station)? == nearest {
                    return Ok(vec![id]);
                }
            }

            let link = topo.pool().add(LinkKind::Ground, station, nearest);
            link.set_established(true);
            let old = state.link.replace(link.id());
            (link.id(), nearest, old.map(|id| (id, station)))
        };

        topo.node(nearest)
            .protocol()
            .link_protocol()
            .connect_link(new_id, topo)?;

        if let Some((old_id, station)) = old {
            let old_link = topo.pool().get(old_id);
            let old_satellite = old_link.other(station)?;
            topo.node(old_satellite)
                .protocol()
                .link_protocol()
                .disconnect_link(old_id, topo)?;
            old_link.set_established(false);
        }

        Ok(vec![new_id])
    }

    fn links(&self) -> Vec<LinkId> {
        self.state.lock().link.into_iter().collect()
    }

    fn established(&self) -> Vec<LinkId> {
        self.links()
    }
}
