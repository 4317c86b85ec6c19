//! Link protocol that replays a recorded establishment schedule.

use parking_lot::Mutex;
use tracing::warn;

use orbital_mechanics::Vector;

use crate::links::{LinkId, LinkProtocol, NodeId};
use crate::topology::Topology;
use crate::{CoreError, CoreResult};

struct ReplayState {
    node: Option<NodeId>,
    links: Vec<LinkId>,
    /// Established link set per recorded step, in timeline order.
    schedule: Vec<Vec<LinkId>>,
    current: Option<usize>,
    position: Vector,
}

/// Replays the established sets captured by an earlier run. The schedule
/// index advances whenever the mounted node's position changed, i.e. once
/// per replayed step.
pub struct ReplayProtocol {
    state: Mutex<ReplayState>,
}

impl ReplayProtocol {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ReplayState {
                node: None,
                links: Vec::new(),
                schedule: Vec::new(),
                current: None,
                // Sentinel no real node ever occupies, so the first update
                // always advances to step zero.
                position: Vector::new(-1.0, -1.0, -1.0),
            }),
        }
    }

    pub fn inject_schedule(&self, schedule: Vec<Vec<LinkId>>) {
        self.state.lock().schedule = schedule;
    }
}

impl Default for ReplayProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkProtocol for ReplayProtocol {
    fn mount(&self, node: NodeId) -> CoreResult<()> {
        let mut state = self.state.lock();
        if state.node.is_some() {
            return Err(CoreError::AlreadyMounted);
        }
        state.node = Some(node);
        Ok(())
    }

    fn add_link(&self, link: LinkId, _topo: &Topology) {
        self.state.lock().links.push(link);
    }

    fn connect_link(&self, _link: LinkId, _topo: &Topology) -> CoreResult<()> {
        Ok(())
    }

    fn disconnect_link(&self, _link: LinkId, _topo: &Topology) -> CoreResult<()> {
        Ok(())
    }

    fn update_links(&self, topo: &Topology) -> CoreResult<Vec<LinkId>> {
        let mut state = self.state.lock();
        let node = state.node.ok_or(CoreError::NotMounted)?;

        let position = topo.node(node).position();
        if state.position != position {
            state.position = position;
            let next = state.current.map(|ix| ix + 1).unwrap_or(0);
            if next >= state.schedule.len() {
                warn!(node = %topo.node(node).name(), step = next, "replay schedule exhausted");
            } else {
                state.current = Some(next);
            }

            if let Some(ix) = state.current {
                if ix > 0 {
                    for &old in &state.schedule[ix - 1] {
                        if !state.schedule[ix].contains(&old) {
                            topo.pool().get(old).set_established(false);
                        }
                    }
                }
                for &id in &state.schedule[ix] {
                    topo.pool().get(id).set_established(true);
                }
            }
        }

        Ok(state
            .current
            .map(|ix| state.schedule[ix].clone())
            .unwrap_or_default())
    }

    fn links(&self) -> Vec<LinkId> {
        self.state.lock().links.clone()
    }

    fn established(&self) -> Vec<LinkId> {
        let state = self.state.lock();
        state
            .current
            .map(|ix| state.schedule[ix].clone())
            .unwrap_or_default()
    }
}
