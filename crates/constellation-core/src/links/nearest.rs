//! Nearest-N neighbor selection.

use std::cmp::Ordering;
use std::collections::HashSet;

use parking_lot::Mutex;

use crate::links::{LinkId, LinkProtocol, NodeId};
use crate::topology::Topology;
use crate::{CoreError, CoreResult};

#[derive(Default)]
struct NearestState {
    node: Option<NodeId>,
    links: Vec<LinkId>,
    seen: HashSet<LinkId>,
    outgoing: Vec<LinkId>,
    incoming: HashSet<LinkId>,
}

/// Connects the mounted satellite to its N nearest reachable neighbors.
///
/// N caps the outgoing selection only; the observable established set is the
/// union of outgoing picks and links connected by peers, and may exceed N in
/// dense constellations.
pub struct NearestProtocol {
    neighbours: usize,
    state: Mutex<NearestState>,
}

impl NearestProtocol {
    pub fn new(neighbours: usize) -> Self {
        Self {
            neighbours,
            state: Mutex::new(NearestState::default()),
        }
    }
}

impl LinkProtocol for NearestProtocol {
    fn mount(&self, node: NodeId) -> CoreResult<()> {
        let mut state = self.state.lock();
        if state.node.is_some() {
            return Err(CoreError::AlreadyMounted);
        }
        state.node = Some(node);
        Ok(())
    }

    fn add_link(&self, link: LinkId, _topo: &Topology) {
        let mut state = self.state.lock();
        if state.seen.insert(link) {
            state.links.push(link);
        }
    }

    fn connect_link(&self, link: LinkId, _topo: &Topology) -> CoreResult<()> {
        self.state.lock().incoming.insert(link);
        Ok(())
    }

    fn disconnect_link(&self, link: LinkId, topo: &Topology) -> CoreResult<()> {
        let mut state = self.state.lock();
        state.incoming.remove(&link);
        if !state.outgoing.contains(&link) {
            topo.pool().get(link).set_established(false);
        }
        Ok(())
    }

    fn update_links(&self, topo: &Topology) -> CoreResult<Vec<LinkId>> {
        // Selection happens under the lock; peer notifications after release.
        let (node, added, removed, selected) = {
            let mut state = self.state.lock();
            let node = state.node.ok_or(CoreError::NotMounted)?;

            let mut valid: Vec<(f64, LinkId)> = state
                .links
                .iter()
                .filter_map(|&id| {
                    let link = topo.pool().get(id);
                    link.reachable(topo).then(|| (link.distance(topo), id))
                })
                .collect();
            valid.sort_by(|a, b| {
                a.0.partial_cmp(&b.0)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.1.cmp(&b.1))
            });
            valid.truncate(self.neighbours);

            let selected: Vec<LinkId> = valid.into_iter().map(|(_, id)| id).collect();
            let previous: HashSet<LinkId> = state.outgoing.iter().copied().collect();
            let added: Vec<LinkId> = selected
                .iter()
                .copied()
                .filter(|id| !previous.contains(id))
                .collect();
            let removed: Vec<LinkId> = previous
                .into_iter()
                .filter(|id| !selected.contains(id))
                .collect();

            state.outgoing = selected.clone();
            (node, added, removed, selected)
        };

        for id in added {
            let link = topo.pool().get(id);
            link.set_established(true);
            let peer = link.other(node)?;
            topo.node(peer)
                .protocol()
                .link_protocol()
                .connect_link(id, topo)?;
        }
        for id in removed {
            let link = topo.pool().get(id);
            let peer = link.other(node)?;
            topo.node(peer)
                .protocol()
                .link_protocol()
                .disconnect_link(id, topo)?;
            if !self.state.lock().incoming.contains(&id) {
                link.set_established(false);
            }
        }

        Ok(selected)
    }

    fn links(&self) -> Vec<LinkId> {
        self.state.lock().links.clone()
    }

    fn established(&self) -> Vec<LinkId> {
        let state = self.state.lock();
        let mut out = state.outgoing.clone();
        for &id in &state.incoming {
            if !out.contains(&id) {
                out.push(id);
            }
        }
        out
    }
}
