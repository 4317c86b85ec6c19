//! Partial spanning tree: latency-greedy tree with a per-node degree cap.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use orbital_mechanics::Vector;

use crate::latch::ReadyLatch;
use crate::links::{LinkId, LinkProtocol, NodeId};
use crate::topology::Topology;
use crate::{CoreError, CoreResult};

/// Maximum links a single satellite may carry in the partial tree. Limits
/// branching even where a full MST would degenerate into a star.
const PST_DEGREE_CAP: usize = 4;

#[derive(Default)]
struct PstState {
    node: Option<NodeId>,
    links: Vec<LinkId>,
    seen: HashSet<LinkId>,
    established: Vec<LinkId>,
    position: Vector,
}

/// Shared partial-spanning-tree protocol.
///
/// Every satellite, in index order, attempts to claim its lowest-latency
/// link whose endpoints sit in different components and are both under the
/// degree cap. Cached by owner position like the global MST.
pub struct PstProtocol {
    state: Mutex<PstState>,
    ready: ReadyLatch,
}

impl PstProtocol {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PstState::default()),
            ready: ReadyLatch::new(true),
        }
    }
}

impl Default for PstProtocol {
    fn default() -> Self {
        Self::new()
    }
}

fn find_root(reps: &mut HashMap<NodeId, NodeId>, node: NodeId) -> NodeId {
    let mut current = node;
    while reps[&current] != current {
        current = reps[&current];
    }
    reps.insert(node, current);
    current
}

impl LinkProtocol for PstProtocol {
    fn mount(&self, node: NodeId) -> CoreResult<()> {
        let mut state = self.state.lock();
        if state.node.is_none() {
            state.node = Some(node);
        }
        Ok(())
    }

    fn add_link(&self, link: LinkId, _topo: &Topology) {
        let mut state = self.state.lock();
        if state.seen.insert(link) {
            state.links.push(link);
        }
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

        let current = topo.node(node).position();
        if state.position == current {
            drop(state);
            self.ready.wait();
            return Ok(self.state.lock().established.clone());
        }
        state.position = current;
        self.ready.reset();

        // Adjacency over the usable candidate links.
        let mut adjacency: HashMap<NodeId, Vec<(f64, LinkId)>> = HashMap::new();
        for &id in &state.links {
            let link = topo.pool().get(id);
            if !link.reachable(topo) {
                continue;
            }
            let latency = link.latency_ms(topo);
            let (a, b) = link.nodes();
            adjacency.entry(a).or_default().push((latency, id));
            adjacency.entry(b).or_default().push((latency, id));
        }

        let mut satellites: Vec<NodeId> = adjacency.keys().copied().collect();
        satellites.sort_unstable();

        let mut reps: HashMap<NodeId, NodeId> =
            satellites.iter().map(|&s| (s, s)).collect();
        let mut degree: HashMap<NodeId, usize> = HashMap::new();
        let mut accepted = Vec::new();

        for &sat in &satellites {
            let mut candidates = adjacency[&sat].clone();
            candidates.sort_by(|a, b| {
                a.0.partial_cmp(&b.0)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.1.cmp(&b.1))
            });
            for (_, id) in candidates {
                let other = topo.pool().get(id).other(sat)?;
                let rep_sat = find_root(&mut reps, sat);
                let rep_other = find_root(&mut reps, other);
                if rep_sat == rep_other
                    || degree.get(&sat).copied().unwrap_or(0) >= PST_DEGREE_CAP
                    || degree.get(&other).copied().unwrap_or(0) >= PST_DEGREE_CAP
                {
                    continue;
                }
                *degree.entry(sat).or_insert(0) += 1;
                *degree.entry(other).or_insert(0) += 1;
                reps.insert(rep_other, rep_sat);
                accepted.push(id);
                break;
            }
        }

        let new_set: HashSet<LinkId> = accepted.iter().copied().collect();
        for &id in &accepted {
            topo.pool().get(id).set_established(true);
        }
        for &old in &state.established {
            if !new_set.contains(&old) {
                topo.pool().get(old).set_established(false);
            }
        }
        state.established = accepted.clone();

        drop(state);
        self.ready.set();
        Ok(accepted)
    }

    fn links(&self) -> Vec<LinkId> {
        self.state.lock().links.clone()
    }

    fn established(&self) -> Vec<LinkId> {
        self.state.lock().established.clone()
    }
}
