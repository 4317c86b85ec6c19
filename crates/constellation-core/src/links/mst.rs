//! Global minimum spanning tree over the reachable ISL graph.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use orbital_mechanics::constants::MAX_ISL_DISTANCE_M;
use orbital_mechanics::Vector;

use crate::latch::ReadyLatch;
use crate::links::{LinkId, LinkProtocol, NodeId};
use crate::topology::Topology;
use crate::{CoreError, CoreResult};

#[derive(Default)]
struct MstState {
    node: Option<NodeId>,
    links: Vec<LinkId>,
    seen: HashSet<LinkId>,
    established: Vec<LinkId>,
    position: Vector,
}

/// Kruskal MST shared by every satellite on the same link pool.
///
/// The tree is rebuilt only when the owning satellite's position changed
/// since the last build (exact vector equality); concurrent callers that see
/// an unchanged position wait on the ready latch and reuse the cached tree.
pub struct GlobalMstProtocol {
    state: Mutex<MstState>,
    ready: ReadyLatch,
}

impl GlobalMstProtocol {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MstState::default()),
            ready: ReadyLatch::new(true),
        }
    }
}

impl Default for GlobalMstProtocol {
    fn default() -> Self {
        Self::new()
    }
}

/// Disjoint-set lookup with path compression, keyed by node name.
fn find_representative(reps: &mut HashMap<String, String>, name: &str) -> String {
    let mut current = name.to_owned();
    loop {
        let parent = reps[&current].clone();
        if parent == current {
            break;
        }
        current = parent;
    }
    if current != name {
        reps.insert(name.to_owned(), current.clone());
    }
    current
}

impl LinkProtocol for GlobalMstProtocol {
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

        // Union-find forest over every satellite that appears in a link.
        let mut reps: HashMap<String, String> = HashMap::new();
        for &id in &state.links {
            let (a, b) = topo.pool().get(id).nodes();
            for endpoint in [a, b] {
                let name = topo.node(endpoint).name().to_owned();
                reps.entry(name.clone()).or_insert(name);
            }
        }
        let satellite_count = reps.len();

        let mut edges: Vec<(f64, LinkId)> = state
            .links
            .iter()
            .filter_map(|&id| {
                let link = topo.pool().get(id);
                let distance = link.distance(topo);
                (distance <= MAX_ISL_DISTANCE_M).then_some((distance, id))
            })
            .collect();
        edges.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.1.cmp(&b.1))
        });

        let mut mst = Vec::new();
        for (_, id) in edges {
            let link = topo.pool().get(id);
            let (a, b) = link.nodes();
            let rep_a = find_representative(&mut reps, topo.node(a).name());
            let rep_b = find_representative(&mut reps, topo.node(b).name());
            if rep_a == rep_b || !link.reachable(topo) {
                continue;
            }
            reps.insert(rep_b, rep_a);
            mst.push(id);
            if mst.len() + 1 == satellite_count {
                break;
            }
        }

        let new_set: HashSet<LinkId> = mst.iter().copied().collect();
        for &id in &mst {
            topo.pool().get(id).set_established(true);
        }
        for &old in &state.established {
            if !new_set.contains(&old) {
                topo.pool().get(old).set_established(false);
            }
        }
        state.established = mst.clone();

        drop(state);
        self.ready.set();
        Ok(mst)
    }

    fn links(&self) -> Vec<LinkId> {
        self.state.lock().links.clone()
    }

    fn established(&self) -> Vec<LinkId> {
        self.state.lock().established.clone()
    }
}
