//! Satellite-centric MST built with Prim's algorithm.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use parking_lot::Mutex;

use orbital_mechanics::Vector;

use crate::latch::ReadyLatch;
use crate::links::{LinkId, LinkProtocol, NodeId};
use crate::topology::Topology;
use crate::{CoreError, CoreResult};

#[derive(Default)]
struct PrimState {
    node: Option<NodeId>,
    links: Vec<LinkId>,
    seen: HashSet<LinkId>,
    established: Vec<LinkId>,
    position: Vector,
}

/// Min-heap entry keyed by link distance.
struct Frontier {
    distance: f64,
    link: LinkId,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, we want the shortest link.
        other
            .distance
            .partial_cmp(&self.distance)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.link.cmp(&self.link))
    }
}

/// Prim MST rooted at the mounted satellite, shared by the constellation and
/// cached by owner position.
pub struct PrimMstProtocol {
    state: Mutex<PrimState>,
    ready: ReadyLatch,
}

impl PrimMstProtocol {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PrimState::default()),
            ready: ReadyLatch::new(true),
        }
    }
}

impl Default for PrimMstProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkProtocol for PrimMstProtocol {
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
        let root = state.node.ok_or(CoreError::NotMounted)?;

        let current = topo.node(root).position();
        if state.position == current {
            drop(state);
            self.ready.wait();
            return Ok(self.state.lock().established.clone());
        }
        state.position = current;
        self.ready.reset();

        // Usable candidates, indexed by endpoint.
        let mut adjacency: HashMap<NodeId, Vec<(f64, LinkId)>> = HashMap::new();
        for &id in &state.links {
            let link = topo.pool().get(id);
            if !link.reachable(topo) {
                continue;
            }
            let distance = link.distance(topo);
            let (a, b) = link.nodes();
            adjacency.entry(a).or_default().push((distance, id));
            adjacency.entry(b).or_default().push((distance, id));
        }
        let satellite_count = adjacency.len().max(1);

        let mut heap = BinaryHeap::new();
        let mut visited: HashSet<NodeId> = HashSet::from([root]);
        if let Some(edges) = adjacency.get(&root) {
            for &(distance, link) in edges {
                heap.push(Frontier { distance, link });
            }
        }

        let mut mst = Vec::new();
        while mst.len() + 1 < satellite_count {
            let Some(entry) = heap.pop() else {
                break;
            };
            let link = topo.pool().get(entry.link);
            let (a, b) = link.nodes();
            if visited.contains(&a) && visited.contains(&b) {
                continue;
            }
            let joined = if visited.contains(&a) { b } else { a };
            visited.insert(joined);
            mst.push(entry.link);

            if let Some(edges) = adjacency.get(&joined) {
                for &(distance, id) in edges {
                    let candidate = topo.pool().get(id);
                    let (ca, cb) = candidate.nodes();
                    if !(visited.contains(&ca) && visited.contains(&cb)) {
                        heap.push(Frontier { distance, link: id });
                    }
                }
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
