//! Loop decorators: augment a tree-shaped inner protocol with extra links so
//! the topology is not partitioned by a single link failure.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use orbital_mechanics::Vector;

use crate::latch::ReadyLatch;
use crate::links::{LinkId, LinkProtocol, NodeId};
use crate::topology::Topology;
use crate::{CoreError, CoreResult};

/// Adds at most one extra link per tick when the inner protocol produced
/// fewer than `neighbours - 1` links for the mounted node.
pub struct AddLoopProtocol {
    inner: Arc<dyn LinkProtocol>,
    neighbours: usize,
    last_added: Mutex<Option<LinkId>>,
}

impl AddLoopProtocol {
    pub fn new(inner: Arc<dyn LinkProtocol>, neighbours: usize) -> Self {
        Self {
            inner,
            neighbours,
            last_added: Mutex::new(None),
        }
    }
}

impl LinkProtocol for AddLoopProtocol {
    fn mount(&self, node: NodeId) -> CoreResult<()> {
        self.inner.mount(node)
    }

    fn add_link(&self, link: LinkId, topo: &Topology) {
        self.inner.add_link(link, topo);
    }

    fn connect_link(&self, link: LinkId, topo: &Topology) -> CoreResult<()> {
        self.inner.connect_link(link, topo)
    }

    fn disconnect_link(&self, link: LinkId, topo: &Topology) -> CoreResult<()> {
        self.inner.disconnect_link(link, topo)
    }

    fn update_links(&self, topo: &Topology) -> CoreResult<Vec<LinkId>> {
        let mut result = self.inner.update_links(topo)?;

        // Retire last tick's loop link unless the inner selection now
        // carries it on its own.
        if let Some(previous) = self.last_added.lock().take() {
            if !result.contains(&previous) {
                let link = topo.pool().get(previous);
                let (a, b) = link.nodes();
                topo.node(a)
                    .protocol()
                    .link_protocol()
                    .disconnect_link(previous, topo)?;
                topo.node(b)
                    .protocol()
                    .link_protocol()
                    .disconnect_link(previous, topo)?;
            }
        }

        if !result.is_empty() && result.len() < self.neighbours.saturating_sub(1) {
            let established: HashSet<LinkId> = result.iter().copied().collect();
            let mut best: Option<(f64, LinkId)> = None;

            for id in self.inner.links() {
                if established.contains(&id) {
                    continue;
                }
                let link = topo.pool().get(id);
                if !link.reachable(topo) {
                    continue;
                }
                let (a, b) = link.nodes();
                if topo.established_count(a) >= self.neighbours
                    || topo.established_count(b) >= self.neighbours
                {
                    continue;
                }
                let distance = link.distance(topo);
                if best.map_or(true, |(current, _)| distance < current) {
                    best = Some((distance, id));
                }
            }

            if let Some((_, id)) = best {
                let link = topo.pool().get(id);
                link.set_established(true);
                let (a, b) = link.nodes();
                topo.node(a)
                    .protocol()
                    .link_protocol()
                    .connect_link(id, topo)?;
                topo.node(b)
                    .protocol()
                    .link_protocol()
                    .connect_link(id, topo)?;
                *self.last_added.lock() = Some(id);
                result.push(id);
            }
        }

        Ok(result)
    }

    fn links(&self) -> Vec<LinkId> {
        self.inner.links()
    }

    fn established(&self) -> Vec<LinkId> {
        self.inner.established()
    }
}

#[derive(Default)]
struct SmartLoopState {
    node: Option<NodeId>,
    position: Vector,
    cache: Vec<LinkId>,
}

/// Smart-loop augmentation: every satellite left with exactly one link by the
/// inner protocol gets one extra link, as long as both endpoints stay below
/// the neighbor target.
///
/// Instances on different satellites share the inner protocol and derive the
/// same additions from its result, so the augmentation is symmetric without
/// any cross-instance signalling.
pub struct AddSmartLoopProtocol {
    inner: Arc<dyn LinkProtocol>,
    neighbours: usize,
    state: Mutex<SmartLoopState>,
    ready: ReadyLatch,
}

impl AddSmartLoopProtocol {
    pub fn new(inner: Arc<dyn LinkProtocol>, neighbours: usize) -> Self {
        Self {
            inner,
            neighbours,
            state: Mutex::new(SmartLoopState::default()),
            ready: ReadyLatch::new(true),
        }
    }
}

impl LinkProtocol for AddSmartLoopProtocol {
    fn mount(&self, node: NodeId) -> CoreResult<()> {
        {
            let mut state = self.state.lock();
            if state.node.is_some() {
                return Err(CoreError::AlreadyMounted);
            }
            state.node = Some(node);
        }
        self.inner.mount(node)
    }

    fn add_link(&self, link: LinkId, topo: &Topology) {
        self.inner.add_link(link, topo);
    }

    fn connect_link(&self, link: LinkId, topo: &Topology) -> CoreResult<()> {
        self.inner.connect_link(link, topo)
    }

    fn disconnect_link(&self, link: LinkId, topo: &Topology) -> CoreResult<()> {
        self.inner.disconnect_link(link, topo)
    }

    fn update_links(&self, topo: &Topology) -> CoreResult<Vec<LinkId>> {
        {
            let mut state = self.state.lock();
            let node = state.node.ok_or(CoreError::NotMounted)?;
            let current = topo.node(node).position();
            if state.position == current {
                drop(state);
                self.ready.wait();
                return Ok(self.state.lock().cache.clone());
            }
            state.position = current;
            self.ready.reset();
        }

        let base = match self.inner.update_links(topo) {
            Ok(links) => links,
            Err(e) => {
                self.ready.set();
                return Err(e);
            }
        };

        let mut counts: HashMap<NodeId, usize> = HashMap::new();
        for &id in &base {
            let (a, b) = topo.pool().get(id).nodes();
            *counts.entry(a).or_insert(0) += 1;
            *counts.entry(b).or_insert(0) += 1;
        }

        let mut eligible: Vec<NodeId> = counts
            .iter()
            .filter_map(|(&sat, &count)| (count == 1).then_some(sat))
            .collect();
        eligible.sort_unstable();

        let candidates = self.inner.links();
        let mut in_result: HashSet<LinkId> = base.iter().copied().collect();
        let mut result = base;

        for sat in eligible {
            // An earlier addition may already have raised this satellite's
            // degree.
            if counts.get(&sat).copied().unwrap_or(0) != 1 {
                continue;
            }
            for &id in &candidates {
                if in_result.contains(&id) {
                    continue;
                }
                let link = topo.pool().get(id);
                if !link.involves(sat) || !link.reachable(topo) {
                    continue;
                }
                let other = link.other(sat)?;
                if counts.get(&sat).copied().unwrap_or(0) >= self.neighbours
                    || counts.get(&other).copied().unwrap_or(0) >= self.neighbours
                {
                    continue;
                }
                *counts.entry(sat).or_insert(0) += 1;
                *counts.entry(other).or_insert(0) += 1;
                link.set_established(true);
                in_result.insert(id);
                result.push(id);
                break;
            }
        }

        let mut state = self.state.lock();
        state.cache = result.clone();
        drop(state);
        self.ready.set();
        Ok(result)
    }

    fn links(&self) -> Vec<LinkId> {
        self.inner.links()
    }

    fn established(&self) -> Vec<LinkId> {
        self.inner.established()
    }
}
