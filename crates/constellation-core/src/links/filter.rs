//! Per-node projection over a shared protocol.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::links::{LinkId, LinkProtocol, NodeId};
use crate::topology::Topology;
use crate::{CoreError, CoreResult};

#[derive(Default)]
struct FilterState {
    node: Option<NodeId>,
    links: Vec<LinkId>,
    seen: HashSet<LinkId>,
    established: HashSet<LinkId>,
    /// Last tick's projection; links that leave it are disestablished.
    out: HashSet<LinkId>,
}

/// Projects a shared protocol's result onto the links involving the mounted
/// node, and tracks connections made directly against this node (ground
/// uplinks, loop links) alongside the projection.
pub struct LinkFilterProtocol {
    inner: Arc<dyn LinkProtocol>,
    state: Mutex<FilterState>,
}

impl LinkFilterProtocol {
    pub fn new(inner: Arc<dyn LinkProtocol>) -> Self {
        Self {
            inner,
            state: Mutex::new(FilterState::default()),
        }
    }
}

impl LinkProtocol for LinkFilterProtocol {
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
        {
            let mut state = self.state.lock();
            let involves = state
                .node
                .map(|n| topo.pool().get(link).involves(n))
                .unwrap_or(false);
            if involves && state.seen.insert(link) {
                state.links.push(link);
            }
        }
        self.inner.add_link(link, topo);
    }

    fn connect_link(&self, link: LinkId, topo: &Topology) -> CoreResult<()> {
        self.state.lock().established.insert(link);
        topo.pool().get(link).set_established(true);
        Ok(())
    }

    fn disconnect_link(&self, link: LinkId, topo: &Topology) -> CoreResult<()> {
        self.state.lock().established.remove(&link);
        topo.pool().get(link).set_established(false);
        Ok(())
    }

    fn update_links(&self, topo: &Topology) -> CoreResult<Vec<LinkId>> {
        {
            let state = self.state.lock();
            state.node.ok_or(CoreError::NotMounted)?;
        }

        let inner_result = self.inner.update_links(topo)?;

        let mut state = self.state.lock();
        let node = state.node.ok_or(CoreError::NotMounted)?;

        let mut filtered = Vec::new();
        let mut new_out = HashSet::new();
        for id in inner_result {
            if topo.pool().get(id).involves(node) {
                filtered.push(id);
                state.established.insert(id);
                new_out.insert(id);
            }
        }

        let old_out = std::mem::replace(&mut state.out, new_out);
        for id in old_out {
            if !state.out.contains(&id) {
                state.established.remove(&id);
                topo.pool().get(id).set_established(false);
            }
        }

        Ok(filtered)
    }

    fn links(&self) -> Vec<LinkId> {
        self.state.lock().links.clone()
    }

    fn established(&self) -> Vec<LinkId> {
        self.state.lock().established.iter().copied().collect()
    }
}
