//! The assembled constellation: nodes plus the shared link pool.

use std::collections::HashMap;
use std::sync::Arc;

use crate::links::{LinkId, LinkKind, LinkPool, NodeId};
use crate::node::Node;
use crate::{CoreError, CoreResult};

/// Nodes and the link pool they share. Protocols and routers receive a
/// `&Topology` to resolve ids into nodes and links.
#[derive(Default)]
pub struct Topology {
    nodes: Vec<Arc<Node>>,
    by_name: HashMap<String, NodeId>,
    pool: LinkPool,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a node and mounts its protocol and router to the new id.
    pub fn push_node(&mut self, node: Node) -> CoreResult<NodeId> {
        if self.by_name.contains_key(node.name()) {
            return Err(CoreError::DuplicateNodeName(node.name().to_owned()));
        }
        let id = self.nodes.len();
        let node = Arc::new(node);
        node.mount(id)?;
        self.by_name.insert(node.name().to_owned(), id);
        self.nodes.push(node);
        Ok(id)
    }

    pub fn node(&self, id: NodeId) -> &Arc<Node> {
        &self.nodes[id]
    }

    pub fn nodes(&self) -> &[Arc<Node>] {
        &self.nodes
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    pub fn pool(&self) -> &LinkPool {
        &self.pool
    }

    /// Creates an ISL in the pool and registers it with both endpoint
    /// protocols.
    pub fn add_isl_link(&self, a: NodeId, b: NodeId) -> LinkId {
        let link = self.pool.add(LinkKind::Isl, a, b);
        let id = link.id();
        self.node(a).protocol().link_protocol().add_link(id, self);
        self.node(b).protocol().link_protocol().add_link(id, self);
        id
    }

    /// The links currently in use by a node's protocol.
    pub fn established_links(&self, node: NodeId) -> Vec<LinkId> {
        self.node(node).protocol().link_protocol().established()
    }

    pub fn established_count(&self, node: NodeId) -> usize {
        self.established_links(node).len()
    }
}
