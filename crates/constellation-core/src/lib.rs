//! Constellation topology core.
//!
//! One shared [`links::LinkPool`] owns every link as an `(a, b)` node-index
//! record; per-node link protocols and routers hold only ids into the pool
//! and resolve endpoints through a [`topology::Topology`] view. Nodes never
//! reference links directly, so the object graph is acyclic.

use thiserror::Error;

pub mod computing;
pub mod config;
pub mod latch;
pub mod links;
pub mod node;
pub mod routing;
#[cfg(test)]
pub(crate) mod testutil;
pub mod topology;

pub use links::{Link, LinkId, LinkKind, LinkPool, NodeId};
pub use node::Node;
pub use topology::Topology;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("protocol or router used before mount")]
    NotMounted,
    #[error("protocol or router mounted twice")]
    AlreadyMounted,
    #[error("node is not an endpoint of link {0}")]
    NotAnEndpoint(LinkId),
    #[error("no candidate satellite available")]
    NoCandidateSatellite,
    #[error("duplicate node name: {0}")]
    DuplicateNodeName(String),
    #[error("unknown ground link protocol: {0}")]
    UnknownGroundProtocol(String),
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
