//! The link-protocol trait and the composition of the configured variants.

use std::sync::{Arc, OnceLock};

use tracing::warn;

use crate::config::{GroundLinkConfig, InterSatelliteLinkConfig};
use crate::links::{
    AddLoopProtocol, AddSmartLoopProtocol, GlobalMstProtocol, GroundNearestProtocol,
    LinkFilterProtocol, LinkId, NearestProtocol, NodeId, PrimMstProtocol, PstProtocol,
};
use crate::topology::Topology;
use crate::{CoreError, CoreResult};

/// Per-node view over the shared link pool.
///
/// `update_links` refreshes the selection for the current tick and returns
/// the links now in use by the mounted node; `connect_link` and
/// `disconnect_link` are the peer-facing half of that handshake. A protocol
/// must not hold its own lock while calling into a peer's protocol.
pub trait LinkProtocol: Send + Sync {
    /// Binds the protocol to a node. Shared protocol instances keep the
    /// first mount and ignore the rest; per-node instances reject a second
    /// mount.
    fn mount(&self, node: NodeId) -> CoreResult<()>;

    /// Registers a candidate link.
    fn add_link(&self, link: LinkId, topo: &Topology);

    /// A peer (or the ground layer) routes this link through us.
    fn connect_link(&self, link: LinkId, topo: &Topology) -> CoreResult<()>;

    /// A peer withdraws a previously connected link.
    fn disconnect_link(&self, link: LinkId, topo: &Topology) -> CoreResult<()>;

    /// Recomputes the selection for the current positions.
    fn update_links(&self, topo: &Topology) -> CoreResult<Vec<LinkId>>;

    /// All candidate links known to this instance.
    fn links(&self) -> Vec<LinkId>;

    /// The subset currently in use.
    fn established(&self) -> Vec<LinkId>;
}

/// Builds the ISL protocol chain selected by configuration.
///
/// The spanning-tree bases (`mst`, `pst`, `other_mst`) are one shared
/// instance per constellation; every satellite receives its own filter and
/// decorator wrappers around that instance.
pub struct IslProtocolBuilder {
    config: InterSatelliteLinkConfig,
    mst: OnceLock<Arc<GlobalMstProtocol>>,
    pst: OnceLock<Arc<PstProtocol>>,
    prim: OnceLock<Arc<PrimMstProtocol>>,
}

impl IslProtocolBuilder {
    pub fn new(config: InterSatelliteLinkConfig) -> Self {
        Self {
            config,
            mst: OnceLock::new(),
            pst: OnceLock::new(),
            prim: OnceLock::new(),
        }
    }

    fn mst(&self) -> Arc<dyn LinkProtocol> {
        let shared = self.mst.get_or_init(|| Arc::new(GlobalMstProtocol::new()));
        Arc::clone(shared) as Arc<dyn LinkProtocol>
    }

    fn pst(&self) -> Arc<dyn LinkProtocol> {
        let shared = self.pst.get_or_init(|| Arc::new(PstProtocol::new()));
        Arc::clone(shared) as Arc<dyn LinkProtocol>
    }

    fn prim(&self) -> Arc<dyn LinkProtocol> {
        let shared = self.prim.get_or_init(|| Arc::new(PrimMstProtocol::new()));
        Arc::clone(shared) as Arc<dyn LinkProtocol>
    }

    /// One protocol chain for one satellite.
    pub fn build(&self) -> Box<dyn LinkProtocol> {
        let neighbours = self.config.neighbours;
        match self.config.protocol.as_str() {
            "nearest" => Box::new(NearestProtocol::new(neighbours)),
            "mst" => Box::new(LinkFilterProtocol::new(self.mst())),
            "pst" => Box::new(LinkFilterProtocol::new(self.pst())),
            "other_mst" => Box::new(LinkFilterProtocol::new(self.prim())),
            "mst_loop" => Box::new(AddLoopProtocol::new(
                Arc::new(LinkFilterProtocol::new(self.mst())),
                neighbours,
            )),
            "pst_loop" => Box::new(AddLoopProtocol::new(
                Arc::new(LinkFilterProtocol::new(self.pst())),
                neighbours,
            )),
            "other_mst_loop" => Box::new(AddLoopProtocol::new(
                Arc::new(LinkFilterProtocol::new(self.prim())),
                neighbours,
            )),
            "mst_smart_loop" => Box::new(LinkFilterProtocol::new(Arc::new(
                AddSmartLoopProtocol::new(self.mst(), neighbours),
            ))),
            "pst_smart_loop" => Box::new(LinkFilterProtocol::new(Arc::new(
                AddSmartLoopProtocol::new(self.pst(), neighbours),
            ))),
            "other_mst_smart_loop" => Box::new(LinkFilterProtocol::new(Arc::new(
                AddSmartLoopProtocol::new(self.prim(), neighbours),
            ))),
            other => {
                warn!(protocol = other, "unknown ISL protocol, falling back to nearest");
                Box::new(NearestProtocol::new(neighbours))
            }
        }
    }
}

/// Builds the ground-to-satellite protocol selected by configuration.
pub struct GroundProtocolBuilder {
    config: GroundLinkConfig,
}

impl GroundProtocolBuilder {
    pub fn new(config: GroundLinkConfig) -> Self {
        Self { config }
    }

    pub fn build(&self, satellites: Vec<NodeId>) -> CoreResult<GroundNearestProtocol> {
        match self.config.protocol.as_str() {
            "nearest" => Ok(GroundNearestProtocol::new(satellites)),
            other => Err(CoreError::UnknownGroundProtocol(other.to_owned())),
        }
    }
}
