//! Node assembly from configuration: protocol chains, routers, computing.

use chrono::{DateTime, Utc};

use constellation_core::computing::{Computing, ComputingType};
use constellation_core::config::{ComputingConfig, GroundLinkConfig, RouterConfig};
use constellation_core::links::{GroundProtocolBuilder, IslProtocolBuilder, NodeId};
use constellation_core::routing::{AStarRouter, DijkstraRouter, Router};
use constellation_core::Node;
use orbital_mechanics::KeplerianElements;

use crate::config::Config;
use crate::loader::RawGroundStation;
use crate::{Result, RuntimeError};

/// Picks the computing profile for a node from the configured table.
pub struct ComputingBuilder {
    configs: Vec<ComputingConfig>,
}

impl ComputingBuilder {
    pub fn new(configs: Vec<ComputingConfig>) -> Self {
        Self { configs }
    }

    /// Profile for a specific type; falls back to the first configured
    /// profile, then to an empty descriptor.
    pub fn build(&self, kind: ComputingType) -> Computing {
        let config = self
            .configs
            .iter()
            .find(|c| c.kind == kind)
            .or_else(|| self.configs.first());
        match config {
            Some(c) => Computing::new(c.cores as f64, c.memory as f64, c.kind),
            None => Computing::new(0.0, 0.0, ComputingType::None),
        }
    }

    pub fn build_default(&self) -> Computing {
        match self.configs.first() {
            Some(c) => Computing::new(c.cores as f64, c.memory as f64, c.kind),
            None => Computing::new(0.0, 0.0, ComputingType::None),
        }
    }
}

/// Assembles nodes the way the configuration prescribes. One factory serves
/// a whole run; the shared ISL protocol instances live inside its protocol
/// builder.
pub struct NodeFactory {
    start_time: DateTime<Utc>,
    isl: IslProtocolBuilder,
    ground: GroundLinkConfig,
    router: RouterConfig,
    computing: ComputingBuilder,
}

impl NodeFactory {
    pub fn new(config: &Config) -> Self {
        Self {
            start_time: config.simulation.simulation_start_time,
            isl: IslProtocolBuilder::new(config.isl.clone()),
            ground: config.ground.clone(),
            router: config.router.clone(),
            computing: ComputingBuilder::new(config.computing.clone()),
        }
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn build_router(&self, protocol: &str) -> Result<Box<dyn Router>> {
        match protocol.to_ascii_lowercase().as_str() {
            "dijkstra" => Ok(Box::new(DijkstraRouter::new())),
            "a-star" => Ok(Box::new(AStarRouter::new())),
            other => Err(RuntimeError::ConfigInvalid(format!(
                "unknown routing protocol: {other}"
            ))),
        }
    }

    pub fn satellite(&self, name: &str, elements: KeplerianElements) -> Result<Node> {
        Ok(Node::satellite(
            name,
            elements,
            self.isl.build(),
            self.build_router(&self.router.protocol)?,
            self.computing.build_default(),
        ))
    }

    pub fn ground_station(&self, raw: &RawGroundStation, satellites: Vec<NodeId>) -> Result<Node> {
        let ground_config = if raw.protocol.is_empty() {
            self.ground.clone()
        } else {
            GroundLinkConfig {
                protocol: raw.protocol.clone(),
            }
        };
        let protocol = GroundProtocolBuilder::new(ground_config)
            .build(satellites)
            .map_err(|e| RuntimeError::ConfigInvalid(e.to_string()))?;

        let router_name = if raw.router.is_empty() {
            self.router.protocol.clone()
        } else {
            raw.router.clone()
        };
        let computing_type = if raw.computing_type.is_empty() {
            ComputingType::None
        } else {
            raw.computing_type
                .parse()
                .map_err(RuntimeError::ConfigInvalid)?
        };

        Ok(Node::ground_station(
            raw.name.clone(),
            raw.lat,
            raw.lon,
            self.start_time,
            protocol,
            self.build_router(&router_name)?,
            self.computing.build(computing_type),
        ))
    }

    pub fn computing(&self) -> &ComputingBuilder {
        &self.computing
    }

    pub fn router_protocol(&self) -> &str {
        &self.router.protocol
    }
}
