//! Configuration values handed to the core by the loading layer.

use serde::{Deserialize, Serialize};

use crate::computing::ComputingType;

/// Inter-satellite link protocol selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InterSatelliteLinkConfig {
    /// Target neighbor count per satellite.
    pub neighbours: usize,
    /// Strategy name: "nearest", "mst", "pst", "mst_loop", ...
    pub protocol: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GroundLinkConfig {
    pub protocol: String,
}

impl Default for GroundLinkConfig {
    fn default() -> Self {
        Self {
            protocol: "nearest".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RouterConfig {
    /// "dijkstra" or "a-star", case-insensitive.
    pub protocol: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ComputingConfig {
    pub cores: u32,
    pub memory: u64,
    #[serde(rename = "Type")]
    pub kind: ComputingType,
}
