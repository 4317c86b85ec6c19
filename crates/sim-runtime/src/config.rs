//! Simulation configuration, loaded from JSON or YAML by file extension.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use constellation_core::config::{
    ComputingConfig, GroundLinkConfig, InterSatelliteLinkConfig, RouterConfig,
};

use crate::{Result, RuntimeError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SimulationConfig {
    /// Milliseconds between auto-run steps; negative means manual stepping.
    pub step_interval: i64,
    /// Simulated seconds advanced per step.
    pub step_multiplier: i64,
    /// Number of steps to run in manual mode; 0 leaves stepping to the
    /// embedding program.
    #[serde(default)]
    pub step_count: u64,
    pub satellite_data_source: String,
    pub satellite_data_source_type: String,
    #[serde(default)]
    pub ground_station_data_source: String,
    #[serde(default = "default_ground_source_type")]
    pub ground_station_data_source_type: String,
    pub use_pre_route_calc: bool,
    /// Worker pool size hint; 0 uses the default.
    #[serde(default)]
    pub max_cpu_cores: usize,
    pub simulation_start_time: DateTime<Utc>,
    #[serde(default)]
    pub plugins: Vec<String>,
}

fn default_ground_source_type() -> String {
    "yml".to_owned()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "SimulationConfiguration")]
    pub simulation: SimulationConfig,
    #[serde(rename = "InterSatelliteLinkConfig")]
    pub isl: InterSatelliteLinkConfig,
    #[serde(rename = "GroundLinkConfig", default)]
    pub ground: GroundLinkConfig,
    #[serde(rename = "RouterConfig")]
    pub router: RouterConfig,
    #[serde(rename = "ComputingConfiguration", default)]
    pub computing: Vec<ComputingConfig>,
}

/// Loads a config file, dispatching on the extension.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let data = std::fs::read_to_string(path)?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&data)
            .map_err(|e| RuntimeError::ConfigInvalid(format!("{}: {e}", path.display()))),
        Some("yml") | Some("yaml") => serde_yaml::from_str(&data)
            .map_err(|e| RuntimeError::ConfigInvalid(format!("{}: {e}", path.display()))),
        _ => Err(RuntimeError::ConfigInvalid(format!(
            "unsupported config extension: {}",
            path.display()
        ))),
    }
}
