//! Simulation runtime: configuration, constellation loading, the step
//! driver, plugins, and state capture/replay.

use thiserror::Error;

use constellation_core::CoreError;
use orbital_mechanics::OrbitalError;

pub mod config;
pub mod driver;
pub mod factory;
pub mod loader;
pub mod plugins;
pub mod replay;
pub mod state;

pub use config::{Config, SimulationConfig};
pub use driver::{Simulation, SimulationController};
pub use factory::{ComputingBuilder, NodeFactory};
pub use loader::ConstellationLoader;
pub use plugins::{PluginRegistry, SimulationPlugin, StatePlugin};
pub use state::StateRecorder;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),
    #[error("unsupported data source type: {0}")]
    UnsupportedSourceType(String),
    #[error("unknown plugin: {0}")]
    UnknownPlugin(String),
    #[error("unknown node: {0}")]
    UnknownNode(String),
    #[error("injection rejected: {0}")]
    Injection(String),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Orbital(#[from] OrbitalError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("http fetch failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("binary state encoding failed: {0}")]
    State(#[from] bincode::Error),
    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("yaml decoding failed: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
