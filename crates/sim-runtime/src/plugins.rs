//! Post-step plugins and the name-keyed registry resolved at startup.

use std::collections::HashMap;
use std::path::Path;

use tracing::info;

use crate::driver::SimulationController;
use crate::{Result, RuntimeError};

/// Behavior plugin, run sequentially after every step. Errors are logged by
/// the driver and swallowed.
pub trait SimulationPlugin: Send + Sync {
    fn name(&self) -> &str;
    fn post_step(&self, sim: &dyn SimulationController) -> Result<()>;
}

/// State-capture plugin, consulted by the state recorder.
pub trait StatePlugin: Send + Sync {
    fn name(&self) -> &str;
    fn add_state(&self, sim: &dyn SimulationController);
    fn save(&self, base_path: &Path);
}

pub type PluginFactory = fn() -> Box<dyn SimulationPlugin>;

/// Name-keyed plugin registry. Plugins are resolved once at startup; an
/// unknown name is a configuration error.
pub struct PluginRegistry {
    factories: HashMap<String, PluginFactory>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("dummy", || Box::new(DummyPlugin));
        registry
    }

    pub fn register(&mut self, name: &str, factory: PluginFactory) {
        self.factories.insert(name.to_owned(), factory);
    }

    pub fn build(&self, names: &[String]) -> Result<Vec<Box<dyn SimulationPlugin>>> {
        let mut plugins = Vec::new();
        for name in names {
            if name.is_empty() {
                continue;
            }
            let factory = self
                .factories
                .get(name)
                .ok_or_else(|| RuntimeError::UnknownPlugin(name.clone()))?;
            plugins.push(factory());
        }
        Ok(plugins)
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Reference plugin: logs the constellation summary after each step.
pub struct DummyPlugin;

impl SimulationPlugin for DummyPlugin {
    fn name(&self) -> &str {
        "dummy"
    }

    fn post_step(&self, sim: &dyn SimulationController) -> Result<()> {
        info!(
            time = %sim.sim_time(),
            nodes = sim.all_nodes().len(),
            satellites = sim.satellites().len(),
            ground_stations = sim.ground_stations().len(),
            "post step"
        );
        Ok(())
    }
}
