//! Constellation and ground-station catalog loading.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use constellation_core::links::NodeId;
use constellation_core::Node;
use orbital_mechanics::tle;

use crate::factory::NodeFactory;
use crate::{Result, RuntimeError};

/// Parses one satellite source format into nodes.
pub trait SatelliteSourceLoader: Send + Sync {
    fn load(&self, reader: Box<dyn Read>, factory: &NodeFactory) -> Result<Vec<Node>>;
}

/// TLE text sources.
pub struct TleLoader;

impl SatelliteSourceLoader for TleLoader {
    fn load(&self, reader: Box<dyn Read>, factory: &NodeFactory) -> Result<Vec<Node>> {
        let records = tle::parse_tle(BufReader::new(reader))?;
        let mut nodes = Vec::with_capacity(records.len());
        for record in records {
            nodes.push(factory.satellite(&record.name, record.elements)?);
        }
        info!(count = nodes.len(), "parsed satellites from TLE");
        Ok(nodes)
    }
}

/// Walker Delta shell descriptions, as a JSON document.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WalkerShellSpec {
    #[serde(default = "default_shell_name")]
    name: String,
    total_satellites: u32,
    planes: u32,
    phasing: u32,
    altitude_km: f64,
    inclination_deg: f64,
}

fn default_shell_name() -> String {
    "SHELL".to_owned()
}

/// Generates a constellation from a Walker Delta description instead of
/// reading per-satellite elements.
pub struct WalkerLoader;

impl SatelliteSourceLoader for WalkerLoader {
    fn load(&self, reader: Box<dyn Read>, factory: &NodeFactory) -> Result<Vec<Node>> {
        let spec: WalkerShellSpec = serde_json::from_reader(reader)
            .map_err(|e| RuntimeError::ConfigInvalid(format!("walker shell: {e}")))?;
        if spec.planes == 0 || spec.total_satellites % spec.planes != 0 {
            return Err(RuntimeError::ConfigInvalid(format!(
                "walker shell: {} satellites do not divide into {} planes",
                spec.total_satellites, spec.planes
            )));
        }

        let shell = orbital_mechanics::walker::WalkerDelta {
            total_satellites: spec.total_satellites,
            planes: spec.planes,
            phasing: spec.phasing,
            altitude_m: spec.altitude_km * 1_000.0,
            inclination_deg: spec.inclination_deg,
        };
        let mut nodes = Vec::with_capacity(spec.total_satellites as usize);
        for (name, elements) in shell.generate_elements(&spec.name, factory.start_time()) {
            nodes.push(factory.satellite(&name, elements)?);
        }
        info!(count = nodes.len(), shell = spec.name, "generated walker constellation");
        Ok(nodes)
    }
}

/// Registry of satellite source loaders, keyed by source type.
pub struct ConstellationLoader {
    loaders: HashMap<String, Box<dyn SatelliteSourceLoader>>,
}

impl ConstellationLoader {
    pub fn new() -> Self {
        Self {
            loaders: HashMap::new(),
        }
    }

    /// Registry with the built-in formats ("tle" and "walker").
    pub fn with_builtin_loaders() -> Self {
        let mut loader = Self::new();
        loader.register("tle", Box::new(TleLoader));
        loader.register("walker", Box::new(WalkerLoader));
        loader
    }

    pub fn register(&mut self, source_type: &str, loader: Box<dyn SatelliteSourceLoader>) {
        self.loaders.insert(source_type.to_owned(), loader);
    }

    pub fn load(&self, source: &str, source_type: &str, factory: &NodeFactory) -> Result<Vec<Node>> {
        info!(source, source_type, "loading satellite constellation");
        let loader = self
            .loaders
            .get(source_type)
            .ok_or_else(|| RuntimeError::UnsupportedSourceType(source_type.to_owned()))?;
        let reader = open_data_source(source)?;
        loader.load(reader, factory)
    }
}

impl Default for ConstellationLoader {
    fn default() -> Self {
        Self::with_builtin_loaders()
    }
}

/// Opens a local file or an `http(s)://` URL.
fn open_data_source(source: &str) -> Result<Box<dyn Read>> {
    if source.starts_with("http://") || source.starts_with("https://") {
        let response = reqwest::blocking::get(source)?.error_for_status()?;
        Ok(Box::new(response))
    } else {
        Ok(Box::new(File::open(source)?))
    }
}

/// One entry of the ground-station YAML catalog.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawGroundStation {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub router: String,
    #[serde(default)]
    pub computing_type: String,
}

/// Loads the YAML ground-station catalog and builds one node per entry.
pub fn load_ground_stations(
    path: impl AsRef<Path>,
    factory: &NodeFactory,
    satellites: &[NodeId],
) -> Result<Vec<Node>> {
    let file = File::open(path.as_ref())?;
    let raw: Vec<RawGroundStation> = serde_yaml::from_reader(file)?;
    let mut nodes = Vec::with_capacity(raw.len());
    for record in &raw {
        nodes.push(factory.ground_station(record, satellites.to_vec())?);
    }
    info!(count = nodes.len(), "loaded ground stations");
    Ok(nodes)
}
