//! Computing resources attached to a node and the services deployed on them.

use std::fmt;
use std::str::FromStr;

use parking_lot::Mutex;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ComputingType {
    #[default]
    None,
    Edge,
    Cloud,
    Any,
}

impl FromStr for ComputingType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(ComputingType::None),
            "edge" => Ok(ComputingType::Edge),
            "cloud" => Ok(ComputingType::Cloud),
            "any" => Ok(ComputingType::Any),
            other => Err(format!("unknown computing type: {other}")),
        }
    }
}

impl fmt::Display for ComputingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComputingType::None => "None",
            ComputingType::Edge => "Edge",
            ComputingType::Cloud => "Cloud",
            ComputingType::Any => "Any",
        };
        f.write_str(s)
    }
}

impl Serialize for ComputingType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ComputingType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// A service that can be placed on a computing unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployableService {
    pub name: String,
    pub cpu: f64,
    pub memory: f64,
}

#[derive(Debug, Default)]
struct Usage {
    cpu: f64,
    memory: f64,
    services: Vec<DeployableService>,
}

/// Computing descriptor of a node.
#[derive(Debug)]
pub struct Computing {
    cores: f64,
    memory: f64,
    kind: ComputingType,
    usage: Mutex<Usage>,
}

impl Computing {
    pub fn new(cores: f64, memory: f64, kind: ComputingType) -> Self {
        Self {
            cores,
            memory,
            kind,
            usage: Mutex::new(Usage::default()),
        }
    }

    pub fn kind(&self) -> ComputingType {
        self.kind
    }

    pub fn cpu_available(&self) -> f64 {
        self.cores - self.usage.lock().cpu
    }

    pub fn memory_available(&self) -> f64 {
        self.memory - self.usage.lock().memory
    }

    pub fn hosts_service(&self, name: &str) -> bool {
        self.usage.lock().services.iter().any(|s| s.name == name)
    }

    pub fn services(&self) -> Vec<DeployableService> {
        self.usage.lock().services.clone()
    }

    /// Places the service if capacity allows and no service with the same
    /// name is hosted yet; returns whether it was placed.
    pub fn try_place(&self, service: DeployableService) -> bool {
        let mut usage = self.usage.lock();
        if service.cpu > self.cores - usage.cpu
            || service.memory > self.memory - usage.memory
            || usage.services.iter().any(|s| s.name == service.name)
        {
            return false;
        }
        usage.cpu += service.cpu;
        usage.memory += service.memory;
        usage.services.push(service);
        true
    }

    /// Removes a deployed service by name; returns whether it was present.
    pub fn remove_service(&self, name: &str) -> bool {
        let mut usage = self.usage.lock();
        match usage.services.iter().position(|s| s.name == name) {
            Some(ix) => {
                let svc = usage.services.remove(ix);
                usage.cpu -= svc.cpu;
                usage.memory -= svc.memory;
                true
            }
            None => false,
        }
    }
}
