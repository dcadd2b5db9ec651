//! Driver configuration, loaded from TOML with environment overrides.
//!
//! ```toml
//! discovery_port = 35903
//! startup_ports = [6969]
//!
//! [defaults]
//! anchor_device_id = 0
//! offset_local_to_device = [0.0, -0.73, 0.0]
//! predict_position = true
//! ```

use crate::discovery::DISCOVERY_PORT;
use crate::types::TrackerSettings;
use crate::Result;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub enable_discovery: bool,
    pub discovery_port: u16,
    /// Sessions created when the driver starts.
    pub startup_ports: Vec<u16>,
    /// Settings every new session starts with.
    pub defaults: TrackerSettings,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            enable_discovery: true,
            discovery_port: DISCOVERY_PORT,
            startup_ports: Vec::new(),
            defaults: TrackerSettings::default(),
        }
    }
}

impl DriverConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Read `path`, falling back to defaults if it does not exist.
    /// Environment overrides are applied either way.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            log::info!("Loaded config from {}", path.display());
            Self::from_toml_str(&contents)?
        } else {
            log::info!("No config at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    /// Apply `OWO_DISCOVERY_PORT` and `OWO_DISABLE_DISCOVERY`.
    pub fn apply_env(&mut self) {
        self.discovery_port = read_env_u16("OWO_DISCOVERY_PORT", self.discovery_port);
        if read_env_bool("OWO_DISABLE_DISCOVERY", false) {
            self.enable_discovery = false;
        }
    }

    /// Port for the discovery responder, if enabled.
    pub fn discovery(&self) -> Option<u16> {
        self.enable_discovery.then_some(self.discovery_port)
    }
}

fn read_env_bool(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .and_then(|v| parse_bool(&v))
        .unwrap_or(default)
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn read_env_u16(name: &str, default: u16) -> u16 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u16>().ok())
        .unwrap_or(default)
}
