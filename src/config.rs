use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Configuration for maintenance job scheduling.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Only run full updates while the device is idle
    pub require_device_idle: bool,
    /// Only run full updates while the battery is not low
    pub require_battery_not_low: bool,
    /// Keep job registrations across device reboots
    pub persisted: bool,
    /// Default interval between periodic full updates, in hours
    pub full_update_interval_hours: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            require_device_idle: true,
            require_battery_not_low: true,
            persisted: true,
            full_update_interval_hours: 24,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    pub fn full_update_interval(&self) -> Duration {
        Duration::from_secs(self.full_update_interval_hours * 3600)
    }
}
