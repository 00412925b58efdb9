//! Controller configuration and home directory

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::Error;

/// Timeouts and adapter selection
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Bound on a single transport connect
    pub connect_timeout_secs: u64,
    /// Bound on waiting for a terminal status after an action or provision
    pub action_timeout_secs: u64,
    /// How long `devices` listens for advertisements
    pub device_scan_secs: u64,
    /// Which adapter to use when the host has several
    pub adapter_index: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            action_timeout_secs: 15,
            device_scan_secs: 5,
            adapter_index: 0,
        }
    }
}

impl ControllerConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn action_timeout(&self) -> Duration {
        Duration::from_secs(self.action_timeout_secs)
    }

    pub fn device_scan_duration(&self) -> Duration {
        Duration::from_secs(self.device_scan_secs)
    }

    /// Load `config.json` from `home`, writing the defaults there if absent
    pub fn load_or_create(home: &Path) -> Result<Self, Error> {
        let path = home.join("config.json");
        if path.exists() {
            let data = std::fs::read_to_string(&path)?;
            return serde_json::from_str(&data)
                .map_err(|e| Error::Config(format!("{}: {e}", path.display())));
        }

        let config = Self::default();
        std::fs::create_dir_all(home)?;
        let data = serde_json::to_string_pretty(&config)
            .map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(&path, data)?;
        log::debug!("wrote default config to {}", path.display());
        Ok(config)
    }
}

/// `$HYPERHDR_BLE_HOME`, else `~/.hyperhdr-ble`
pub fn hyperhdr_home() -> Result<PathBuf, Error> {
    if let Ok(home) = std::env::var("HYPERHDR_BLE_HOME") {
        return Ok(PathBuf::from(home));
    }
    dirs::home_dir()
        .map(|home| home.join(".hyperhdr-ble"))
        .ok_or_else(|| Error::Config("no home directory".to_string()))
}
