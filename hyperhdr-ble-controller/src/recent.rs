//! Recently connected peripherals, persisted as `recent.json`

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{Error, PeripheralId};

const MAX_RECENT_DEVICES: usize = 5;

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RecentDevice {
    pub id: PeripheralId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub rssi: Option<i16>,
    /// Seconds since the Unix epoch
    pub last_connected: u64,
}

impl RecentDevice {
    pub fn new(id: PeripheralId, name: Option<String>, rssi: Option<i16>) -> Self {
        Self { id, name, rssi, last_connected: now_secs() }
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

/// Newest-first list of at most five peripherals
pub struct RecentDevices {
    path: PathBuf,
}

impl RecentDevices {
    pub fn new(home: &Path) -> Self {
        Self { path: home.join("recent.json") }
    }

    pub fn list(&self) -> Result<Vec<RecentDevice>, Error> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let data = std::fs::read_to_string(&self.path)?;
        serde_json::from_str(&data).map_err(|source| Error::Storage {
            path: self.path.clone(),
            source,
        })
    }

    /// Put `device` at the front, replacing an older entry for the same id
    pub fn record(&self, device: RecentDevice) -> Result<Vec<RecentDevice>, Error> {
        let mut devices = self.list()?;
        devices.retain(|d| d.id != device.id);
        devices.insert(0, device);
        devices.truncate(MAX_RECENT_DEVICES);
        self.save(&devices)?;
        Ok(devices)
    }

    pub fn remove(&self, id: &PeripheralId) -> Result<Vec<RecentDevice>, Error> {
        let mut devices = self.list()?;
        devices.retain(|d| &d.id != id);
        self.save(&devices)?;
        Ok(devices)
    }

    fn save(&self, devices: &[RecentDevice]) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(devices).map_err(|source| Error::Storage {
            path: self.path.clone(),
            source,
        })?;
        std::fs::write(&self.path, data)?;
        Ok(())
    }
}
