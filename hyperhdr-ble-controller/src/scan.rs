//! Wi-Fi scan list reader

use hyperhdr_proto::ble::{SCAN_UUID, SERVICE_UUID};
use hyperhdr_proto::{WifiNetwork, parse_scan_list};
use log::{debug, info};

use crate::{Error, GattSession};

/// Read the networks the device can currently see.
///
/// Each call is a fresh snapshot in the device's order. The read is capped
/// by the MTU, so the last record of a truncated list is dropped.
pub async fn scan(session: &GattSession) -> Result<Vec<WifiNetwork>, Error> {
    let services = session.discover_services_and_characteristics().await?;
    if !services.has_characteristic(SERVICE_UUID, SCAN_UUID) {
        return Err(Error::CharacteristicNotFound(SCAN_UUID));
    }

    let raw = session.read(SCAN_UUID).await?;
    debug!("{}: scan list is {} bytes", session.peripheral(), raw.len());

    let networks = parse_scan_list(&raw).map_err(Error::ScanDecode)?;
    info!("{}: {} networks visible", session.peripheral(), networks.len());
    Ok(networks)
}
