//! Credential writer

use hyperhdr_proto::ble::SCAN_UUID;
use hyperhdr_proto::{Credentials, StatusEvent};
use log::info;

use crate::action::correlate;
use crate::{Error, GattSession};

/// Hand Wi-Fi credentials to the device.
///
/// Resolves when the write is acknowledged. Whether the device manages to
/// join is reported later on the status characteristic; use [`provision`]
/// to wait for that.
pub async fn write_credentials(
    session: &GattSession,
    ssid: &str,
    password: &str,
) -> Result<(), Error> {
    let credentials = Credentials::new(ssid, password)?;
    session.write(SCAN_UUID, &credentials.to_bytes()).await?;
    info!("{}: credentials for {ssid:?} sent", session.peripheral());
    Ok(())
}

/// Write credentials and wait for the join result, bounded by the action
/// timeout. Resolves the same way an action request does.
pub async fn provision(
    session: &GattSession,
    ssid: &str,
    password: &str,
) -> Result<StatusEvent, Error> {
    let credentials = Credentials::new(ssid, password)?;
    info!("{}: provisioning {ssid:?}", session.peripheral());
    let timeout = session.config().action_timeout();
    Ok(correlate(session, SCAN_UUID, &credentials.to_bytes(), timeout).await)
}
