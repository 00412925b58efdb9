//! Diagnostic reads: IP, MAC and last status

use hyperhdr_proto::ble::{IP_UUID, MAC_UUID, STATUS_UUID};
use hyperhdr_proto::{StatusEvent, decode, parse_status};
use uuid::Uuid;

use crate::{Error, GattSession};

/// The device's IP address, empty while it is not on a network
pub async fn read_ip(session: &GattSession) -> Result<String, Error> {
    read_text(session, IP_UUID).await
}

pub async fn read_mac(session: &GattSession) -> Result<String, Error> {
    read_text(session, MAC_UUID).await
}

/// Last status the device published, if any
pub async fn read_status(session: &GattSession) -> Result<Option<StatusEvent>, Error> {
    let raw = session.read(STATUS_UUID).await?;
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    parse_status(&raw).map(Some).map_err(Error::StatusDecode)
}

async fn read_text(session: &GattSession, characteristic: Uuid) -> Result<String, Error> {
    let raw = session.read(characteristic).await?;
    let text = decode(&raw).map_err(|source| Error::Decode { characteristic, source })?;
    Ok(text.trim().to_string())
}
