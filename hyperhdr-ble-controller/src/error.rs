use std::path::PathBuf;
use std::time::Duration;

use uuid::Uuid;

use crate::PeripheralId;

/// Failure reported by a [`GattTransport`](crate::GattTransport)
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("bluetooth: {0}")]
    Btle(#[from] btleplug::Error),
    #[error("no bluetooth adapter found")]
    NoAdapter,
    #[error("peripheral {0} not found")]
    PeripheralNotFound(PeripheralId),
    #[error("peripheral {0} is not connected")]
    NotConnected(PeripheralId),
    #[error("characteristic {characteristic} not found in service {service}")]
    CharacteristicNotFound { service: Uuid, characteristic: Uuid },
    #[error("{0}")]
    Other(String),
}

/// Everything the controller can fail with
///
/// Transport failures ("device unreachable") and decode failures ("device
/// sent garbage") are separate variants so callers can tell them apart.
/// Device-reported failures and action timeouts are not errors; they resolve
/// as a failed [`StatusEvent`](hyperhdr_proto::StatusEvent).
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("timed out connecting to {peripheral} after {timeout:?}")]
    ConnectTimeout { peripheral: PeripheralId, timeout: Duration },
    #[error("failed to connect to {peripheral}: {source}")]
    Connect {
        peripheral: PeripheralId,
        #[source]
        source: TransportError,
    },
    #[error("service discovery on {peripheral} failed: {source}")]
    Discovery {
        peripheral: PeripheralId,
        #[source]
        source: TransportError,
    },
    #[error("{peripheral} does not expose the HyperHDR provisioning service")]
    ServiceNotFound { peripheral: PeripheralId },
    #[error("characteristic {0} not found")]
    CharacteristicNotFound(Uuid),
    #[error("no session for {0}; connect first")]
    NotConnected(PeripheralId),
    #[error("read of {characteristic} failed: {source}")]
    Read {
        characteristic: Uuid,
        #[source]
        source: TransportError,
    },
    #[error("write to {characteristic} failed: {source}")]
    Write {
        characteristic: Uuid,
        #[source]
        source: TransportError,
    },
    #[error("subscribing to {characteristic} failed: {source}")]
    Subscribe {
        characteristic: Uuid,
        #[source]
        source: TransportError,
    },
    #[error("disconnecting {peripheral} failed: {source}")]
    Disconnect {
        peripheral: PeripheralId,
        #[source]
        source: TransportError,
    },
    #[error("scan list could not be decoded: {0}")]
    ScanDecode(#[source] hyperhdr_proto::DecodeError),
    #[error("status notification could not be decoded: {0}")]
    StatusDecode(#[source] hyperhdr_proto::DecodeError),
    #[error("{characteristic} value could not be decoded: {source}")]
    Decode {
        characteristic: Uuid,
        #[source]
        source: hyperhdr_proto::DecodeError,
    },
    #[error("status notifications stopped")]
    NotificationsClosed,
    #[error(transparent)]
    InvalidInput(#[from] hyperhdr_proto::InputError),
    #[error("config: {0}")]
    Config(String),
    #[error("{}: {source}", .path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
