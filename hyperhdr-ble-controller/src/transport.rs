//! The seam between the provisioning protocol and a BLE stack

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use uuid::Uuid;

use crate::TransportError;

/// Opaque address of one BLE peripheral, as handed out by the platform
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct PeripheralId(String);

impl PeripheralId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeripheralId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeripheralId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PeripheralId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Services of a peripheral and the characteristics each one holds
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceMap {
    services: BTreeMap<Uuid, BTreeSet<Uuid>>,
}

impl ServiceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, service: Uuid, characteristics: impl IntoIterator<Item = Uuid>) {
        self.services.entry(service).or_default().extend(characteristics);
    }

    pub fn has_service(&self, service: Uuid) -> bool {
        self.services.contains_key(&service)
    }

    pub fn has_characteristic(&self, service: Uuid, characteristic: Uuid) -> bool {
        self.services
            .get(&service)
            .is_some_and(|chars| chars.contains(&characteristic))
    }

    pub fn characteristics(&self, service: Uuid) -> impl Iterator<Item = Uuid> + '_ {
        self.services.get(&service).into_iter().flatten().copied()
    }

    pub fn services(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.services.keys().copied()
    }
}

/// Values notified on one characteristic, in the order the peripheral sent them
pub type NotificationStream = Pin<Box<dyn Stream<Item = Vec<u8>> + Send>>;

/// Connect, discover, read, write and subscribe primitives keyed by
/// `(peripheral, service, characteristic)`
///
/// [`BtleplugTransport`](crate::BtleplugTransport) talks to the platform
/// adapter; tests plug in an in-memory peripheral.
#[async_trait]
pub trait GattTransport: Send + Sync {
    async fn connect(&self, peripheral: &PeripheralId) -> Result<(), TransportError>;

    async fn is_connected(&self, peripheral: &PeripheralId) -> Result<bool, TransportError>;

    async fn discover(&self, peripheral: &PeripheralId) -> Result<ServiceMap, TransportError>;

    async fn read(
        &self,
        peripheral: &PeripheralId,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<Vec<u8>, TransportError>;

    /// Write with response; resolves once the peripheral acknowledged.
    async fn write(
        &self,
        peripheral: &PeripheralId,
        service: Uuid,
        characteristic: Uuid,
        value: &[u8],
    ) -> Result<(), TransportError>;

    /// Enable notifications. The returned stream is live when this resolves.
    async fn subscribe(
        &self,
        peripheral: &PeripheralId,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<NotificationStream, TransportError>;

    async fn unsubscribe(
        &self,
        peripheral: &PeripheralId,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<(), TransportError>;

    async fn disconnect(&self, peripheral: &PeripheralId) -> Result<(), TransportError>;
}
