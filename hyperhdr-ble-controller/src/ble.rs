//! btleplug transport for HyperHDR devices
//!
//! Finds peripherals on the host adapter and implements [`GattTransport`]
//! on top of them.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use hyperhdr_proto::ble::SERVICE_UUID;
use log::{debug, info, warn};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::transport::{GattTransport, NotificationStream, PeripheralId, ServiceMap};
use crate::TransportError;

/// A peripheral seen during a device scan
#[derive(Debug, Clone)]
pub struct HyperhdrDevice {
    pub name: String,
    pub id: PeripheralId,
    pub address: String,
    pub rssi: Option<i16>,
    /// Advertises the provisioning service
    pub is_hyperhdr: bool,
}

/// Something that can stop an adapter scan
#[async_trait]
trait ScanControl: Send + Sync + 'static {
    async fn stop(&self) -> Result<(), TransportError>;
}

#[async_trait]
impl ScanControl for Adapter {
    async fn stop(&self) -> Result<(), TransportError> {
        self.stop_scan().await?;
        Ok(())
    }
}

/// Stops a running scan. If the owning future is dropped first (a connect
/// timeout, an error returned with `?`), the stop is spawned on the runtime.
struct ScanGuard<S: ScanControl> {
    scanner: Option<S>,
}

impl<S: ScanControl> ScanGuard<S> {
    fn new(scanner: S) -> Self {
        Self { scanner: Some(scanner) }
    }

    async fn stop(mut self) -> Result<(), TransportError> {
        match self.scanner.take() {
            Some(scanner) => scanner.stop().await,
            None => Ok(()),
        }
    }
}

impl<S: ScanControl> Drop for ScanGuard<S> {
    fn drop(&mut self) {
        let Some(scanner) = self.scanner.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = scanner.stop().await {
                        warn!("stopping abandoned scan failed: {e}");
                    }
                });
            }
            Err(_) => warn!("scan left running: no runtime to stop it on"),
        }
    }
}

/// [`GattTransport`] over the platform Bluetooth adapter
pub struct BtleplugTransport {
    adapter: Adapter,
    /// How long to scan for a peripheral that the adapter has not seen yet
    lookup_timeout: Duration,
    peripherals: Mutex<HashMap<PeripheralId, Peripheral>>,
}

impl BtleplugTransport {
    /// Open the `adapter_index`-th Bluetooth adapter
    pub async fn new(adapter_index: usize, lookup_timeout: Duration) -> Result<Self, TransportError> {
        let manager = Manager::new().await?;
        let adapters = manager.adapters().await?;
        let adapter = adapters
            .into_iter()
            .nth(adapter_index)
            .ok_or(TransportError::NoAdapter)?;
        debug!("using adapter {}", adapter.adapter_info().await?);

        Ok(Self {
            adapter,
            lookup_timeout,
            peripherals: Mutex::new(HashMap::new()),
        })
    }

    /// Scan for BLE devices
    ///
    /// Returns everything that advertised during `duration`. HyperHDR
    /// devices have `is_hyperhdr = true`.
    pub async fn discover_devices(&self, duration: Duration) -> Result<Vec<HyperhdrDevice>, TransportError> {
        self.adapter.start_scan(ScanFilter::default()).await?;
        let scan = ScanGuard::new(self.adapter.clone());
        tokio::time::sleep(duration).await;

        let peripherals = self.adapter.peripherals().await?;
        let mut devices = Vec::new();
        let mut known = self.peripherals.lock().await;

        for peripheral in peripherals {
            if let Some(props) = peripheral.properties().await? {
                let name = props.local_name.unwrap_or_else(|| "Unknown".to_string());
                let id = PeripheralId::new(peripheral.id().to_string());
                let is_hyperhdr = props.services.contains(&SERVICE_UUID) || name.contains("HyperHDR");

                devices.push(HyperhdrDevice {
                    name,
                    id: id.clone(),
                    address: peripheral.address().to_string(),
                    rssi: props.rssi,
                    is_hyperhdr,
                });
                known.insert(id, peripheral);
            }
        }

        drop(known);
        scan.stop().await?;
        info!("device scan found {} peripherals", devices.len());
        Ok(devices)
    }

    async fn cached(&self, id: &PeripheralId) -> Option<Peripheral> {
        self.peripherals.lock().await.get(id).cloned()
    }

    /// Find a peripheral by platform id or address, scanning if the adapter
    /// has not seen it yet
    async fn peripheral(&self, id: &PeripheralId) -> Result<Peripheral, TransportError> {
        if let Some(peripheral) = self.cached(id).await {
            return Ok(peripheral);
        }
        if let Some(peripheral) = self.find_known(id).await? {
            return Ok(peripheral);
        }

        debug!("{id} not known to the adapter, scanning");
        self.adapter.start_scan(ScanFilter::default()).await?;
        let scan = ScanGuard::new(self.adapter.clone());
        let deadline = tokio::time::Instant::now() + self.lookup_timeout;
        let found = loop {
            if let Some(peripheral) = self.find_known(id).await? {
                break Some(peripheral);
            }
            if tokio::time::Instant::now() >= deadline {
                break None;
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        };
        scan.stop().await?;

        found.ok_or_else(|| TransportError::PeripheralNotFound(id.clone()))
    }

    async fn find_known(&self, id: &PeripheralId) -> Result<Option<Peripheral>, TransportError> {
        for peripheral in self.adapter.peripherals().await? {
            let matches = peripheral.id().to_string() == id.as_str()
                || peripheral.address().to_string().eq_ignore_ascii_case(id.as_str());
            if matches {
                self.peripherals.lock().await.insert(id.clone(), peripheral.clone());
                return Ok(Some(peripheral));
            }
        }
        Ok(None)
    }

    fn characteristic(
        peripheral: &Peripheral,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<Characteristic, TransportError> {
        peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == characteristic && c.service_uuid == service)
            .ok_or(TransportError::CharacteristicNotFound { service, characteristic })
    }

    async fn connected(&self, id: &PeripheralId) -> Result<Peripheral, TransportError> {
        if let Some(peripheral) = self.cached(id).await {
            if peripheral.is_connected().await? {
                return Ok(peripheral);
            }
        }
        Err(TransportError::NotConnected(id.clone()))
    }
}

#[async_trait]
impl GattTransport for BtleplugTransport {
    async fn connect(&self, id: &PeripheralId) -> Result<(), TransportError> {
        let peripheral = self.peripheral(id).await?;
        if !peripheral.is_connected().await? {
            peripheral.connect().await?;
        }
        Ok(())
    }

    async fn is_connected(&self, id: &PeripheralId) -> Result<bool, TransportError> {
        match self.cached(id).await {
            Some(peripheral) => Ok(peripheral.is_connected().await?),
            None => Ok(false),
        }
    }

    async fn discover(&self, id: &PeripheralId) -> Result<ServiceMap, TransportError> {
        let peripheral = self.connected(id).await?;
        peripheral.discover_services().await?;

        let mut services = ServiceMap::new();
        for service in peripheral.services() {
            services.insert(service.uuid, service.characteristics.iter().map(|c| c.uuid));
        }
        Ok(services)
    }

    async fn read(&self, id: &PeripheralId, service: Uuid, characteristic: Uuid) -> Result<Vec<u8>, TransportError> {
        let peripheral = self.connected(id).await?;
        let characteristic = Self::characteristic(&peripheral, service, characteristic)?;
        Ok(peripheral.read(&characteristic).await?)
    }

    async fn write(
        &self,
        id: &PeripheralId,
        service: Uuid,
        characteristic: Uuid,
        value: &[u8],
    ) -> Result<(), TransportError> {
        let peripheral = self.connected(id).await?;
        let characteristic = Self::characteristic(&peripheral, service, characteristic)?;
        peripheral.write(&characteristic, value, WriteType::WithResponse).await?;
        Ok(())
    }

    async fn subscribe(
        &self,
        id: &PeripheralId,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<NotificationStream, TransportError> {
        let peripheral = self.connected(id).await?;
        let characteristic = Self::characteristic(&peripheral, service, characteristic)?;

        // open the stream first so nothing sent right after enabling is lost
        let notifications = peripheral.notifications().await?;
        peripheral.subscribe(&characteristic).await?;

        let uuid = characteristic.uuid;
        Ok(Box::pin(notifications.filter_map(move |notification| {
            futures::future::ready((notification.uuid == uuid).then_some(notification.value))
        })))
    }

    async fn unsubscribe(&self, id: &PeripheralId, service: Uuid, characteristic: Uuid) -> Result<(), TransportError> {
        let peripheral = self.connected(id).await?;
        let characteristic = Self::characteristic(&peripheral, service, characteristic)?;
        peripheral.unsubscribe(&characteristic).await?;
        Ok(())
    }

    async fn disconnect(&self, id: &PeripheralId) -> Result<(), TransportError> {
        if let Some(peripheral) = self.cached(id).await {
            if peripheral.is_connected().await? {
                peripheral.disconnect().await?;
            }
        }
        Ok(())
    }
}
