//! GATT session lifecycle: one session per connected peripheral

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::StreamExt;
use hyperhdr_proto::ble::{SERVICE_UUID, STATUS_UUID};
use log::{debug, info, warn};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::transport::{GattTransport, NotificationStream, PeripheralId, ServiceMap};
use crate::{ControllerConfig, Error};

/// Status notifications buffered per subscriber before it starts lagging
const STATUS_BACKLOG: usize = 32;

type SharedSender = Arc<Mutex<Option<broadcast::Sender<Vec<u8>>>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Forwards the transport's status stream to every attached receiver.
/// Dropping the sender closes all receivers.
struct StatusPump {
    sender: SharedSender,
    task: JoinHandle<()>,
}

impl StatusPump {
    fn receiver(&self) -> Option<broadcast::Receiver<Vec<u8>>> {
        lock(&self.sender).as_ref().map(broadcast::Sender::subscribe)
    }

    fn receiver_count(&self) -> usize {
        lock(&self.sender)
            .as_ref()
            .map_or(0, broadcast::Sender::receiver_count)
    }

    fn stop(self) {
        lock(&self.sender).take();
        self.task.abort();
    }
}

async fn pump_status(peripheral: PeripheralId, mut stream: NotificationStream, sender: SharedSender) {
    while let Some(value) = stream.next().await {
        if !forward(&sender, value) {
            break;
        }
    }
    debug!("status notifications from {peripheral} ended");
    lock(&sender).take();
}

fn forward(sender: &SharedSender, value: Vec<u8>) -> bool {
    match lock(sender).as_ref() {
        Some(sender) => {
            // no receivers attached is fine, the value is just dropped
            let _ = sender.send(value);
            true
        }
        None => false,
    }
}

/// A connected peripheral
///
/// Created by [`BleController::connect`] and owned by whoever holds the
/// `Arc`. Every protocol operation takes a session by reference.
pub struct GattSession {
    peripheral: PeripheralId,
    transport: Arc<dyn GattTransport>,
    config: ControllerConfig,
    closed: AtomicBool,
    status: Mutex<Option<StatusPump>>,
    // serializes enabling notifications so concurrent callers share one subscription
    status_setup: tokio::sync::Mutex<()>,
}

impl GattSession {
    fn new(peripheral: PeripheralId, transport: Arc<dyn GattTransport>, config: ControllerConfig) -> Self {
        Self {
            peripheral,
            transport,
            config,
            closed: AtomicBool::new(false),
            status: Mutex::new(None),
            status_setup: tokio::sync::Mutex::new(()),
        }
    }

    pub fn peripheral(&self) -> &PeripheralId {
        &self.peripheral
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<(), Error> {
        if self.is_closed() {
            return Err(Error::NotConnected(self.peripheral.clone()));
        }
        Ok(())
    }

    /// Enumerate the GATT tree; fails unless the provisioning service is present.
    pub async fn discover_services_and_characteristics(&self) -> Result<ServiceMap, Error> {
        self.ensure_open()?;
        let services = self
            .transport
            .discover(&self.peripheral)
            .await
            .map_err(|source| Error::Discovery {
                peripheral: self.peripheral.clone(),
                source,
            })?;

        if !services.has_service(SERVICE_UUID) {
            return Err(Error::ServiceNotFound {
                peripheral: self.peripheral.clone(),
            });
        }
        debug!(
            "{}: provisioning service has {} characteristics",
            self.peripheral,
            services.characteristics(SERVICE_UUID).count()
        );
        Ok(services)
    }

    /// Read a characteristic of the provisioning service
    pub async fn read(&self, characteristic: Uuid) -> Result<Vec<u8>, Error> {
        self.ensure_open()?;
        self.transport
            .read(&self.peripheral, SERVICE_UUID, characteristic)
            .await
            .map_err(|source| Error::Read { characteristic, source })
    }

    /// Write with response to a characteristic of the provisioning service
    pub async fn write(&self, characteristic: Uuid, value: &[u8]) -> Result<(), Error> {
        self.ensure_open()?;
        self.transport
            .write(&self.peripheral, SERVICE_UUID, characteristic, value)
            .await
            .map_err(|source| Error::Write { characteristic, source })
    }

    /// Attach a receiver to the status characteristic.
    ///
    /// Notifications are enabled on the peripheral before this returns, so a
    /// write issued afterwards cannot race its own status update.
    pub(crate) async fn status_receiver(&self) -> Result<broadcast::Receiver<Vec<u8>>, Error> {
        let _setup = self.status_setup.lock().await;
        self.ensure_open()?;

        if let Some(receiver) = lock(&self.status).as_ref().and_then(StatusPump::receiver) {
            return Ok(receiver);
        }

        let stream = self
            .transport
            .subscribe(&self.peripheral, SERVICE_UUID, STATUS_UUID)
            .await
            .map_err(|source| Error::Subscribe {
                characteristic: STATUS_UUID,
                source,
            })?;
        debug!("{}: status notifications enabled", self.peripheral);

        let (sender, receiver) = broadcast::channel(STATUS_BACKLOG);
        let sender: SharedSender = Arc::new(Mutex::new(Some(sender)));
        let task = tokio::spawn(pump_status(self.peripheral.clone(), stream, sender.clone()));
        if let Some(old) = lock(&self.status).replace(StatusPump { sender, task }) {
            old.stop();
        }
        Ok(receiver)
    }

    /// Receivers currently attached to the status characteristic
    pub fn status_subscribers(&self) -> usize {
        lock(&self.status).as_ref().map_or(0, StatusPump::receiver_count)
    }

    /// Stop the status pump and mark the session closed. Attached receivers
    /// see the channel close.
    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let pump = lock(&self.status).take();
        if let Some(pump) = pump {
            pump.stop();
            if let Err(e) = self
                .transport
                .unsubscribe(&self.peripheral, SERVICE_UUID, STATUS_UUID)
                .await
            {
                debug!("{}: unsubscribe on close failed: {e}", self.peripheral);
            }
        }
    }
}

impl Drop for GattSession {
    fn drop(&mut self) {
        if let Some(pump) = lock(&self.status).take() {
            pump.stop();
        }
    }
}

/// Opens and tracks GATT sessions
///
/// At most one session exists per peripheral; connecting again while the
/// link is up hands back the existing session.
pub struct BleController {
    transport: Arc<dyn GattTransport>,
    config: ControllerConfig,
    // never held across a transport call
    sessions: Mutex<HashMap<PeripheralId, Arc<GattSession>>>,
    // serializes connects to the same peripheral only
    connecting: Mutex<HashMap<PeripheralId, Arc<tokio::sync::Mutex<()>>>>,
}

impl BleController {
    pub fn new(transport: Arc<dyn GattTransport>, config: ControllerConfig) -> Self {
        Self {
            transport,
            config,
            sessions: Mutex::new(HashMap::new()),
            connecting: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Connect using the configured timeout
    pub async fn connect(&self, peripheral: &PeripheralId) -> Result<Arc<GattSession>, Error> {
        self.connect_with_timeout(peripheral, self.config.connect_timeout())
            .await
    }

    pub async fn connect_with_timeout(
        &self,
        peripheral: &PeripheralId,
        timeout: Duration,
    ) -> Result<Arc<GattSession>, Error> {
        let gate = lock(&self.connecting)
            .entry(peripheral.clone())
            .or_default()
            .clone();
        let _connecting = gate.lock().await;

        let existing = lock(&self.sessions).get(peripheral).cloned();
        if let Some(session) = existing {
            match self.transport.is_connected(peripheral).await {
                Ok(true) => {
                    debug!("{peripheral}: already connected, reusing session");
                    return Ok(session);
                }
                Ok(false) => debug!("{peripheral}: link dropped, reconnecting"),
                Err(e) => debug!("{peripheral}: connection state unknown ({e}), reconnecting"),
            }
            self.forget(peripheral, &session);
            session.close().await;
        }

        match tokio::time::timeout(timeout, self.transport.connect(peripheral)).await {
            Ok(Ok(())) => {}
            Ok(Err(source)) => {
                return Err(Error::Connect {
                    peripheral: peripheral.clone(),
                    source,
                });
            }
            Err(_) => {
                // drop whatever half-open link the platform may still hold
                if let Err(e) = self.transport.disconnect(peripheral).await {
                    debug!("{peripheral}: cleanup after connect timeout failed: {e}");
                }
                return Err(Error::ConnectTimeout {
                    peripheral: peripheral.clone(),
                    timeout,
                });
            }
        }
        info!("connected to {peripheral}");

        let session = Arc::new(GattSession::new(
            peripheral.clone(),
            self.transport.clone(),
            self.config.clone(),
        ));
        lock(&self.sessions).insert(peripheral.clone(), session.clone());
        Ok(session)
    }

    /// Remove `session` from the registry unless it was already replaced
    fn forget(&self, peripheral: &PeripheralId, session: &Arc<GattSession>) {
        let mut sessions = lock(&self.sessions);
        if sessions.get(peripheral).is_some_and(|s| Arc::ptr_eq(s, session)) {
            sessions.remove(peripheral);
        }
    }

    /// The live session for `peripheral`, if any
    pub async fn session(&self, peripheral: &PeripheralId) -> Option<Arc<GattSession>> {
        lock(&self.sessions).get(peripheral).cloned()
    }

    /// Tear the session down. A no-op for peripherals with no session.
    pub async fn disconnect(&self, peripheral: &PeripheralId) -> Result<(), Error> {
        let removed = lock(&self.sessions).remove(peripheral);
        let Some(session) = removed else {
            debug!("{peripheral}: disconnect with no session, nothing to do");
            return Ok(());
        };

        session.close().await;
        self.transport
            .disconnect(peripheral)
            .await
            .map_err(|source| Error::Disconnect {
                peripheral: peripheral.clone(),
                source,
            })?;
        info!("disconnected from {peripheral}");
        Ok(())
    }

    /// Disconnect every session, logging failures
    pub async fn disconnect_all(&self) {
        let peripherals: Vec<PeripheralId> = lock(&self.sessions).keys().cloned().collect();
        for peripheral in peripherals {
            if let Err(e) = self.disconnect(&peripheral).await {
                warn!("{e}");
            }
        }
    }
}
