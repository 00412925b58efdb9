//! In-memory HyperHDR peripheral implementing `GattTransport`.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::mpsc;
use hyperhdr_ble_controller::{
    BleController, ControllerConfig, GattSession, GattTransport, NotificationStream, PeripheralId,
    ServiceMap, TransportError,
};
use hyperhdr_proto::ble::{ACTION_UUID, IP_UUID, MAC_UUID, SCAN_UUID, SERVICE_UUID, STATUS_UUID};
use uuid::Uuid;

pub const DEVICE: &str = "AA:BB:CC:DD:EE:FF";

#[derive(Default)]
pub struct MockState {
    pub services: ServiceMap,
    pub values: HashMap<Uuid, Vec<u8>>,
    pub connected: HashSet<PeripheralId>,
    pub connect_calls: usize,
    pub subscribe_calls: usize,
    pub disconnect_calls: usize,
    pub writes: Vec<(Uuid, Vec<u8>)>,
    pub connect_delay: Option<Duration>,
    pub reject_connect: bool,
    pub fail_writes: bool,
    pub fail_subscribe: bool,
    /// Status notifications sent after a write to the key characteristic.
    /// Zero delays are delivered before the write is acknowledged.
    pub scripts: HashMap<Uuid, Vec<(Duration, Vec<u8>)>>,
    subscribers: Vec<(Uuid, mpsc::UnboundedSender<Vec<u8>>)>,
}

impl MockState {
    fn notify(&mut self, characteristic: Uuid, value: &[u8]) {
        self.subscribers.retain(|(_, tx)| !tx.is_closed());
        for (uuid, tx) in &self.subscribers {
            if *uuid == characteristic {
                let _ = tx.unbounded_send(value.to_vec());
            }
        }
    }
}

#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// A peripheral exposing the full provisioning service
    pub fn hyperhdr() -> Self {
        let mock = Self::default();
        mock.state().services.insert(
            SERVICE_UUID,
            [SCAN_UUID, STATUS_UUID, IP_UUID, MAC_UUID, ACTION_UUID],
        );
        mock
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn set_value(&self, characteristic: Uuid, value: &str) {
        self.state().values.insert(characteristic, value.as_bytes().to_vec());
    }

    pub fn notify(&self, value: &str) {
        self.state().notify(STATUS_UUID, value.as_bytes());
    }

    /// Reply to every write on `characteristic` with `script`
    pub fn respond(&self, characteristic: Uuid, script: &[(u64, &str)]) {
        let script = script
            .iter()
            .map(|(ms, v)| (Duration::from_millis(*ms), v.as_bytes().to_vec()))
            .collect();
        self.state().scripts.insert(characteristic, script);
    }

    pub fn writes(&self) -> Vec<(Uuid, Vec<u8>)> {
        self.state().writes.clone()
    }

    pub fn written_json(&self, index: usize) -> (Uuid, serde_json::Value) {
        let (uuid, bytes) = self.writes()[index].clone();
        (uuid, serde_json::from_slice(&bytes).unwrap())
    }

    /// The link drops without the client asking
    pub fn drop_link(&self) {
        let mut state = self.state();
        state.connected.clear();
        state.subscribers.clear();
    }

    pub fn controller(&self) -> BleController {
        BleController::new(Arc::new(self.clone()), ControllerConfig::default())
    }

    pub async fn session(&self) -> (BleController, Arc<GattSession>) {
        let controller = self.controller();
        let session = controller.connect(&PeripheralId::from(DEVICE)).await.unwrap();
        (controller, session)
    }
}

#[async_trait]
impl GattTransport for MockTransport {
    async fn connect(&self, peripheral: &PeripheralId) -> Result<(), TransportError> {
        let delay = self.state().connect_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state();
        if state.reject_connect {
            return Err(TransportError::Other("connection rejected".to_string()));
        }
        state.connect_calls += 1;
        state.connected.insert(peripheral.clone());
        Ok(())
    }

    async fn is_connected(&self, peripheral: &PeripheralId) -> Result<bool, TransportError> {
        Ok(self.state().connected.contains(peripheral))
    }

    async fn discover(&self, peripheral: &PeripheralId) -> Result<ServiceMap, TransportError> {
        let state = self.state();
        if !state.connected.contains(peripheral) {
            return Err(TransportError::NotConnected(peripheral.clone()));
        }
        Ok(state.services.clone())
    }

    async fn read(
        &self,
        peripheral: &PeripheralId,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<Vec<u8>, TransportError> {
        let state = self.state();
        if !state.connected.contains(peripheral) {
            return Err(TransportError::NotConnected(peripheral.clone()));
        }
        if !state.services.has_characteristic(service, characteristic) {
            return Err(TransportError::CharacteristicNotFound { service, characteristic });
        }
        Ok(state.values.get(&characteristic).cloned().unwrap_or_default())
    }

    async fn write(
        &self,
        peripheral: &PeripheralId,
        _service: Uuid,
        characteristic: Uuid,
        value: &[u8],
    ) -> Result<(), TransportError> {
        let mut state = self.state();
        if state.fail_writes || !state.connected.contains(peripheral) {
            return Err(TransportError::Other("link lost during write".to_string()));
        }
        state.writes.push((characteristic, value.to_vec()));

        let script = state.scripts.get(&characteristic).cloned().unwrap_or_default();
        let (immediate, delayed): (Vec<_>, Vec<_>) =
            script.into_iter().partition(|(delay, _)| delay.is_zero());
        for (_, value) in immediate {
            state.notify(STATUS_UUID, &value);
        }
        drop(state);

        if !delayed.is_empty() {
            let shared = self.state.clone();
            tokio::spawn(async move {
                let mut elapsed = Duration::ZERO;
                for (at, value) in delayed {
                    tokio::time::sleep(at - elapsed).await;
                    elapsed = at;
                    shared.lock().unwrap().notify(STATUS_UUID, &value);
                }
            });
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        _peripheral: &PeripheralId,
        _service: Uuid,
        characteristic: Uuid,
    ) -> Result<NotificationStream, TransportError> {
        let mut state = self.state();
        if state.fail_subscribe {
            return Err(TransportError::Other("CCCD write rejected".to_string()));
        }
        state.subscribe_calls += 1;
        let (tx, rx) = mpsc::unbounded();
        state.subscribers.push((characteristic, tx));
        Ok(Box::pin(rx))
    }

    async fn unsubscribe(
        &self,
        _peripheral: &PeripheralId,
        _service: Uuid,
        characteristic: Uuid,
    ) -> Result<(), TransportError> {
        self.state().subscribers.retain(|(uuid, _)| *uuid != characteristic);
        Ok(())
    }

    async fn disconnect(&self, peripheral: &PeripheralId) -> Result<(), TransportError> {
        let mut state = self.state();
        state.disconnect_calls += 1;
        state.connected.remove(peripheral);
        state.subscribers.clear();
        Ok(())
    }
}
