//! Action correlator
//!
//! A Wi-Fi action (connect/disconnect/forget) is acknowledged on the action
//! characteristic, but its outcome arrives later as a notification on the
//! status characteristic. The correlator ties the two together: it attaches
//! to the status channel, writes the request, and resolves on the first
//! terminal status or when the timeout expires, whichever comes first.

use std::time::Duration;

use hyperhdr_proto::ble::ACTION_UUID;
use hyperhdr_proto::{ActionRequest, StatusEvent, WifiAction, parse_status};
use log::{debug, info, warn};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;
use uuid::Uuid;

use crate::{Error, GattSession};

/// Where one request is in its lifecycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CorrelationState {
    #[default]
    Idle,
    AwaitingResult,
    /// Final: later notifications are ignored
    Resolved(StatusEvent),
}

/// Matching logic of one request, independent of any transport
#[derive(Debug, Default)]
pub struct Correlator {
    state: CorrelationState,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &CorrelationState {
        &self.state
    }

    pub fn outcome(&self) -> Option<&StatusEvent> {
        match &self.state {
            CorrelationState::Resolved(event) => Some(event),
            _ => None,
        }
    }

    /// The request is on its way; start matching notifications.
    pub fn begin(&mut self) {
        if self.state == CorrelationState::Idle {
            self.state = CorrelationState::AwaitingResult;
        }
    }

    /// Feed one raw status notification. Returns the outcome the first time
    /// a terminal status is seen and `None` for everything else, including
    /// every notification after resolution.
    pub fn on_notification(&mut self, payload: &[u8]) -> Option<StatusEvent> {
        if self.state != CorrelationState::AwaitingResult {
            return None;
        }
        match parse_status(payload) {
            Ok(event) if event.is_terminal() => Some(self.resolve(event)),
            Ok(event) => {
                debug!("progress: {}", event.status);
                None
            }
            Err(e) => {
                warn!("ignoring undecodable status notification: {e}");
                None
            }
        }
    }

    /// Resolve with a client-side failure (timeout, write error, lost
    /// subscription). If already resolved, the earlier outcome stands.
    pub fn fail(&mut self, event: StatusEvent) -> StatusEvent {
        self.resolve(event)
    }

    fn resolve(&mut self, event: StatusEvent) -> StatusEvent {
        if let CorrelationState::Resolved(existing) = &self.state {
            return existing.clone();
        }
        self.state = CorrelationState::Resolved(event.clone());
        event
    }
}

/// Request `action` for `ssid` and wait for its outcome, bounded by the
/// session's configured action timeout.
pub async fn perform_action(
    session: &GattSession,
    ssid: &str,
    action: WifiAction,
) -> Result<StatusEvent, Error> {
    let timeout = session.config().action_timeout();
    perform_action_with_timeout(session, ssid, action, timeout).await
}

/// Like [`perform_action`] with an explicit bound.
///
/// Invalid input is rejected before anything is sent. Every other outcome,
/// including a device-reported failure, a rejected write and a timeout,
/// resolves as `Ok` with a [`StatusEvent`].
pub async fn perform_action_with_timeout(
    session: &GattSession,
    ssid: &str,
    action: WifiAction,
    timeout: Duration,
) -> Result<StatusEvent, Error> {
    let request = ActionRequest::new(ssid, action)?;
    info!("{}: {action} {ssid:?}", session.peripheral());
    Ok(correlate(session, ACTION_UUID, &request.to_bytes(), timeout).await)
}

/// Attach to the status channel, write `payload` to `characteristic`, and
/// resolve on the first terminal status. The status receiver is dropped
/// before this returns, whatever the outcome.
pub(crate) async fn correlate(
    session: &GattSession,
    characteristic: Uuid,
    payload: &[u8],
    timeout: Duration,
) -> StatusEvent {
    let deadline = Instant::now() + timeout;
    let mut correlator = Correlator::new();

    let outcome = tokio::time::timeout_at(
        deadline,
        exchange(&mut correlator, session, characteristic, payload),
    )
    .await;

    let event = match outcome {
        Ok(event) => event,
        Err(_) => {
            warn!(
                "{}: no result within {timeout:?}",
                session.peripheral()
            );
            correlator.fail(StatusEvent::timeout())
        }
    };
    debug!("{}: resolved as {}", session.peripheral(), event.summary());
    event
}

async fn exchange(
    correlator: &mut Correlator,
    session: &GattSession,
    characteristic: Uuid,
    payload: &[u8],
) -> StatusEvent {
    let mut receiver = match session.status_receiver().await {
        Ok(receiver) => receiver,
        Err(e) => {
            warn!("{}: {e}", session.peripheral());
            return correlator.fail(StatusEvent::monitor_error());
        }
    };

    correlator.begin();
    if let Err(e) = session.write(characteristic, payload).await {
        warn!("{}: {e}", session.peripheral());
        return correlator.fail(StatusEvent::write_error());
    }
    debug!("{}: request written, waiting for status", session.peripheral());

    loop {
        match receiver.recv().await {
            Ok(value) => {
                if let Some(event) = correlator.on_notification(&value) {
                    return event;
                }
            }
            Err(RecvError::Lagged(missed)) => {
                warn!("{}: missed {missed} status notifications", session.peripheral());
            }
            Err(RecvError::Closed) => {
                warn!("{}: status notifications stopped before a result", session.peripheral());
                return correlator.fail(StatusEvent::monitor_error());
            }
        }
    }
}
