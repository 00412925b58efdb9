//! Long-lived status listener
//!
//! Unlike the action correlator, which stops at the first terminal status,
//! a listener reports every notification, progress states included.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use hyperhdr_proto::{StatusEvent, parse_status};
use log::{debug, warn};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::{Error, GattSession};

/// Handle to a running listener; dropping it cancels the listener.
#[must_use = "the listener stops when the subscription is dropped"]
pub struct StatusSubscription {
    active: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl StatusSubscription {
    /// Detach the handlers. The work happens in `Drop`.
    ///
    /// Once this returns no further notification is handed to a callback.
    /// On a multi-threaded runtime a callback already running on another
    /// worker may still finish after this returns.
    pub fn cancel(self) {}

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire) && !self.task.is_finished()
    }
}

impl Drop for StatusSubscription {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
        self.task.abort();
    }
}

/// Call `on_event` for every decoded status notification until the
/// subscription is cancelled.
///
/// A notification that fails to decode goes to `on_error` and the listener
/// keeps running. If the session goes away, `on_error` gets
/// [`Error::NotificationsClosed`] once and the listener ends.
pub async fn subscribe_status<E, F>(
    session: &GattSession,
    mut on_event: E,
    mut on_error: F,
) -> Result<StatusSubscription, Error>
where
    E: FnMut(StatusEvent) + Send + 'static,
    F: FnMut(Error) + Send + 'static,
{
    let mut receiver = session.status_receiver().await?;
    let active = Arc::new(AtomicBool::new(true));
    let peripheral = session.peripheral().clone();

    let task = tokio::spawn({
        let active = active.clone();
        async move {
            loop {
                let value = match receiver.recv().await {
                    Ok(value) => value,
                    Err(RecvError::Lagged(missed)) => {
                        warn!("{peripheral}: listener missed {missed} status notifications");
                        continue;
                    }
                    Err(RecvError::Closed) => {
                        if active.load(Ordering::Acquire) {
                            on_error(Error::NotificationsClosed);
                        }
                        break;
                    }
                };

                if !active.load(Ordering::Acquire) {
                    break;
                }
                match parse_status(&value) {
                    Ok(event) => on_event(event),
                    Err(e) => on_error(Error::StatusDecode(e)),
                }
            }
            debug!("{peripheral}: status listener stopped");
        }
    });

    Ok(StatusSubscription { active, task })
}
