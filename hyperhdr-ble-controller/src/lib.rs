//! HyperHDR BLE Controller
//!
//! BLE client for putting HyperHDR devices on Wi-Fi: list the networks the
//! device sees, hand it credentials, and ask it to connect, disconnect or
//! forget a network while watching the status it reports back.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use hyperhdr_ble_controller::{BleController, BtleplugTransport, ControllerConfig, PeripheralId};
//! use hyperhdr_proto::WifiAction;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ControllerConfig::default();
//!     let transport = BtleplugTransport::new(0, config.device_scan_duration()).await?;
//!     let controller = BleController::new(Arc::new(transport), config);
//!
//!     let device = PeripheralId::from("AA:BB:CC:DD:EE:FF");
//!     let session = controller.connect(&device).await?;
//!
//!     for network in hyperhdr_ble_controller::scan(&session).await? {
//!         println!("{} ({}%)", network.ssid, network.signal_strength);
//!     }
//!
//!     hyperhdr_ble_controller::write_credentials(&session, "Home", "secret").await?;
//!     let result = hyperhdr_ble_controller::perform_action(&session, "Home", WifiAction::Connect).await?;
//!     println!("{}: {}", result.status, result.summary());
//!
//!     controller.disconnect(&device).await?;
//!     Ok(())
//! }
//! ```

pub mod action;
pub mod ble;
mod config;
pub mod credentials;
pub mod diagnostics;
mod error;
pub mod recent;
pub mod scan;
mod session;
pub mod status;
pub mod transport;

pub use action::{CorrelationState, Correlator, perform_action, perform_action_with_timeout};
pub use ble::{BtleplugTransport, HyperhdrDevice};
pub use config::{ControllerConfig, hyperhdr_home};
pub use credentials::{provision, write_credentials};
pub use diagnostics::{read_ip, read_mac, read_status};
pub use error::{Error, TransportError};
pub use recent::{RecentDevice, RecentDevices};
pub use scan::scan;
pub use session::{BleController, GattSession};
pub use status::{StatusSubscription, subscribe_status};
pub use transport::{GattTransport, NotificationStream, PeripheralId, ServiceMap};
