//! BLE GATT Service Protocol Constants for HyperHDR Wi-Fi Provisioning
//!
//! All characteristics live under one service and share the
//! `-710e-4a5b-8d75-3e5b444bc3cf` suffix.

use uuid::Uuid;

/// BLE Service UUID: 00000001-710e-4a5b-8d75-3e5b444bc3cf
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x00000001_710e_4a5b_8d75_3e5b444bc3cf);

/// Wi-Fi scan list (read) and credentials (write)
pub const SCAN_UUID: Uuid = Uuid::from_u128(0x00000003_710e_4a5b_8d75_3e5b444bc3cf);

/// Status Characteristic UUID (notify)
pub const STATUS_UUID: Uuid = Uuid::from_u128(0x00000004_710e_4a5b_8d75_3e5b444bc3cf);

/// IP address of the device (read, diagnostic)
pub const IP_UUID: Uuid = Uuid::from_u128(0x00000005_710e_4a5b_8d75_3e5b444bc3cf);

/// MAC address of the device (read, diagnostic)
pub const MAC_UUID: Uuid = Uuid::from_u128(0x00000006_710e_4a5b_8d75_3e5b444bc3cf);

/// Wi-Fi action requests (write)
pub const ACTION_UUID: Uuid = Uuid::from_u128(0x00000008_710e_4a5b_8d75_3e5b444bc3cf);

/// Longest SSID an 802.11 network can advertise, in bytes.
pub const MAX_SSID_LEN: usize = 32;

/// Wire values carried in the `a` field of an action request
pub mod actions {
    /// Join a network (saved, open, or just provisioned)
    pub const ADD: &str = "add";

    /// Leave the currently connected network
    pub const SUB: &str = "sub";

    /// Forget a saved network
    pub const DEL: &str = "del";
}

/// Wire values carried in the `status` field of a status notification
pub mod status {
    pub const CONNECTING: &str = "connecting";
    pub const SUCCESS: &str = "success";
    pub const FAILED: &str = "failed";
    pub const FORGETTING: &str = "forgetting";
}

/// Values the client itself puts in the `error` field of a synthetic failure
pub mod errors {
    /// No terminal status arrived in time
    pub const TIMEOUT: &str = "timeout";

    /// The request write was rejected by the transport
    pub const WRITE_ERROR: &str = "write_error";

    /// The status subscription could not be opened or was lost
    pub const MONITOR: &str = "monitor";
}
