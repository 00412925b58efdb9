//! HyperHDR BLE provisioning protocol - payload types and codec
//!
//! Every characteristic value on the provisioning service is UTF-8 text.
//! Reads of the scan list are capped by the negotiated MTU, so the JSON array
//! the device sends may be cut mid-object; see [`codec::repair_truncated_json_array`].

pub mod ble;
pub mod codec;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};

pub use codec::{decode, encode, parse_scan_list, parse_status, repair_truncated_json_array};

/// Failure to turn a characteristic value into a typed payload
#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("characteristic value is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("characteristic value is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Caller input rejected before anything is sent to the device
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("invalid action: {0} (expected connect/add, disconnect/sub or forget/del)")]
    InvalidAction(String),
    #[error("invalid SSID {0:?}: must be 1 to 32 bytes")]
    InvalidSsid(String),
}

/// Check an SSID before it is put on the wire
pub fn validate_ssid(ssid: &str) -> Result<(), InputError> {
    if ssid.is_empty() || ssid.len() > ble::MAX_SSID_LEN {
        return Err(InputError::InvalidSsid(ssid.to_string()));
    }
    Ok(())
}

/// One entry of the device's Wi-Fi scan list
///
/// Wire form: `{"s": "Home", "sr": 80, "lck": 1, "u": 0, "sav": 1}`.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct WifiNetwork {
    #[serde(rename = "s")]
    pub ssid: String,
    /// 0-100 as reported by the device
    #[serde(rename = "sr", default)]
    pub signal_strength: i32,
    #[serde(rename = "lck", default, deserialize_with = "flag")]
    pub locked: bool,
    #[serde(rename = "u", default, deserialize_with = "flag")]
    pub currently_connected: bool,
    #[serde(rename = "sav", default, deserialize_with = "flag")]
    pub saved: bool,
}

/// Signal bars shown for a network
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SignalLevel {
    None,
    Weak,
    Medium,
    Full,
}

impl WifiNetwork {
    pub fn signal_level(&self) -> SignalLevel {
        match self.signal_strength {
            s if s >= 75 => SignalLevel::Full,
            s if s >= 50 => SignalLevel::Medium,
            s if s >= 25 => SignalLevel::Weak,
            _ => SignalLevel::None,
        }
    }

    /// Joining needs credentials: the network is secured and the device
    /// has nothing stored for it.
    pub fn needs_password(&self) -> bool {
        self.locked && !self.saved
    }

    /// Actions that make sense for this network in its current state
    pub fn available_actions(&self) -> Vec<WifiAction> {
        let mut actions = Vec::with_capacity(2);
        if self.currently_connected {
            actions.push(WifiAction::Disconnect);
        } else {
            actions.push(WifiAction::Connect);
        }
        if self.saved {
            actions.push(WifiAction::Forget);
        }
        actions
    }
}

// The device sends booleans as 0/1; accept real booleans as well.
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(i) => i != 0,
    })
}

/// Action request written to the action characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WifiAction {
    /// Join a network; wire value `add`
    Connect,
    /// Leave the current network; wire value `sub`
    Disconnect,
    /// Forget a saved network; wire value `del`
    Forget,
}

impl WifiAction {
    pub fn wire_value(self) -> &'static str {
        match self {
            Self::Connect => ble::actions::ADD,
            Self::Disconnect => ble::actions::SUB,
            Self::Forget => ble::actions::DEL,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::Forget => "forget",
        }
    }
}

impl fmt::Display for WifiAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WifiAction {
    type Err = InputError;

    /// Accepts the user-facing name or the wire value.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "connect" | "add" => Ok(Self::Connect),
            "disconnect" | "sub" => Ok(Self::Disconnect),
            "forget" | "del" => Ok(Self::Forget),
            other => Err(InputError::InvalidAction(other.to_string())),
        }
    }
}

/// State carried in the `status` field of a status notification
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Status {
    Connecting,
    Success,
    Failed,
    Forgetting,
    /// Anything the device sends that this client does not know about
    Unknown(String),
}

impl Status {
    /// `success` and `failed` end an action request; everything else is progress.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Connecting => ble::status::CONNECTING,
            Self::Success => ble::status::SUCCESS,
            Self::Failed => ble::status::FAILED,
            Self::Forgetting => ble::status::FORGETTING,
            Self::Unknown(s) => s,
        }
    }
}

impl From<String> for Status {
    fn from(s: String) -> Self {
        match s.as_str() {
            ble::status::CONNECTING => Self::Connecting,
            ble::status::SUCCESS => Self::Success,
            ble::status::FAILED => Self::Failed,
            ble::status::FORGETTING => Self::Forgetting,
            _ => Self::Unknown(s),
        }
    }
}

impl From<Status> for String {
    fn from(s: Status) -> Self {
        match s {
            Status::Unknown(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded status notification
///
/// Wire form: `{"status": "success", "message": "joined"}`.
#[derive(serde::Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusEvent {
    pub fn new(status: Status) -> Self {
        Self { status, message: None, error: None }
    }

    /// A failure produced by the client rather than the device
    pub fn failed(error: impl Into<String>) -> Self {
        Self { status: Status::Failed, message: None, error: Some(error.into()) }
    }

    pub fn timeout() -> Self {
        Self::failed(ble::errors::TIMEOUT)
    }

    pub fn write_error() -> Self {
        Self::failed(ble::errors::WRITE_ERROR)
    }

    pub fn monitor_error() -> Self {
        Self::failed(ble::errors::MONITOR)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    pub fn is_timeout(&self) -> bool {
        self.status == Status::Failed && self.error.as_deref() == Some(ble::errors::TIMEOUT)
    }

    /// Text to show the user: the device message, else the error, else the status
    pub fn summary(&self) -> &str {
        self.message
            .as_deref()
            .or(self.error.as_deref())
            .unwrap_or_else(|| self.status.as_str())
    }
}

/// Wi-Fi credentials written to the scan characteristic
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    ssid: String,
    password: String,
}

impl Credentials {
    pub fn new(ssid: &str, password: &str) -> Result<Self, InputError> {
        validate_ssid(ssid)?;
        Ok(Self { ssid: ssid.to_string(), password: password.to_string() })
    }

    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    /// `{"s": <ssid>, "p": <password>}`
    pub fn to_bytes(&self) -> Vec<u8> {
        encode(&serde_json::json!({ "s": self.ssid, "p": self.password }).to_string())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("ssid", &self.ssid)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Request written to the action characteristic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRequest {
    pub ssid: String,
    pub action: WifiAction,
}

impl ActionRequest {
    pub fn new(ssid: &str, action: WifiAction) -> Result<Self, InputError> {
        validate_ssid(ssid)?;
        Ok(Self { ssid: ssid.to_string(), action })
    }

    /// `{"s": <ssid>, "a": "add" | "sub" | "del"}`
    pub fn to_bytes(&self) -> Vec<u8> {
        encode(&serde_json::json!({ "s": self.ssid, "a": self.action.wire_value() }).to_string())
    }
}
