use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// Advisory scanner state; only gates UI actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeviceStatus {
    #[default]
    Checking,
    Connected,
    Disconnected,
    Error,
}

/// `GET /api/health` on the local bridge.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeHealth {
    pub device_connected: bool,
    pub message: Option<String>,
}

/// `GET /biometric-integrated/device/health` on the backend.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct BackendDeviceHealth {
    pub success: bool,
    pub connected: bool,
    pub message: Option<String>,
}
