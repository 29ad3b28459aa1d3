//! Device and host OS update models

use serde::{Deserialize, Serialize};

/// Device as seen by the backend at the time of the read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// Unique device identifier
    pub uuid: String,

    /// Hardware/device type slug (e.g. `raspberrypi4-64`)
    pub device_type: String,

    /// Current host OS version as reported by the backend
    pub os_version: String,

    /// Whether the device is currently reachable
    pub online: bool,
}

/// Authenticated backend session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub actor_id: u64,
    pub actor_type: String,
}

/// Host OS versions a device can update to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupportedOsVersions {
    /// The version the backend recommends, if any
    pub recommended: Option<String>,

    /// All eligible versions, newest first
    pub versions: Vec<String>,

    /// The version these were computed against
    pub current: String,
}

/// Update status exactly as the backend reports it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OsUpdateStatus {
    /// Raw status string (`in_progress`, `done`, `error`, ...)
    pub status: Option<String>,

    /// Whether the backend marked the failure as fatal
    pub fatal: bool,

    /// Backend error message, if any
    pub error: Option<String>,
}

impl OsUpdateStatus {
    /// Status of a device with no update action on record
    pub fn none() -> Self {
        Self::default()
    }
}
