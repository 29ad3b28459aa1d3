//! API models

use serde::{Deserialize, Serialize};

/// OData collection envelope (`{"d": [...]}`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ODataResponse<T> {
    pub d: Vec<T>,
}

/// Actor returned by the whoami endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhoAmIResponse {
    pub id: u64,
    pub actor_type: String,
}

/// Device type slug, expanded from `is_of__device_type`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceTypeRef {
    pub slug: String,
}

/// Device record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub uuid: String,
    #[serde(default)]
    pub os_version: Option<String>,
    #[serde(default)]
    pub is_online: bool,
    #[serde(default, rename = "is_of__device_type")]
    pub device_type: Vec<DeviceTypeRef>,
}

/// Host OS release record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseRecord {
    pub raw_version: String,
    #[serde(default)]
    pub is_final: Option<bool>,
}

/// Device action status, as reported by the actions endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionStatusResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub fatal: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Host OS update parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HupParameters {
    pub target_version: String,
}

/// Start host OS update request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartHupRequest {
    pub parameters: HupParameters,
}
