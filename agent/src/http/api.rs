//! Backend capabilities the update core depends on

use async_trait::async_trait;
use secrecy::SecretString;

use crate::errors::AgentError;
use crate::http::client::HttpClient;
use crate::models::device::{DeviceIdentity, OsUpdateStatus, Session, SupportedOsVersions};

/// Device management API trait for testability
#[async_trait]
pub trait DeviceApi: Send + Sync {
    /// Establish a session for subsequent calls
    async fn authenticate(&self, api_key: &SecretString) -> Result<Session, AgentError>;

    /// Read the device's type, OS version and reachability
    async fn get_device(&self, uuid: &str) -> Result<DeviceIdentity, AgentError>;

    /// Host OS versions `device_type` can move to from `current_version`
    async fn get_supported_os_update_versions(
        &self,
        device_type: &str,
        current_version: &str,
    ) -> Result<SupportedOsVersions, AgentError>;

    /// Current host OS update status of the device
    async fn get_os_update_status(&self, uuid: &str) -> Result<OsUpdateStatus, AgentError>;

    /// Ask the backend to start a host OS update
    async fn start_os_update(&self, uuid: &str, target_version: &str) -> Result<(), AgentError>;
}

#[async_trait]
impl DeviceApi for HttpClient {
    async fn authenticate(&self, api_key: &SecretString) -> Result<Session, AgentError> {
        self.login_with_token(api_key).await
    }

    async fn get_device(&self, uuid: &str) -> Result<DeviceIdentity, AgentError> {
        self.fetch_device(uuid).await
    }

    async fn get_supported_os_update_versions(
        &self,
        device_type: &str,
        current_version: &str,
    ) -> Result<SupportedOsVersions, AgentError> {
        self.fetch_supported_os_update_versions(device_type, current_version)
            .await
    }

    async fn get_os_update_status(&self, uuid: &str) -> Result<OsUpdateStatus, AgentError> {
        self.fetch_os_update_status(uuid).await
    }

    async fn start_os_update(&self, uuid: &str, target_version: &str) -> Result<(), AgentError> {
        self.request_os_update(uuid, target_version).await
    }
}
