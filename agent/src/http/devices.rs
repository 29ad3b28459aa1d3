//! Device API client

use openapi_client::models::{
    ActionStatusResponse, DeviceRecord, HupParameters, ODataResponse, StartHupRequest,
};
use tracing::info;

use crate::errors::AgentError;
use crate::http::client::HttpClient;
use crate::models::device::{DeviceIdentity, OsUpdateStatus};

impl HttpClient {
    /// Fetch the device record with its type slug expanded
    pub async fn fetch_device(&self, uuid: &str) -> Result<DeviceIdentity, AgentError> {
        let filter = format!("uuid eq '{}'", odata_escape(uuid));
        let url = self.api_url(
            "/v6/device",
            &[
                ("$select", "uuid,os_version,is_online"),
                ("$filter", filter.as_str()),
                ("$expand", "is_of__device_type($select=slug)"),
            ],
        )?;

        let response: ODataResponse<DeviceRecord> = self.get(url).await?;
        let record = response
            .d
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::ApiError(format!("Device not found: {}", uuid)))?;

        device_identity(record)
    }

    /// Fetch the status of the most recent host OS update action
    pub async fn fetch_os_update_status(&self, uuid: &str) -> Result<OsUpdateStatus, AgentError> {
        let url = action_url(self.actions_url(), &[uuid])?;
        let response: Option<ActionStatusResponse> = self.get_optional(url).await?;

        Ok(match response {
            Some(action) => OsUpdateStatus {
                status: action.status,
                fatal: action.fatal.unwrap_or(false),
                error: action.error,
            },
            None => OsUpdateStatus::none(),
        })
    }

    /// Request a host OS update to `target_version`
    pub async fn request_os_update(
        &self,
        uuid: &str,
        target_version: &str,
    ) -> Result<(), AgentError> {
        let url = action_url(self.actions_url(), &[uuid, "resinhup"])?;
        let request = StartHupRequest {
            parameters: HupParameters {
                target_version: target_version.to_string(),
            },
        };

        self.post(url, &request).await?;
        info!("Host OS update to {} requested for {}", target_version, uuid);
        Ok(())
    }
}

fn device_identity(record: DeviceRecord) -> Result<DeviceIdentity, AgentError> {
    let device_type = record
        .device_type
        .into_iter()
        .next()
        .map(|dt| dt.slug)
        .ok_or_else(|| {
            AgentError::ApiError(format!("Device {} has no device type", record.uuid))
        })?;

    let os_version = record
        .os_version
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| {
            AgentError::ApiError(format!("Device {} reports no OS version", record.uuid))
        })?;

    Ok(DeviceIdentity {
        uuid: record.uuid,
        device_type,
        os_version,
        online: record.is_online,
    })
}

fn action_url(base: &str, segments: &[&str]) -> Result<url::Url, AgentError> {
    let mut url = url::Url::parse(base)
        .map_err(|e| AgentError::ConfigError(format!("Invalid actions URL: {}", e)))?;
    url.path_segments_mut()
        .map_err(|_| AgentError::ConfigError(format!("Invalid actions URL: {}", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Quote a value for use inside an OData string literal
pub(crate) fn odata_escape(value: &str) -> String {
    value.replace('\'', "''")
}
