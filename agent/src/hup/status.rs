//! Host OS update status polling

use tracing::{debug, warn};

use crate::http::api::DeviceApi;
use crate::models::device::OsUpdateStatus;

const STATUS_IN_PROGRESS: &str = "in_progress";
const STATUS_DONE: &str = "done";
const STATUS_ERROR: &str = "error";

/// Classified host OS update status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    /// No update running
    Idle,

    /// An update is running, or the status could not be read
    InProgress,

    /// The backend reports the update finished
    Done,

    /// The backend reports the update failed
    Error { fatal: bool },
}

impl UpdateStatus {
    /// Classify the backend's raw status
    pub fn classify(raw: &OsUpdateStatus) -> Self {
        let status = raw.status.as_deref().map(str::trim).unwrap_or_default();

        if raw.fatal || status.eq_ignore_ascii_case(STATUS_ERROR) {
            return UpdateStatus::Error { fatal: raw.fatal };
        }
        if status.eq_ignore_ascii_case(STATUS_DONE) {
            return UpdateStatus::Done;
        }
        if status.eq_ignore_ascii_case(STATUS_IN_PROGRESS) {
            return UpdateStatus::InProgress;
        }
        UpdateStatus::Idle
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(self, UpdateStatus::InProgress)
    }
}

/// Fetch and classify the device's update status.
///
/// Fails closed: a read error is reported as `InProgress` so that no wait
/// loop concludes success or failure from a transient error.
pub async fn poll<A>(api: &A, uuid: &str) -> UpdateStatus
where
    A: DeviceApi + ?Sized,
{
    match api.get_os_update_status(uuid).await {
        Ok(raw) => {
            let status = UpdateStatus::classify(&raw);
            debug!("Update status for {}: {:?} (raw {:?})", uuid, status, raw);
            if let (UpdateStatus::Error { .. }, Some(message)) = (&status, &raw.error) {
                warn!("Backend reports update error for {}: {}", uuid, message);
            }
            status
        }
        Err(e) => {
            warn!(
                "Error while getting update status for {}, assuming in progress: {}",
                uuid, e
            );
            UpdateStatus::InProgress
        }
    }
}
