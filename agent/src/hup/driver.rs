//! Host OS update driver
//!
//! One cycle: wait for the device to be online, wait for any running update
//! to finish, resolve the target version, then start and observe the update
//! with a bounded number of attempts. The caller must hold the update lock.

use std::future::Future;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::errors::AgentError;
use crate::http::api::DeviceApi;
use crate::hup::fsm::{UpdateEvent, UpdateFsm, UpdatePhase};
use crate::hup::status::{poll, UpdateStatus};
use crate::hup::version::{has_reached, is_newer, resolve_target};
use crate::models::device::DeviceIdentity;
use crate::utils::format_duration;

/// Update driver options
#[derive(Debug, Clone)]
pub struct Options {
    /// Delay between reachability checks while the device is offline
    pub online_interval: Duration,

    /// Delay between update status polls
    pub status_interval: Duration,

    /// Delay before retrying a failed attempt
    pub retry_interval: Duration,

    /// Attempts per cycle
    pub max_retries: u32,

    /// Operator-pinned version (substring match); `None` follows the recommendation
    pub target_version: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            online_interval: Duration::from_secs(120),
            status_interval: Duration::from_secs(30),
            retry_interval: Duration::from_secs(300),
            max_retries: 3,
            target_version: None,
        }
    }
}

/// How a cycle ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The device reached the target version
    Updated {
        from: String,
        to: String,
        attempts: u32,
    },

    /// No eligible target version
    NothingToDo { current: String },

    /// Target could not be resolved or every attempt failed
    Failed {
        target: Option<String>,
        attempts: u32,
        reason: String,
    },
}

/// Run one update cycle for `uuid`.
///
/// Only authentication failures and internal errors are returned as `Err`;
/// every other failure is logged and reported through [`CycleOutcome`].
pub async fn run_cycle<A, S, F>(
    options: &Options,
    api: &A,
    uuid: &str,
    sleep_fn: &S,
) -> Result<CycleOutcome, AgentError>
where
    A: DeviceApi + ?Sized,
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    let mut fsm = UpdateFsm::new(options.max_retries);
    advance(&mut fsm, UpdateEvent::Begin)?;

    let device = wait_online(api, uuid, options.online_interval, sleep_fn).await?;
    advance(&mut fsm, UpdateEvent::Online)?;

    wait_idle(api, uuid, options.status_interval, sleep_fn).await;
    advance(&mut fsm, UpdateEvent::Idle)?;

    let pinned = options.target_version.as_deref();
    info!(
        "Getting {} release for {} at {}...",
        if pinned.is_some() { "pinned" } else { "recommended" },
        device.device_type,
        device.os_version
    );

    let target = match resolve_target(api, &device.device_type, &device.os_version, pinned).await {
        Ok(Some(target)) if is_newer(&target, &device.os_version) => target,
        Ok(Some(target)) => {
            info!(
                "Target {} is not newer than {}, nothing to do",
                target, device.os_version
            );
            advance(&mut fsm, UpdateEvent::NoTarget)?;
            return Ok(CycleOutcome::NothingToDo {
                current: device.os_version,
            });
        }
        Ok(None) => {
            info!("No releases found...");
            advance(&mut fsm, UpdateEvent::NoTarget)?;
            return Ok(CycleOutcome::NothingToDo {
                current: device.os_version,
            });
        }
        Err(e @ AgentError::AuthError(_)) => return Err(e),
        Err(e) => {
            error!(
                "Failed to resolve target version for {} ({}): {}",
                uuid, device.device_type, e
            );
            advance(&mut fsm, UpdateEvent::ResolveFailed(e.to_string()))?;
            return Ok(CycleOutcome::Failed {
                target: None,
                attempts: 0,
                reason: failure_reason(&fsm),
            });
        }
    };
    advance(&mut fsm, UpdateEvent::TargetResolved)?;

    loop {
        info!(
            "Starting update attempt {}/{}...",
            fsm.attempts(),
            fsm.max_attempts()
        );

        match attempt_update(&mut fsm, options, api, &device, &target, sleep_fn).await {
            Ok(()) => {
                advance(&mut fsm, UpdateEvent::Completed)?;
                info!("Host OS update to {} successful!", target);
                return Ok(CycleOutcome::Updated {
                    from: device.os_version,
                    to: target,
                    attempts: fsm.attempts(),
                });
            }
            Err(e) => {
                error!(
                    "Host OS update attempt {}/{} for {} failed: {}",
                    fsm.attempts(),
                    fsm.max_attempts(),
                    uuid,
                    e
                );
                if advance(&mut fsm, UpdateEvent::AttemptFailed(e.to_string()))?
                    == UpdatePhase::Failed
                {
                    return Ok(CycleOutcome::Failed {
                        target: Some(target),
                        attempts: fsm.attempts(),
                        reason: failure_reason(&fsm),
                    });
                }

                info!("Retrying in {}...", format_duration(options.retry_interval));
                sleep_fn(options.retry_interval).await;
                advance(&mut fsm, UpdateEvent::Retry)?;
            }
        }
    }
}

/// Wait until the device reports online and return that reading.
///
/// Read errors count as offline, except authentication failures which end
/// the cycle.
pub async fn wait_online<A, S, F>(
    api: &A,
    uuid: &str,
    interval: Duration,
    sleep_fn: &S,
) -> Result<DeviceIdentity, AgentError>
where
    A: DeviceApi + ?Sized,
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    loop {
        match api.get_device(uuid).await {
            Ok(device) if device.online => return Ok(device),
            Ok(_) => info!("Device is offline..."),
            Err(e @ AgentError::AuthError(_)) => return Err(e),
            Err(e) => warn!("Failed to read device {}, treating as offline: {}", uuid, e),
        }
        sleep_fn(interval).await;
    }
}

/// Wait until no update is in progress
pub async fn wait_idle<A, S, F>(api: &A, uuid: &str, interval: Duration, sleep_fn: &S)
where
    A: DeviceApi + ?Sized,
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    while poll(api, uuid).await.is_in_progress() {
        info!("Another update is already in progress...");
        sleep_fn(interval).await;
    }
}

async fn attempt_update<A, S, F>(
    fsm: &mut UpdateFsm,
    options: &Options,
    api: &A,
    device: &DeviceIdentity,
    target: &str,
    sleep_fn: &S,
) -> Result<(), AgentError>
where
    A: DeviceApi + ?Sized,
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Updating host OS to {}...", target);
    api.start_os_update(&device.uuid, target)
        .await
        .map_err(|e| AgentError::UpdateFailed(format!("Error while starting update: {}", e)))?;
    advance(fsm, UpdateEvent::UpdateStarted)?;

    wait_completion(api, &device.uuid, target, options.status_interval, sleep_fn).await
}

/// Polls a final status may go without a confirmed version before the
/// attempt fails
const MAX_UNCONFIRMED_POLLS: u32 = 3;

/// Poll until the backend reports a final status, then confirm the version.
///
/// `Idle` is final as well: the backend keeps no action for a request it
/// dropped. It gets the same short grace as an unreadable version.
async fn wait_completion<A, S, F>(
    api: &A,
    uuid: &str,
    target: &str,
    interval: Duration,
    sleep_fn: &S,
) -> Result<(), AgentError>
where
    A: DeviceApi + ?Sized,
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    let mut unconfirmed = 0;
    loop {
        match poll(api, uuid).await {
            UpdateStatus::InProgress => info!("Update in progress..."),
            UpdateStatus::Error { fatal } => {
                return Err(AgentError::UpdateFailed(format!(
                    "Backend reported a{} update error",
                    if fatal { " fatal" } else { "n" }
                )));
            }
            status @ (UpdateStatus::Done | UpdateStatus::Idle) => {
                match api.get_device(uuid).await {
                    Ok(device) if has_reached(&device.os_version, target) => return Ok(()),
                    Ok(device) if status == UpdateStatus::Done => {
                        error!(
                            "Update complete but version is unchanged! (target {}, current: {})",
                            target, device.os_version
                        );
                        return Err(AgentError::VersionRegression {
                            target: target.to_string(),
                            current: device.os_version,
                        });
                    }
                    Ok(device) => {
                        unconfirmed += 1;
                        if unconfirmed >= MAX_UNCONFIRMED_POLLS {
                            return Err(AgentError::UpdateFailed(format!(
                                "No update recorded for target {}, device still at {}",
                                target, device.os_version
                            )));
                        }
                        info!("Waiting for the update to start...");
                    }
                    Err(e) => {
                        unconfirmed += 1;
                        if unconfirmed >= MAX_UNCONFIRMED_POLLS {
                            return Err(AgentError::UpdateFailed(format!(
                                "Unable to confirm OS version of {}: {}",
                                uuid, e
                            )));
                        }
                        warn!("Failed to confirm OS version of {}: {}", uuid, e);
                    }
                }
            }
        }
        sleep_fn(interval).await;
    }
}

fn failure_reason(fsm: &UpdateFsm) -> String {
    fsm.error().unwrap_or("unknown error").to_string()
}

fn advance(fsm: &mut UpdateFsm, event: UpdateEvent) -> Result<UpdatePhase, AgentError> {
    fsm.process(event).map_err(AgentError::Internal)
}
