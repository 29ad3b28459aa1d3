//! Host OS update worker

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use secrecy::SecretString;
use tracing::{error, info, warn};

use crate::errors::AgentError;
use crate::filesys::lock::with_lock;
use crate::http::api::DeviceApi;
use crate::hup::driver::{self, CycleOutcome};
use crate::utils::format_duration;

/// Updater worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Device to keep up to date
    pub device_uuid: String,

    /// Backend API key
    pub api_key: SecretString,

    /// Delay between cycles
    pub check_interval: Duration,

    /// Advisory lock guarding the update
    pub lock_file: PathBuf,

    /// Per-cycle driver options
    pub driver: driver::Options,
}

/// Result of one scheduled cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleReport {
    /// Another instance holds the update lock
    LockBusy,

    /// The driver ran to completion
    Finished(CycleOutcome),
}

/// Run the updater worker until `shutdown_signal` resolves.
///
/// A cycle runs immediately, then every `check_interval`. Cycle errors are
/// logged and never stop the loop.
pub async fn run<A, S, F>(
    options: &Options,
    api: &A,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    A: DeviceApi + ?Sized,
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Updater worker starting for device {}...", options.device_uuid);

    loop {
        match run_cycle(options, api, &sleep_fn).await {
            Ok(report) => log_report(&options.device_uuid, &report),
            Err(e) => error!(
                "Update cycle for {} aborted: {}",
                options.device_uuid, e
            ),
        }

        info!(
            "Will check again in {}...",
            format_duration(options.check_interval)
        );

        tokio::select! {
            biased;
            _ = &mut shutdown_signal => {
                info!("Updater worker shutting down...");
                return;
            }
            _ = sleep_fn(options.check_interval) => {
                // Continue with next cycle
            }
        }
    }
}

/// Run one cycle: authenticate, then drive the update while holding the lock.
pub async fn run_cycle<A, S, F>(
    options: &Options,
    api: &A,
    sleep_fn: &S,
) -> Result<CycleReport, AgentError>
where
    A: DeviceApi + ?Sized,
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    api.authenticate(&options.api_key).await?;

    let outcome = with_lock(&options.lock_file, || {
        driver::run_cycle(&options.driver, api, &options.device_uuid, sleep_fn)
    })
    .await?;

    Ok(match outcome {
        Some(outcome) => CycleReport::Finished(outcome),
        None => CycleReport::LockBusy,
    })
}

fn log_report(uuid: &str, report: &CycleReport) {
    match report {
        CycleReport::LockBusy => {
            warn!("Another instance is updating {}, skipping this cycle", uuid)
        }
        CycleReport::Finished(CycleOutcome::Updated { from, to, attempts }) => info!(
            "Device {} updated from {} to {} after {} attempt(s)",
            uuid, from, to, attempts
        ),
        CycleReport::Finished(CycleOutcome::NothingToDo { current }) => {
            info!("Device {} is up to date at {}", uuid, current)
        }
        CycleReport::Finished(CycleOutcome::Failed {
            target,
            attempts,
            reason,
        }) => error!(
            "Host OS update for {} failed (target {}, {} attempt(s)): {}",
            uuid,
            target.as_deref().unwrap_or("unresolved"),
            attempts,
            reason
        ),
    }
}
