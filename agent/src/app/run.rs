//! Main application run loop

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::app::options::{AppOptions, LifecycleOptions};
use crate::errors::AgentError;
use crate::http::api::DeviceApi;
use crate::http::client::HttpClient;
use crate::workers::updater;

/// Run the host OS update agent until `shutdown_signal` resolves
pub async fn run(
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), AgentError> {
    info!("Initializing host OS update agent...");

    let http_client = Arc::new(
        HttpClient::new(&options.backend_base_url, options.actions_url.as_deref()).await?,
    );
    info!(
        "Using API {} and device actions {}",
        http_client.base_url(),
        http_client.actions_url()
    );

    run_with_api(options, http_client, shutdown_signal).await
}

/// Run the agent against any [`DeviceApi`]
pub async fn run_with_api<A>(
    options: AppOptions,
    api: Arc<A>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), AgentError>
where
    A: DeviceApi + 'static,
{
    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager = ShutdownManager::new(shutdown_tx.clone(), options.lifecycle.clone());

    init_updater_worker(
        options.updater.clone(),
        api,
        &mut shutdown_manager,
        shutdown_tx.subscribe(),
    )?;

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    drop(shutdown_tx);
    shutdown_manager.shutdown().await
}

fn init_updater_worker<A>(
    options: updater::Options,
    api: Arc<A>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), AgentError>
where
    A: DeviceApi + 'static,
{
    info!("Initializing updater worker...");

    let updater_handle = tokio::spawn(async move {
        updater::run(
            &options,
            api.as_ref(),
            tokio::time::sleep,
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    shutdown_manager.with_updater_worker_handle(updater_handle)
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    lifecycle_options: LifecycleOptions,
    updater_worker_handle: Option<JoinHandle<()>>,
}

impl ShutdownManager {
    fn new(shutdown_tx: broadcast::Sender<()>, lifecycle_options: LifecycleOptions) -> Self {
        Self {
            shutdown_tx,
            lifecycle_options,
            updater_worker_handle: None,
        }
    }

    fn with_updater_worker_handle(&mut self, handle: JoinHandle<()>) -> Result<(), AgentError> {
        if self.updater_worker_handle.is_some() {
            return Err(AgentError::Internal("updater_handle already set".to_string()));
        }
        self.updater_worker_handle = Some(handle);
        Ok(())
    }

    /// Stop the worker, cancelling a cycle that outlives the shutdown delay.
    ///
    /// A cancelled cycle drops its lock handle, which releases the lock.
    async fn shutdown(&mut self) -> Result<(), AgentError> {
        let _ = self.shutdown_tx.send(());
        info!("Shutting down host OS update agent...");

        if let Some(mut handle) = self.updater_worker_handle.take() {
            let max_delay = self.lifecycle_options.max_shutdown_delay;
            tokio::select! {
                joined = &mut handle => {
                    joined.map_err(|e| AgentError::Internal(e.to_string()))?;
                }
                _ = tokio::time::sleep(max_delay) => {
                    warn!(
                        "Updater worker still busy after {:?}, cancelling the running cycle...",
                        max_delay
                    );
                    handle.abort();
                    if let Err(e) = handle.await {
                        if !e.is_cancelled() {
                            error!("Updater worker failed during cancellation: {}", e);
                        }
                    }
                }
            }
        }

        info!("Shutdown complete");
        Ok(())
    }
}
