//! Application configuration options

use std::time::Duration;

use crate::logs::LogOptions;
use crate::workers::updater;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Backend API base URL
    pub backend_base_url: String,

    /// Device actions endpoint override
    pub actions_url: Option<String>,

    /// Updater worker options
    pub updater: updater::Options,

    /// Logging options
    pub log: LogOptions,
}

/// Lifecycle options for the agent
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(10),
        }
    }
}
