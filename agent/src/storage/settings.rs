//! Settings management
//!
//! Settings come from an optional JSON file, then environment variables,
//! which take precedence.

use std::path::PathBuf;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::app::options::{AppOptions, LifecycleOptions};
use crate::errors::AgentError;
use crate::filesys::file::File;
use crate::hup::driver;
use crate::logs::{LogLevel, LogOptions};
use crate::storage::layout::StorageLayout;
use crate::utils::parse_duration;
use crate::workers::updater;

pub const ENV_API_KEY: &str = "BALENA_API_KEY";
pub const ENV_API_URL: &str = "BALENA_API_URL";
pub const ENV_DEVICE_UUID: &str = "BALENA_DEVICE_UUID";
pub const ENV_ACTIONS_URL: &str = "HUP_ACTIONS_URL";
pub const ENV_CHECK_INTERVAL: &str = "HUP_CHECK_INTERVAL";
pub const ENV_MAX_RETRIES: &str = "HUP_MAX_RETRIES";
pub const ENV_RETRY_INTERVAL: &str = "HUP_RETRY_INTERVAL";
pub const ENV_STATUS_INTERVAL: &str = "HUP_STATUS_INTERVAL";
pub const ENV_ONLINE_INTERVAL: &str = "HUP_ONLINE_INTERVAL";
pub const ENV_TARGET_VERSION: &str = "HUP_TARGET_VERSION";
pub const ENV_LOCK_FILE: &str = "HUP_LOCK_FILE";
pub const ENV_LOG_LEVEL: &str = "HUP_LOG_LEVEL";
pub const ENV_LOG_JSON: &str = "HUP_LOG_JSON";
pub const ENV_LOG_DIR: &str = "HUP_LOG_DIR";

/// Agent settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Backend API key
    #[serde(default)]
    pub api_key: Option<String>,

    /// Backend API endpoint
    #[serde(default)]
    pub api_url: Option<String>,

    /// Device actions endpoint, defaults to one under `api_url`
    #[serde(default)]
    pub actions_url: Option<String>,

    /// Device to keep up to date
    #[serde(default)]
    pub device_uuid: Option<String>,

    /// Delay between update cycles
    #[serde(default = "default_check_interval")]
    pub check_interval: String,

    /// Update attempts per cycle
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before retrying a failed attempt
    #[serde(default = "default_retry_interval")]
    pub retry_interval: String,

    /// Delay between update status polls
    #[serde(default = "default_status_interval")]
    pub status_interval: String,

    /// Delay between checks while the device is offline
    #[serde(default = "default_online_interval")]
    pub online_interval: String,

    /// Pinned target version
    #[serde(default)]
    pub target_version: Option<String>,

    /// Advisory lock file, defaults to one in the storage layout
    #[serde(default)]
    pub lock_file: Option<PathBuf>,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit JSON log lines
    #[serde(default)]
    pub log_json: bool,

    /// Directory for a rolling log file
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_check_interval() -> String {
    "1d".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_interval() -> String {
    "5m".to_string()
}

fn default_status_interval() -> String {
    "30s".to_string()
}

fn default_online_interval() -> String {
    "2m".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: None,
            actions_url: None,
            device_uuid: None,
            check_interval: default_check_interval(),
            max_retries: default_max_retries(),
            retry_interval: default_retry_interval(),
            status_interval: default_status_interval(),
            online_interval: default_online_interval(),
            target_version: None,
            lock_file: None,
            log_level: LogLevel::Info,
            log_json: false,
            log_dir: None,
        }
    }
}

impl Settings {
    /// Load settings from `file`.
    ///
    /// A missing file yields defaults unless `required` is set.
    pub async fn load(file: &File, required: bool) -> Result<Self, AgentError> {
        if !file.exists().await {
            if required {
                return Err(AgentError::ConfigError(format!(
                    "Settings file {} does not exist",
                    file.path().display()
                )));
            }
            return Ok(Self::default());
        }

        debug!("Reading settings from {}", file.path().display());
        file.read_json().await.map_err(|e| {
            AgentError::ConfigError(format!(
                "Unable to read settings file {}: {}",
                file.path().display(),
                e
            ))
        })
    }

    /// Override settings from the environment. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), AgentError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = var(ENV_API_KEY) {
            self.api_key = Some(value);
        }
        if let Some(value) = var(ENV_API_URL) {
            self.api_url = Some(value);
        }
        if let Some(value) = var(ENV_ACTIONS_URL) {
            self.actions_url = Some(value);
        }
        if let Some(value) = var(ENV_DEVICE_UUID) {
            self.device_uuid = Some(value);
        }
        if let Some(value) = var(ENV_CHECK_INTERVAL) {
            self.check_interval = value;
        }
        if let Some(value) = var(ENV_MAX_RETRIES) {
            self.max_retries = value.trim().parse().map_err(|_| {
                AgentError::ConfigError(format!("{} must be a number, got {:?}", ENV_MAX_RETRIES, value))
            })?;
        }
        if let Some(value) = var(ENV_RETRY_INTERVAL) {
            self.retry_interval = value;
        }
        if let Some(value) = var(ENV_STATUS_INTERVAL) {
            self.status_interval = value;
        }
        if let Some(value) = var(ENV_ONLINE_INTERVAL) {
            self.online_interval = value;
        }
        if let Some(value) = var(ENV_TARGET_VERSION) {
            self.target_version = Some(value);
        }
        if let Some(value) = var(ENV_LOCK_FILE) {
            self.lock_file = Some(PathBuf::from(value));
        }
        if let Some(value) = var(ENV_LOG_LEVEL) {
            self.log_level = value
                .parse()
                .map_err(|e| AgentError::ConfigError(format!("{}: {}", ENV_LOG_LEVEL, e)))?;
        }
        if let Some(value) = var(ENV_LOG_JSON) {
            self.log_json = parse_bool(&value).ok_or_else(|| {
                AgentError::ConfigError(format!("{} must be true or false, got {:?}", ENV_LOG_JSON, value))
            })?;
        }
        if let Some(value) = var(ENV_LOG_DIR) {
            self.log_dir = Some(PathBuf::from(value));
        }

        Ok(())
    }

    /// Validate the settings and build the runtime options
    pub fn into_options(self, layout: &StorageLayout) -> Result<AppOptions, AgentError> {
        let api_key = required(self.api_key, ENV_API_KEY)?;
        let api_url = required(self.api_url, ENV_API_URL)?;
        let device_uuid = required(self.device_uuid, ENV_DEVICE_UUID)?;

        validate_url(&api_url, ENV_API_URL)?;
        if let Some(actions_url) = &self.actions_url {
            validate_url(actions_url, ENV_ACTIONS_URL)?;
        }

        let driver = driver::Options {
            online_interval: duration(&self.online_interval, ENV_ONLINE_INTERVAL)?,
            status_interval: duration(&self.status_interval, ENV_STATUS_INTERVAL)?,
            retry_interval: duration(&self.retry_interval, ENV_RETRY_INTERVAL)?,
            max_retries: self.max_retries,
            target_version: self
                .target_version
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
        };

        let updater = updater::Options {
            device_uuid,
            api_key: SecretString::from(api_key),
            check_interval: duration(&self.check_interval, ENV_CHECK_INTERVAL)?,
            lock_file: self.lock_file.unwrap_or_else(|| layout.lock_file()),
            driver,
        };

        Ok(AppOptions {
            lifecycle: LifecycleOptions::default(),
            backend_base_url: api_url,
            actions_url: self.actions_url,
            updater,
            log: LogOptions {
                log_level: self.log_level,
                json_format: self.log_json,
                log_dir: self.log_dir,
                ..Default::default()
            },
        })
    }
}

fn required(value: Option<String>, name: &str) -> Result<String, AgentError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AgentError::ConfigError(format!("{} required in environment", name)))
}

fn validate_url(value: &str, name: &str) -> Result<(), AgentError> {
    let url = url::Url::parse(value)
        .map_err(|e| AgentError::ConfigError(format!("{} is not a valid URL: {}", name, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(AgentError::ConfigError(format!(
            "{} must be an http(s) URL, got scheme {:?}",
            name, other
        ))),
    }
}

/// Parse an interval; zero would turn the waits into a busy loop
fn duration(value: &str, name: &str) -> Result<std::time::Duration, AgentError> {
    let duration =
        parse_duration(value).map_err(|e| AgentError::ConfigError(format!("{}: {}", name, e)))?;
    if duration.is_zero() {
        return Err(AgentError::ConfigError(format!(
            "{} must be greater than zero, got {:?}",
            name, value
        )));
    }
    Ok(duration)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
