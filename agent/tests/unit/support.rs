//! In-memory backend and recorded sleeps shared by the unit tests

use std::collections::VecDeque;
use std::future::Ready;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;

use hupagent::errors::AgentError;
use hupagent::http::api::DeviceApi;
use hupagent::models::device::{DeviceIdentity, OsUpdateStatus, Session, SupportedOsVersions};

pub const UUID: &str = "f00dcafe";
pub const DEVICE_TYPE: &str = "raspberrypi4-64";

/// Scripted failure
#[derive(Debug, Clone, Copy)]
pub enum Fail {
    Api,
    Auth,
}

impl Fail {
    fn into_error(self, call: &str) -> AgentError {
        match self {
            Fail::Api => AgentError::ApiError(format!("{} failed", call)),
            Fail::Auth => AgentError::AuthError(format!("{} unauthorized", call)),
        }
    }
}

type Scripted<T> = Result<T, Fail>;

/// Calls observed by the fake
#[derive(Debug, Clone, Default)]
pub struct Calls {
    pub authenticate: usize,
    pub get_device: usize,
    pub supported_versions: usize,
    pub status: usize,
    pub start: Vec<String>,
}

#[derive(Debug, Default)]
struct State {
    auth: VecDeque<Scripted<()>>,
    devices: VecDeque<Scripted<DeviceIdentity>>,
    statuses: VecDeque<Scripted<OsUpdateStatus>>,
    supported: VecDeque<Scripted<SupportedOsVersions>>,
    starts: VecDeque<Scripted<()>>,
    upgrade_to: Option<String>,
    started: bool,
    calls: Calls,
}

/// Fake backend. Every reply queue repeats its last entry once drained.
#[derive(Debug, Default)]
pub struct FakeApi {
    state: Mutex<State>,
}

fn next<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

pub fn device(os_version: &str, online: bool) -> DeviceIdentity {
    DeviceIdentity {
        uuid: UUID.to_string(),
        device_type: DEVICE_TYPE.to_string(),
        os_version: os_version.to_string(),
        online,
    }
}

pub fn status(raw: &str) -> OsUpdateStatus {
    OsUpdateStatus {
        status: Some(raw.to_string()),
        fatal: false,
        error: None,
    }
}

pub fn supported(recommended: Option<&str>, versions: &[&str]) -> SupportedOsVersions {
    SupportedOsVersions {
        recommended: recommended.map(str::to_string),
        versions: versions.iter().map(|v| v.to_string()).collect(),
        current: "2.1.0".to_string(),
    }
}

impl FakeApi {
    /// Online device at `os_version` with no update running
    pub fn online(os_version: &str) -> Self {
        let api = Self::default();
        api.with(|s| {
            s.devices.push_back(Ok(device(os_version, true)));
            s.statuses.push_back(Ok(OsUpdateStatus::none()));
        });
        api
    }

    fn with<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn auth_replies(self, replies: Vec<Scripted<()>>) -> Self {
        self.with(|s| s.auth = replies.into());
        self
    }

    pub fn device_replies(self, replies: Vec<Scripted<DeviceIdentity>>) -> Self {
        self.with(|s| s.devices = replies.into());
        self
    }

    pub fn status_replies(self, replies: Vec<Scripted<OsUpdateStatus>>) -> Self {
        self.with(|s| s.statuses = replies.into());
        self
    }

    pub fn supported_replies(self, replies: Vec<Scripted<SupportedOsVersions>>) -> Self {
        self.with(|s| s.supported = replies.into());
        self
    }

    pub fn start_replies(self, replies: Vec<Scripted<()>>) -> Self {
        self.with(|s| s.starts = replies.into());
        self
    }

    /// Report `version` from every device read after a successful start
    pub fn upgrades_to(self, version: &str) -> Self {
        self.with(|s| s.upgrade_to = Some(version.to_string()));
        self
    }

    pub fn calls(&self) -> Calls {
        self.with(|s| s.calls.clone())
    }
}

#[async_trait]
impl DeviceApi for FakeApi {
    async fn authenticate(&self, _api_key: &SecretString) -> Result<Session, AgentError> {
        self.with(|s| {
            s.calls.authenticate += 1;
            match next(&mut s.auth).unwrap_or(Ok(())) {
                Ok(()) => Ok(Session {
                    actor_id: 1,
                    actor_type: "user".to_string(),
                }),
                Err(fail) => Err(fail.into_error("authenticate")),
            }
        })
    }

    async fn get_device(&self, _uuid: &str) -> Result<DeviceIdentity, AgentError> {
        self.with(|s| {
            s.calls.get_device += 1;
            let reply = next(&mut s.devices).unwrap_or(Err(Fail::Api));
            match reply {
                Ok(mut device) => {
                    if let (true, Some(version)) = (s.started, &s.upgrade_to) {
                        device.os_version = version.clone();
                    }
                    Ok(device)
                }
                Err(fail) => Err(fail.into_error("get_device")),
            }
        })
    }

    async fn get_supported_os_update_versions(
        &self,
        _device_type: &str,
        _current_version: &str,
    ) -> Result<SupportedOsVersions, AgentError> {
        self.with(|s| {
            s.calls.supported_versions += 1;
            next(&mut s.supported)
                .unwrap_or_else(|| Ok(SupportedOsVersions::default()))
                .map_err(|fail| fail.into_error("get_supported_os_update_versions"))
        })
    }

    async fn get_os_update_status(&self, _uuid: &str) -> Result<OsUpdateStatus, AgentError> {
        self.with(|s| {
            s.calls.status += 1;
            next(&mut s.statuses)
                .unwrap_or_else(|| Ok(OsUpdateStatus::none()))
                .map_err(|fail| fail.into_error("get_os_update_status"))
        })
    }

    async fn start_os_update(&self, _uuid: &str, target_version: &str) -> Result<(), AgentError> {
        self.with(|s| {
            s.calls.start.push(target_version.to_string());
            match next(&mut s.starts).unwrap_or(Ok(())) {
                Ok(()) => {
                    s.started = true;
                    Ok(())
                }
                Err(fail) => Err(fail.into_error("start_os_update")),
            }
        })
    }
}

/// Sleep that returns immediately and records the requested duration
#[derive(Clone, Default)]
pub struct RecordedSleep {
    waits: Arc<Mutex<Vec<Duration>>>,
}

impl RecordedSleep {
    pub fn sleep_fn(&self) -> impl Fn(Duration) -> Ready<()> + Send + Sync + 'static {
        let waits = self.waits.clone();
        move |wait| {
            waits.lock().unwrap().push(wait);
            std::future::ready(())
        }
    }

    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().unwrap().clone()
    }

    pub fn count(&self, wait: Duration) -> usize {
        self.waits().iter().filter(|w| **w == wait).count()
    }
}
