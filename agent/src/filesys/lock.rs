//! Host-local advisory lock
//!
//! Only one agent instance on a host may drive an update at a time. The lock
//! is an exclusive `flock`-style lock on a file; the kernel drops it when the
//! holding process dies, so a killed agent never leaves it held.

use std::fs::{self, OpenOptions};
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, error};

use crate::errors::AgentError;

/// Result of a non-blocking acquisition attempt
#[derive(Debug)]
pub enum Acquire {
    /// The lock is now held by this handle
    Acquired(LockHandle),

    /// Another holder has the lock
    Busy,
}

/// Exclusive possession of the lock file. Released on drop.
#[derive(Debug)]
pub struct LockHandle {
    path: PathBuf,
    file: Option<fs::File>,
}

impl LockHandle {
    /// Release the lock now
    pub fn release(mut self) -> Result<(), AgentError> {
        self.release_inner()
    }

    fn release_inner(&mut self) -> Result<(), AgentError> {
        if let Some(file) = self.file.take() {
            file.unlock()?;
            debug!("Released lock {}", self.path.display());
        }
        Ok(())
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        if let Err(e) = self.release_inner() {
            error!("Failed to release lock {}: {}", self.path.display(), e);
        }
    }
}

/// Try to take the lock without waiting
pub fn try_acquire(path: &Path) -> Result<Acquire, AgentError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)?;

    match file.try_lock_exclusive() {
        Ok(()) => {
            debug!("Acquired lock {}", path.display());
            Ok(Acquire::Acquired(LockHandle {
                path: path.to_path_buf(),
                file: Some(file),
            }))
        }
        Err(e) if is_contended(&e) => Ok(Acquire::Busy),
        Err(e) => Err(e.into()),
    }
}

fn is_contended(err: &std::io::Error) -> bool {
    err.kind() == ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

/// Run `body` while holding the lock.
///
/// Returns `Ok(None)` without running the body when the lock is busy. The lock
/// is released before the body's result is returned, whether it failed or not.
pub async fn with_lock<T, F, Fut>(path: &Path, body: F) -> Result<Option<T>, AgentError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, AgentError>>,
{
    let handle = match try_acquire(path)? {
        Acquire::Acquired(handle) => handle,
        Acquire::Busy => return Ok(None),
    };

    let result = body().await;
    if let Err(e) = handle.release() {
        error!("Failed to release lock {}: {}", path.display(), e);
    }
    result.map(Some)
}
