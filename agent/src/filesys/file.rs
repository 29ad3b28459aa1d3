//! JSON files on disk

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tokio::fs;

use crate::errors::AgentError;

/// A file the agent reads its settings from
#[derive(Debug, Clone)]
pub struct File {
    path: PathBuf,
}

impl File {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether anything exists at the path
    pub async fn exists(&self) -> bool {
        fs::try_exists(&self.path).await.unwrap_or(false)
    }

    /// Read and deserialize the whole file as JSON
    pub async fn read_json<T: DeserializeOwned>(&self) -> Result<T, AgentError> {
        let bytes = fs::read(&self.path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
