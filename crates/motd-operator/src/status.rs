//! Where the operator's health ends up.

use std::path::PathBuf;

use async_trait::async_trait;
use motd_core::{Error, OperatorHealth, Result, UnitStatus};
use parking_lot::Mutex;
use tokio::process::Command;
use tracing::{debug, warn};

/// Health reporting interface exposed to the host platform.
#[async_trait]
pub trait StatusReporter: Send + Sync {
    async fn set_status(&self, status: &UnitStatus) -> Result<()>;
}

/// Reports through the host agent's `status-set` hook tool.
///
/// The agent only accepts `active`, `blocked`, `waiting` and `maintenance`.
/// `error` is recorded by the agent itself when the hook exits non-zero, so
/// it is logged here and left to the exit code.
pub struct HookToolReporter {
    tool: PathBuf,
}

impl HookToolReporter {
    pub fn new() -> Self {
        Self::with_tool("status-set")
    }

    pub fn with_tool(tool: impl Into<PathBuf>) -> Self {
        Self { tool: tool.into() }
    }
}

impl Default for HookToolReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StatusReporter for HookToolReporter {
    async fn set_status(&self, status: &UnitStatus) -> Result<()> {
        match status.health {
            OperatorHealth::Error | OperatorHealth::Unknown => {
                warn!(status = %status, "Status not settable through hook tool");
                return Ok(());
            }
            OperatorHealth::Active | OperatorHealth::Blocked | OperatorHealth::Waiting => {}
        }

        let output = Command::new(&self.tool)
            .arg(status.health.as_str())
            .arg(&status.message)
            .output()
            .await
            .map_err(|e| Error::StatusReport(format!("{}: {}", self.tool.display(), e)))?;

        if !output.status.success() {
            return Err(Error::StatusReport(format!(
                "{} exited with {}: {}",
                self.tool.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        debug!(status = %status, "Status set");
        Ok(())
    }
}

/// Writes the latest status as JSON, for running outside a host agent.
pub struct FileReporter {
    path: PathBuf,
}

impl FileReporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read back the last status written, if any.
    pub fn load(&self) -> Result<Option<UnitStatus>> {
        match std::fs::read_to_string(&self.path) {
            Ok(data) => Ok(Some(serde_json::from_str(&data)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl StatusReporter for FileReporter {
    async fn set_status(&self, status: &UnitStatus) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(status)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// Keeps every reported status in memory.
#[derive(Default)]
pub struct MemoryReporter {
    history: Mutex<Vec<UnitStatus>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<UnitStatus> {
        self.history.lock().clone()
    }

    pub fn last(&self) -> Option<UnitStatus> {
        self.history.lock().last().cloned()
    }
}

#[async_trait]
impl StatusReporter for MemoryReporter {
    async fn set_status(&self, status: &UnitStatus) -> Result<()> {
        self.history.lock().push(status.clone());
        Ok(())
    }
}
