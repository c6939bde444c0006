//! Bot status file for external monitoring.
//!
//! A small JSON document, `{"running": bool, "last_message": string|null,
//! "error": string|null}`, rewritten after notable events. Nothing in the
//! counting path depends on it; write failures are only logged.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default status file name inside the data directory.
pub const STATUS_FILE_NAME: &str = "bot_status.json";

/// Snapshot of the bot's health.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BotStatus {
    /// Whether the bot is up.
    pub running: bool,
    /// Last notable event.
    pub last_message: Option<String>,
    /// Last fatal error, if any.
    pub error: Option<String>,
    /// When this status was written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Writer for the status file.
///
/// Keeps the last written status in memory so the web API can serve it
/// without touching disk.
#[derive(Debug)]
pub struct StatusFile {
    path: Option<PathBuf>,
    current: Mutex<BotStatus>,
}

impl StatusFile {
    /// Status file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            current: Mutex::new(BotStatus::default()),
        }
    }

    /// Status file inside `dir` using the default file name.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(STATUS_FILE_NAME))
    }

    /// Status kept in memory only.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            current: Mutex::new(BotStatus::default()),
        }
    }

    /// Record a running status with an event message.
    pub fn running(&self, message: impl Into<String>) {
        self.record(true, Some(message.into()), None);
    }

    /// Record a stopped status, optionally with an error.
    pub fn stopped(&self, message: Option<String>, error: Option<String>) {
        self.record(false, message, error);
    }

    /// Record a status and write it out.
    pub fn record(&self, running: bool, last_message: Option<String>, error: Option<String>) {
        let status = BotStatus {
            running,
            last_message,
            error,
            updated_at: Some(Utc::now()),
        };

        let mut current = self.current.lock();
        *current = status.clone();

        if let Some(path) = &self.path {
            if let Err(e) = write_status(path, &status) {
                warn!(path = %path.display(), error = %e, "Could not save status");
            }
        }
    }

    /// Last recorded status.
    pub fn current(&self) -> BotStatus {
        self.current.lock().clone()
    }

    /// Read the status file from disk.
    pub fn read(&self) -> Option<BotStatus> {
        let path = self.path.as_ref()?;
        let raw = fs::read(path).ok()?;
        serde_json::from_slice(&raw).ok()
    }
}

fn write_status(path: &Path, status: &BotStatus) -> std::io::Result<()> {
    let bytes = serde_json::to_vec(status)?;
    fs::write(path, bytes)
}
