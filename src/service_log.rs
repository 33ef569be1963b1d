//! Append-only service log for the server and CLI.

use std::io::Write;
use std::path::{Path, PathBuf};

/// Tagged, timestamped log lines appended to a file.
///
/// The `tag` identifies the source (e.g. "server", "cache", "cli"). Writes
/// are best-effort; a log that cannot be opened never fails the caller.
#[derive(Debug, Clone)]
pub struct ServiceLog {
    path: PathBuf,
}

impl ServiceLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Log at `~/.compass-usage/logs/server.log`.
    pub fn open_default() -> anyhow::Result<Self> {
        Ok(Self::new(crate::paths::server_log_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn log(&self, tag: &str, msg: &str) {
        tracing::info!(tag, "{}", msg);
        if let Ok(mut file) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
        {
            let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
            let _ = writeln!(file, "[{}] [{}] {}", now, tag, msg);
        }
    }
}
