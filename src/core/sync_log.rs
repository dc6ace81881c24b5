use chrono::Utc;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::settings::Settings;

/// Human-readable log of unattended hook syncs (`~/.claude-stats/sync.log`).
///
/// Purely diagnostic: every I/O failure is swallowed so logging can never
/// break a sync.
#[derive(Debug, Clone)]
pub struct SyncLog {
    path: PathBuf,
    max_bytes: u64,
}

fn timestamp() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

impl SyncLog {
    pub fn new(settings: &Settings) -> Self {
        Self::at(settings.log_path(), settings.log_max_bytes)
    }

    pub fn at(path: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            path: path.into(),
            max_bytes,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn log(&self, message: &str) {
        if let Err(err) = self.try_log(message) {
            tracing::debug!(path = %self.path.display(), error = %err, "Failed to write sync log");
        }
    }

    fn try_log(&self, message: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        if let Ok(metadata) = std::fs::metadata(&self.path) {
            if metadata.len() > self.max_bytes {
                std::fs::File::create(&self.path)?;
                self.append(&format!(
                    "[{}] Log rotated (exceeded {}KB)\n",
                    timestamp(),
                    self.max_bytes / 1024
                ))?;
            }
        }

        self.append(&format!("[{}] {}\n", timestamp(), message))
    }

    fn append(&self, line: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())
    }

    pub fn error(&self, message: &str, err: &dyn std::fmt::Display) {
        self.log(&format!("ERROR: {} - {}", message, err));
    }

    pub fn sync_start(&self) {
        self.log(&"─".repeat(50));
        self.log("SYNC START");
    }

    pub fn sync_complete(&self, elapsed: Duration) {
        self.log(&format!("SYNC COMPLETE ({:.1}s)", elapsed.as_secs_f64()));
    }
}
