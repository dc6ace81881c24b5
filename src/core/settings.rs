use std::path::{Path, PathBuf};
use std::time::Duration;

/// Base URL of the stats service. Not user-configurable.
pub const API_URL: &str = "https://claude-github-stats.vercel.app";

/// Minimum time between two incremental syncs.
pub const SYNC_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Size cap of the operational log before it is rotated.
pub const LOG_MAX_BYTES: u64 = 1024 * 1024;

/// Immutable runtime settings, built once at startup and handed to every component.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_url: String,
    pub sync_interval: Duration,
    /// Directory holding config.json, cache.json and sync.log.
    pub storage_dir: PathBuf,
    /// Single-file state written by older releases.
    pub legacy_state_file: PathBuf,
    /// Root of the Claude Code session logs.
    pub projects_dir: PathBuf,
    pub log_max_bytes: u64,
}

impl Settings {
    /// Resolve the default layout from the user's home directory,
    /// honouring CLAUDE_CONFIG_DIR for the session log root.
    pub fn from_env() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"));
        let mut settings = Self::with_home(&home);
        if let Ok(config_dir) = std::env::var("CLAUDE_CONFIG_DIR") {
            if !config_dir.is_empty() {
                settings.projects_dir = PathBuf::from(config_dir).join("projects");
            }
        }
        settings
    }

    /// Build the default layout rooted at `home`.
    pub fn with_home(home: &Path) -> Self {
        Self {
            api_url: API_URL.to_string(),
            sync_interval: SYNC_INTERVAL,
            storage_dir: home.join(".claude-stats"),
            legacy_state_file: home.join(".claude-stats-state"),
            projects_dir: home.join(".claude").join("projects"),
            log_max_bytes: LOG_MAX_BYTES,
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.storage_dir.join("config.json")
    }

    pub fn cache_path(&self) -> PathBuf {
        self.storage_dir.join("cache.json")
    }

    pub fn log_path(&self) -> PathBuf {
        self.storage_dir.join("sync.log")
    }
}
