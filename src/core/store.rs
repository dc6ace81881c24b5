use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::core::models::state::{LegacyState, SyncCache, SyncConfig};
use crate::core::settings::Settings;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Local sync state: `config.json` (credentials) and `cache.json` (last sync time).
///
/// The strict `load_*` readers report what went wrong; the lenient `read_*`
/// readers treat a missing or corrupt document as absent, since that is
/// normal on first run or after an interrupted write.
#[derive(Debug, Clone)]
pub struct SyncStore {
    config_path: PathBuf,
    cache_path: PathBuf,
    legacy_path: PathBuf,
    interval: Duration,
}

impl SyncStore {
    pub fn new(settings: &Settings) -> Self {
        Self {
            config_path: settings.config_path(),
            cache_path: settings.cache_path(),
            legacy_path: settings.legacy_state_file.clone(),
            interval: settings.sync_interval,
        }
    }

    // ── Config ────────────────────────────────────────────────────────

    pub fn load_config(&self) -> Result<Option<SyncConfig>, StoreError> {
        load_document(&self.config_path)
    }

    pub fn read_config(&self) -> Option<SyncConfig> {
        self.load_config().unwrap_or_else(|err| {
            tracing::debug!(error = %err, "Ignoring unreadable config");
            None
        })
    }

    pub fn write_config(&self, config: &SyncConfig) -> Result<(), StoreError> {
        write_document(&self.config_path, config)
    }

    /// Credentials are present and neither is empty.
    pub fn is_registered(&self) -> bool {
        self.read_config().is_some_and(|c| c.is_complete())
    }

    // ── Cache ─────────────────────────────────────────────────────────

    pub fn load_cache(&self) -> Result<Option<SyncCache>, StoreError> {
        load_document(&self.cache_path)
    }

    pub fn read_cache(&self) -> SyncCache {
        self.load_cache()
            .unwrap_or_else(|err| {
                tracing::debug!(error = %err, "Ignoring unreadable cache");
                None
            })
            .unwrap_or_default()
    }

    pub fn write_cache(&self, cache: &SyncCache) -> Result<(), StoreError> {
        write_document(&self.cache_path, cache)
    }

    /// Epoch milliseconds of the last sync. Zero counts as never synced.
    pub fn last_sync_time(&self) -> Option<i64> {
        self.read_cache().last_sync_time.filter(|t| *t != 0)
    }

    /// UTC calendar day of the last sync.
    pub fn last_sync_date(&self) -> Option<NaiveDate> {
        let ms = self.last_sync_time()?;
        DateTime::<Utc>::from_timestamp_millis(ms).map(|dt| dt.date_naive())
    }

    pub fn should_sync(&self) -> bool {
        self.should_sync_at(Utc::now())
    }

    /// True when never synced or at least one interval has passed since the last sync.
    pub fn should_sync_at(&self, now: DateTime<Utc>) -> bool {
        match self.last_sync_time() {
            None => true,
            Some(last) => {
                now.timestamp_millis().saturating_sub(last) >= self.interval.as_millis() as i64
            }
        }
    }

    pub fn update_sync_time(&self) -> Result<(), StoreError> {
        self.update_sync_time_at(Utc::now())
    }

    /// Stamp `lastSyncTime`, keeping any other cache fields intact.
    pub fn update_sync_time_at(&self, now: DateTime<Utc>) -> Result<(), StoreError> {
        let mut cache = self.read_cache();
        cache.last_sync_time = Some(now.timestamp_millis());
        self.write_cache(&cache)
    }

    // ── Legacy migration ──────────────────────────────────────────────

    /// Move credentials out of the pre-folder state file, then delete it.
    ///
    /// Returns whether a migration happened. Any failure means "nothing to
    /// migrate"; the legacy file is left where it was.
    pub fn migrate_legacy(&self) -> bool {
        if !self.legacy_path.exists() {
            return false;
        }
        match self.try_migrate_legacy() {
            Ok(()) => {
                tracing::info!(path = %self.legacy_path.display(), "Migrated legacy state");
                true
            }
            Err(err) => {
                tracing::debug!(error = %err, "Legacy state not migrated");
                false
            }
        }
    }

    fn try_migrate_legacy(&self) -> Result<(), StoreError> {
        let legacy: LegacyState = load_document(&self.legacy_path)?.ok_or_else(|| {
            StoreError::Io {
                path: self.legacy_path.clone(),
                source: std::io::ErrorKind::NotFound.into(),
            }
        })?;

        let config = SyncConfig {
            write_token: legacy.write_token.unwrap_or_default(),
            public_id: legacy.public_id.unwrap_or_default(),
        };
        if config.is_complete() {
            self.write_config(&config)?;
        }

        std::fs::remove_file(&self.legacy_path).map_err(|source| StoreError::Io {
            path: self.legacy_path.clone(),
            source,
        })
    }
}

/// Read a JSON document. A missing file is `Ok(None)`.
fn load_document<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

/// Pretty-print `value` over whatever is at `path`, creating the parent directory.
fn write_document<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })
}
