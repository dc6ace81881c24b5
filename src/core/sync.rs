use std::path::PathBuf;
use thiserror::Error;

use crate::core::api::{ApiError, Registration, StatsApi};
use crate::core::models::record::UsageRecord;
use crate::core::models::state::SyncConfig;
use crate::core::settings::Settings;
use crate::core::store::{StoreError, SyncStore};
use crate::core::usage::extractor;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Register(ApiError),
    #[error(transparent)]
    Upload(ApiError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug)]
pub enum SetupOutcome {
    /// Credentials already exist; nothing was contacted or written.
    AlreadyRegistered(SyncConfig),
    Registered {
        registration: Registration,
        records: usize,
        total_tokens: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Last sync is younger than the interval.
    NotDue,
    NotRegistered,
    /// Nothing changed since the last sync; the timestamp still advanced.
    NothingNew,
    Uploaded { records: usize, total_tokens: u64 },
}

fn total_tokens(records: &[UsageRecord]) -> u64 {
    records
        .iter()
        .map(UsageRecord::total_tokens)
        .fold(0u64, u64::saturating_add)
}

/// Drives setup (full sync) and hook (incremental sync) runs against a stats service.
pub struct Orchestrator<A> {
    api: A,
    store: SyncStore,
    projects_dir: PathBuf,
}

impl<A: StatsApi> Orchestrator<A> {
    pub fn new(settings: &Settings, api: A) -> Self {
        Self {
            api,
            store: SyncStore::new(settings),
            projects_dir: settings.projects_dir.clone(),
        }
    }

    pub fn store(&self) -> &SyncStore {
        &self.store
    }

    /// Register, then upload every record found under the projects directory.
    ///
    /// Credentials are persisted before the upload. If the upload fails they
    /// stay on disk while the cache is never written, so a rerun reports
    /// "already registered" and the initial upload is not retried.
    pub async fn full_sync(&self) -> Result<SetupOutcome, SyncError> {
        if let Some(config) = self.store.read_config().filter(SyncConfig::is_complete) {
            return Ok(SetupOutcome::AlreadyRegistered(config));
        }

        let registration = self.api.register().await.map_err(SyncError::Register)?;
        self.store.write_config(&SyncConfig {
            write_token: registration.write_token.clone(),
            public_id: registration.public_id.clone(),
        })?;
        tracing::info!(public_id = %registration.public_id, "Registered with stats service");

        let records = extractor::extract_all(&self.projects_dir);
        tracing::info!(records = records.len(), "Full extraction finished");

        let ack = self
            .api
            .sync_records(&registration.public_id, &registration.write_token, &records)
            .await
            .map_err(SyncError::Upload)?;
        tracing::debug!(success = ack.success, "Initial upload acknowledged");
        self.store.update_sync_time()?;

        Ok(SetupOutcome::Registered {
            records: records.len(),
            total_tokens: total_tokens(&records),
            registration,
        })
    }

    /// Upload usage from logs touched since the last sync.
    ///
    /// Returns quietly when the interval hasn't elapsed or there are no
    /// credentials. On upload failure the sync time is left alone so the next
    /// run retries from the same cutoff.
    pub async fn incremental_sync(&self) -> Result<SyncOutcome, SyncError> {
        if !self.store.should_sync() {
            return Ok(SyncOutcome::NotDue);
        }
        let config = match self.store.read_config().filter(SyncConfig::is_complete) {
            Some(c) => c,
            None => return Ok(SyncOutcome::NotRegistered),
        };

        let since_ms = self.store.last_sync_time().unwrap_or(0);
        let min_date = self
            .store
            .last_sync_date()
            .map(|d| d.format("%Y-%m-%d").to_string());

        let records =
            extractor::extract_modified(&self.projects_dir, since_ms, min_date.as_deref());
        if records.is_empty() {
            self.store.update_sync_time()?;
            return Ok(SyncOutcome::NothingNew);
        }
        tracing::info!(records = records.len(), "Uploading incremental records");

        let ack = self
            .api
            .sync_records(&config.public_id, &config.write_token, &records)
            .await
            .map_err(SyncError::Upload)?;
        tracing::debug!(success = ack.success, "Incremental upload acknowledged");
        self.store.update_sync_time()?;

        Ok(SyncOutcome::Uploaded {
            records: records.len(),
            total_tokens: total_tokens(&records),
        })
    }
}
