use anyhow::Result;
use std::time::Instant;

use crate::core::api::HttpStatsApi;
use crate::core::formatter::format_tokens;
use crate::core::settings::Settings;
use crate::core::sync::{Orchestrator, SyncOutcome};
use crate::core::sync_log::SyncLog;

/// Incremental sync run by the Claude Code hook.
///
/// Prints nothing: progress and failures go to the sync log, and an upload
/// failure still exits cleanly so the next hook invocation can retry.
pub async fn run(settings: &Settings) -> Result<()> {
    let log = SyncLog::new(settings);
    let started = Instant::now();

    let orchestrator = Orchestrator::new(settings, HttpStatsApi::new(&settings.api_url));
    let outcome = match orchestrator.incremental_sync().await {
        Ok(SyncOutcome::NotDue | SyncOutcome::NotRegistered) => return Ok(()),
        Ok(o) => o,
        Err(e) => {
            log.sync_start();
            log.error("Sync failed", &e);
            return Ok(());
        }
    };

    log.sync_start();
    match outcome {
        SyncOutcome::Uploaded {
            records,
            total_tokens,
        } => log.log(&format!(
            "Synced {} records ({} tokens)",
            records,
            format_tokens(total_tokens)
        )),
        _ => log.log("No new records to sync"),
    }
    log.sync_complete(started.elapsed());

    Ok(())
}
