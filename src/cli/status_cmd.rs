use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::{control, Colorize};

use crate::cli::output::OutputOptions;
use crate::core::api::widget_url;
use crate::core::formatter::format_sync_age;
use crate::core::settings::Settings;
use crate::core::store::SyncStore;
use crate::core::sync_log::SyncLog;

/// Show registration details and when the last sync happened.
pub fn run(settings: &Settings, opts: &OutputOptions) -> Result<()> {
    control::set_override(opts.use_color);
    println!("{}\n", "claude-stats Status".bold());

    let store = SyncStore::new(settings);
    let config = store.read_config().filter(|c| !c.public_id.is_empty());

    let Some(config) = config else {
        println!("Registration: {}", "Not registered".yellow());
        println!("Run \"claude-stats setup\" to register.");
        return Ok(());
    };

    println!("Registration: {}", "Registered".green());
    println!("Public ID:    {}", config.public_id);
    println!("API URL:      {}", settings.api_url);
    println!(
        "Widget:       {}",
        widget_url(&settings.api_url, &config.public_id)
    );

    let last_sync = store
        .last_sync_time()
        .and_then(DateTime::<Utc>::from_timestamp_millis);
    match (store.last_sync_date(), last_sync) {
        (Some(date), Some(at)) => println!(
            "Last sync:    {} ({})",
            date.format("%Y-%m-%d"),
            format_sync_age(&at, &Utc::now()).as_str().dimmed()
        ),
        _ => println!("Last sync:    {}", "Never".dimmed()),
    }

    if opts.verbose {
        println!("Storage:      {}", settings.storage_dir.display());
        println!("Session logs: {}", settings.projects_dir.display());
        println!("Sync log:     {}", SyncLog::new(settings).path().display());
    }

    Ok(())
}
