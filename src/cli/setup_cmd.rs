use anyhow::Result;
use colored::{control, Colorize};

use crate::cli::output::OutputOptions;
use crate::core::api::{widget_url, HttpStatsApi};
use crate::core::formatter::format_tokens;
use crate::core::settings::Settings;
use crate::core::sync::{Orchestrator, SetupOutcome};

/// Register with the stats service and upload the full history.
pub async fn run(settings: &Settings, opts: &OutputOptions) -> Result<()> {
    control::set_override(opts.use_color);
    println!("{}\n", "claude-stats Setup".bold());

    let orchestrator = Orchestrator::new(settings, HttpStatsApi::new(&settings.api_url));
    if !orchestrator.store().is_registered() {
        println!("Registering with {}...", settings.api_url);
    }

    let outcome = match orchestrator.full_sync().await {
        Ok(o) => o,
        Err(e) => {
            eprintln!("{} {}", "Setup failed:".red(), e);
            std::process::exit(1);
        }
    };

    match outcome {
        SetupOutcome::AlreadyRegistered(config) => {
            println!("{}", "Already registered!".yellow());
            println!("Public ID: {}", config.public_id);
            println!(
                "Widget URL: {}",
                widget_url(&settings.api_url, &config.public_id)
            );
            println!(
                "\nTo re-register, delete {} and run setup again.",
                settings.storage_dir.display()
            );
        }
        SetupOutcome::Registered {
            registration,
            records,
            total_tokens,
        } => {
            let widget = registration
                .widget_url
                .clone()
                .unwrap_or_else(|| widget_url(&settings.api_url, &registration.public_id));

            println!(
                "Uploaded {} records ({} tokens)\n",
                records,
                format_tokens(total_tokens)
            );
            println!("{}\n", "Setup complete!".green().bold());
            println!("Public ID: {}", registration.public_id);
            println!("Widget URL: {}", widget);
            println!("\nAdd this to your GitHub README:");
            println!("  ![Claude Stats]({})", widget);
        }
    }

    Ok(())
}
