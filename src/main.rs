mod cli;
mod core;

use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::core::settings::Settings;
use crate::core::store::SyncStore;
use crate::core::sync_log::SyncLog;

#[derive(Parser)]
#[command(
    name = "claude-stats",
    about = "Track your Claude Code usage on GitHub",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Incremental sync (used by the Claude Code hook)
    #[arg(long)]
    sync: bool,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    /// Verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Register and do the initial full sync
    Setup,
    /// Show registration status
    Status,
    /// Incremental sync of recently modified sessions
    Sync,
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "claude_stats=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = Settings::from_env();
    SyncStore::new(&settings).migrate_legacy();

    let output_opts = cli::output::OutputOptions {
        use_color: cli::output::detect_color(!cli.no_color),
        verbose: cli.verbose,
    };

    match cli.command {
        Some(Commands::Setup) => cli::setup_cmd::run(&settings, &output_opts).await?,
        Some(Commands::Status) => cli::status_cmd::run(&settings, &output_opts)?,
        Some(Commands::Sync) => run_hook_sync(&settings).await,
        None if cli.sync => run_hook_sync(&settings).await,
        None => Cli::command().print_help()?,
    }

    Ok(())
}

/// Hook mode never surfaces errors on the console; they land in the sync log.
async fn run_hook_sync(settings: &Settings) {
    if let Err(e) = cli::sync_cmd::run(settings).await {
        SyncLog::new(settings).error("Uncaught error", &e);
        std::process::exit(1);
    }
}
