//! pickroute CLI: the main entry point.
//!
//! Commands:
//! - `onboard`    Write a default config
//! - `daemon`     Scheduler + dispatcher + gateway
//! - `sync`       Run one sync for a venue and print the report
//! - `resolve`    Explain how a storage location resolves for a venue
//! - `schedules`  Show each venue's schedule trigger
//! - `token seed` Store a refresh token for outbound auth

use clap::{Parser, Subcommand};

mod commands;
mod runtime;

#[derive(Parser)]
#[command(
    name = "pickroute",
    about = "pickroute: assigns unassigned catalog items to picking areas",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "PICKROUTE_JSON_LOGS")]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration
    Onboard,

    /// Start the scheduler and, when enabled, the HTTP gateway
    Daemon,

    /// Run one sync for a venue
    Sync {
        /// Venue id
        venue: String,

        /// Log write-backs instead of sending them
        #[arg(long)]
        dry_run: bool,
    },

    /// Show how a storage location resolves for a venue
    Resolve {
        /// Venue id
        venue: String,

        /// Raw storage location, e.g. "BAR-1-2 (top)/KITCHEN-3"
        location: String,
    },

    /// Show every venue's schedule trigger
    Schedules,

    /// Manage the outbound OAuth token
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
}

#[derive(Subcommand)]
enum TokenAction {
    /// Store a refresh token; the next remote call exchanges it
    Seed {
        #[arg(env = "PICKROUTE_REFRESH_TOKEN", hide_env_values = true)]
        refresh_token: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Daemon => commands::daemon::run().await?,
        Commands::Sync { venue, dry_run } => commands::sync::run(venue, dry_run).await?,
        Commands::Resolve { venue, location } => commands::resolve::run(venue, location).await?,
        Commands::Schedules => commands::schedules::run().await?,
        Commands::Token { action } => match action {
            TokenAction::Seed { refresh_token } => commands::token::seed(refresh_token).await?,
        },
    }

    Ok(())
}
