//! Bosswatch: boss respawn timer daemon.
//!
//! Subcommands:
//! - `daemon`: run the reminder loop with a console command adapter

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod console;
mod daemon;

#[derive(Parser)]
#[command(name = "bosswatch")]
#[command(about = "Boss respawn timer daemon", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the timer daemon (reminder loop, console commands)
    Daemon {
        /// Directory holding the timer snapshot
        #[arg(long, env = "BOSSWATCH_DATA_DIR", default_value = "data")]
        data_dir: PathBuf,

        /// Bot configuration file (JSON)
        #[arg(long, env = "BOSSWATCH_CONFIG", default_value = "config.json")]
        config: PathBuf,

        /// Entity catalog file (JSON)
        #[arg(long, env = "BOSSWATCH_CATALOG", default_value = "bosses.json")]
        catalog: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "bosswatch=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Daemon {
            data_dir,
            config,
            catalog,
        } => daemon::run(&data_dir, &config, &catalog).await,
    }
}
