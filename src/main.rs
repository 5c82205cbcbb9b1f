use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod archive;
mod broadcast;
mod config;
mod error;
mod models;
mod pipeline;
mod report;
mod server;
mod watcher;

use broadcast::Broadcaster;
use config::Config;
use pipeline::Pipeline;
use server::AppState;
use watcher::InboxWatcher;

#[derive(Parser)]
#[command(name = "inbox-report")]
#[command(about = "Turns student schedule JSON dropped into an inbox into spreadsheet reports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the inbox, build reports and stream notifications
    Serve {
        #[arg(long, env = "INBOX_REPORT_ROOT", default_value = ".")]
        root: PathBuf,
        #[arg(long, env = "HOST", default_value = "127.0.0.1")]
        host: String,
        #[arg(long, env = "PORT", default_value_t = 3000)]
        port: u16,
    },
    /// Convert a single JSON file into a report without archiving it
    Convert {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { root, host, port } => {
            let config = Config::new(&root, &host, port)?;
            config
                .ensure_directories()
                .await
                .context("error creating directories")?;
            info!("Directories created or verified");

            let broadcaster = Broadcaster::new();
            let pipeline = Pipeline::new(&config, broadcaster.clone());
            let (_watcher, mut arrivals) = InboxWatcher::start(&config.inbox)?;
            info!(inbox = %config.inbox.display(), "watching for new files");

            tokio::spawn(async move {
                while let Some(path) = arrivals.recv().await {
                    let pipeline = pipeline.clone();
                    tokio::spawn(async move { pipeline.handle(path).await });
                }
            });

            server::serve(config.addr, AppState { broadcaster }).await?;
        }
        Commands::Convert { input, out_dir } => {
            tokio::fs::create_dir_all(&out_dir)
                .await
                .with_context(|| format!("failed to create {}", out_dir.display()))?;
            let generated = pipeline::generate_report(&input, &out_dir, Utc::now()).await?;
            println!("Report written to {}.", generated.path.display());
        }
    }

    Ok(())
}
