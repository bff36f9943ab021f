//! ares-tm - Artist credit track manager
//!
//! Resolves artist credits of MP3 files, syncs them with the artist
//! customization store, and writes the resolved credits back to the files.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use ares_common::config::{resolve_config, ConfigOverrides};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ares_tm::services::{CustomizationClient, Id3TagSynchronizer};
use ares_tm::workflow::TrackManager;

/// Command-line arguments for ares-tm
#[derive(Parser, Debug)]
#[command(name = "ares-tm")]
#[command(about = "Resolve and sync artist credits of MP3 files")]
#[command(version)]
struct Args {
    /// Configuration file (default: <config dir>/ares/ares.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Customization store host
    #[arg(long, global = true)]
    host: Option<String>,

    /// Customization store port
    #[arg(long, global = true)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show resolved credits and the artist table
    Show {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Reconcile artists with the store and write resolved credits
    Sync {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Resolve and report without writing to the store or files
        #[arg(long)]
        dry_run: bool,

        /// Overwrite existing original title/artist fields
        #[arg(long)]
        overwrite_original: bool,
    },
    /// Check customization store availability
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = resolve_config(&ConfigOverrides {
        config_path: args.config.clone(),
        host: args.host.clone(),
        port: args.port,
    })
    .context("Failed to resolve configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    format!("ares_tm={0},ares_common={0}", config.log_level).into()
                }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        store = %config.store.base_url(),
        concurrency = config.concurrency,
        "Starting ares-tm {}",
        env!("CARGO_PKG_VERSION")
    );

    let store = Arc::new(
        CustomizationClient::new(&config.store).context("Failed to create store client")?,
    );
    let mut manager = TrackManager::new(
        store,
        Arc::new(Id3TagSynchronizer::new()),
        config.concurrency,
    );

    match args.command {
        Command::Health => {
            if manager.server_health().await {
                println!("Customization store at {} is available", config.store.base_url());
            } else {
                bail!("Customization store at {} is unavailable", config.store.base_url());
            }
        }
        Command::Show { files } => {
            load(&mut manager, &files).await?;
            print_tracks(&manager);
            print_artists(&manager);
        }
        Command::Sync {
            files,
            dry_run,
            overwrite_original,
        } => {
            if !manager.server_health().await {
                bail!("Customization store at {} is unavailable", config.store.base_url());
            }
            load(&mut manager, &files).await?;

            if dry_run {
                print_tracks(&manager);
                print_artists(&manager);
                info!("Dry run, nothing written");
                return Ok(());
            }

            let report = manager.send_changes().await;
            for failure in &report.failures {
                eprintln!("error: {}", failure);
            }
            for reassigned in report.reassigned() {
                warn!(
                    name = %reassigned.name,
                    previous_id = ?reassigned.reassigned_from,
                    adopted_id = ?reassigned.remote_id,
                    "Artist identity reassigned by name"
                );
            }

            manager.replace_original_title(overwrite_original);
            manager.replace_original_artist(overwrite_original);
            let written = manager.save_files().await?;

            println!(
                "{} artists reconciled ({} store writes, {} failed), {} files written",
                report.entities.len(),
                report.writes(),
                report.failures.len(),
                written
            );
            if !report.is_success() {
                bail!("{} artists failed to reconcile", report.failures.len());
            }
        }
    }

    Ok(())
}

async fn load(manager: &mut TrackManager, files: &[PathBuf]) -> Result<()> {
    let report = manager.load_files(files).await.context("Failed to load files")?;
    for (path, malformed) in &report.malformed {
        warn!(path = %path.display(), error = %malformed, "Skipped relation record");
    }

    let hydration = manager.load_customizations().await;
    for failure in &hydration.failures {
        warn!(error = %failure, "Customizations unavailable for artist");
    }
    Ok(())
}

fn print_tracks(manager: &TrackManager) {
    for track in manager.tracks() {
        println!("{}", track.file_path().display());
        println!("  title:    {}", track.title().unwrap_or(""));
        println!("  artist:   {}", track.formatted_artist());
        println!("  resolved: {}", track.formatted_new_artist());
        if let Some(product) = track.product() {
            println!("  franchise: {}", product);
        }
    }
}

fn print_artists(manager: &TrackManager) {
    println!();
    println!(
        "{:<10} {:<30} {:<30} {:<10} {:<8} REMOTE",
        "KEY", "NAME", "CUSTOM NAME", "TYPE", "INCLUDE"
    );
    for artist in manager.artists() {
        let details = artist.snapshot();
        let key: String = artist.key().as_str().chars().take(8).collect();
        println!(
            "{:<10} {:<30} {:<30} {:<10} {:<8} {}",
            key,
            details.name,
            details.custom_name,
            format!("{:?}", details.kind),
            details.include,
            details
                .remote_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string())
        );
    }
}
