//! Command-line interface for anivault.
//!
//! Provides a thin operational surface over the offline content
//! manager: preserving episodes, cancelling transfers, and inspecting
//! the persisted pool.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::{broadcast, mpsc};

use crate::config;
use crate::content::{ContentRegistry, EpisodeContent};
use crate::domain::OfflineState;
use crate::manager::OfflineContentManager;
use crate::session::HttpDownloadSession;
use crate::store::JsonFileStore;

/// anivault - offline-content persistence engine
#[derive(Parser, Debug)]
#[command(name = "anivault")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download an episode and preserve it permanently
    Preserve {
        /// Resolved playable resource URL
        url: String,

        /// Source site the episode was resolved from
        #[arg(short, long)]
        source: String,

        /// Episode number within the source
        #[arg(short, long)]
        episode: u32,

        /// Display title (falls back to the source name)
        #[arg(short, long)]
        title: Option<String>,
    },

    /// Cancel an in-flight preservation
    Cancel {
        /// Content identifier (e.g. "demo-ep-42")
        identifier: String,
    },

    /// Show the state of one content item
    Status {
        /// Content identifier
        identifier: String,
    },

    /// List all tracked contents
    List,

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Preserve {
                url,
                source,
                episode,
                title,
            } => preserve_episode(&source, episode, title, &url).await,
            Commands::Cancel { identifier } => cancel_preservation(&identifier).await,
            Commands::Status { identifier } => show_status(&identifier).await,
            Commands::List => list_contents().await,
            Commands::Config => show_config(),
        }
    }
}

/// Assemble the manager over the configured store, session, and roots
async fn build_manager() -> Result<Arc<OfflineContentManager>> {
    let config = config::config()?;

    let store = JsonFileStore::open(config.store_path())
        .await
        .context("Failed to open the offline content store")?;

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let session = HttpDownloadSession::new(events_tx, &config.staging);

    let manager = Arc::new(OfflineContentManager::new(
        Arc::new(store),
        Arc::new(session),
        ContentRegistry::with_defaults(),
        config.storage_roots(),
    ));

    let _pump = manager.spawn_event_pump(events_rx);
    manager
        .restore_at_startup()
        .await
        .context("Failed to restore persisted contents")?;

    Ok(manager)
}

/// Preserve one episode, following its transitions until terminal
async fn preserve_episode(
    source: &str,
    episode: u32,
    title: Option<String>,
    url: &str,
) -> Result<()> {
    let manager = build_manager().await?;

    let content = manager
        .content_for(Box::new(EpisodeContent::new(
            source,
            episode,
            title.unwrap_or_default(),
            url,
        )))
        .await;
    let identifier = content.lock().await.identifier().to_string();

    let mut changes = manager.subscribe();
    manager.initiate_preservation(&identifier).await;

    loop {
        let change = match changes.recv().await {
            Ok(change) => change,
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => {
                anyhow::bail!("Notification channel closed before completion")
            }
        };

        if change.identifier != identifier {
            continue;
        }

        match change.state {
            OfflineState::Preserving { progress } => {
                eprintln!("  {:>3.0}%", progress * 100.0);
            }
            OfflineState::Preserved => {
                let content = content.lock().await;
                if let Some(location) = content.location() {
                    println!("{}", location.resolve(manager.roots()).display());
                }
                eprintln!("[{} preserved]", identifier);
                return Ok(());
            }
            OfflineState::Error { message } => {
                anyhow::bail!("Preservation of {} failed: {}", identifier, message);
            }
            _ => {}
        }
    }
}

/// Cancel preservation for an identifier
async fn cancel_preservation(identifier: &str) -> Result<()> {
    let manager = build_manager().await?;
    manager.cancel_preservation(identifier).await;
    println!("{}: {}", identifier, manager.state_for(identifier).await);
    Ok(())
}

/// Show the state of one content item
async fn show_status(identifier: &str) -> Result<()> {
    let manager = build_manager().await?;

    println!("Identifier: {}", identifier);
    println!("State: {}", manager.state_for(identifier).await);

    if let Some(entry) = manager.lookup(identifier).await {
        let entry = entry.lock().await;
        if let Some(location) = entry.location() {
            println!("Location: {}", location.resolve(manager.roots()).display());
        }
    }

    Ok(())
}

/// List all tracked contents with their states
async fn list_contents() -> Result<()> {
    let manager = build_manager().await?;
    let identifiers = manager.tracked_identifiers().await;

    if identifiers.is_empty() {
        println!("No offline contents tracked.");
        return Ok(());
    }

    for identifier in identifiers {
        println!("{:<24} {}", identifier, manager.state_for(&identifier).await);
    }

    Ok(())
}

/// Show resolved configuration
fn show_config() -> Result<()> {
    let config = config::config()?;

    println!("Home: {}", config.home.display());
    println!("Library: {}", config.library.display());
    println!("Staging: {}", config.staging.display());
    println!("Store: {}", config.store_path().display());
    match &config.config_file {
        Some(path) => println!("Config file: {}", path.display()),
        None => println!("Config file: (none, using defaults)"),
    }

    Ok(())
}
