//! Dino Duel
//!
//! `relay` runs the lobby relay server. `peer` joins a lobby and plays from
//! stdin commands, logging frames and sounds.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use tracing::info;
use tracing_subscriber::EnvFilter;

use dino_duel::{
    VERSION,
    network::{peer, relay::{RelayConfig, RelayServer}, session::SessionConfig},
};

#[derive(Parser)]
#[command(name = "dino-duel", version)]
#[command(about = "Two-player lockstep endless runner")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the lobby relay server
    Relay {
        /// Bind address (overrides the config file)
        #[arg(long)]
        bind: Option<SocketAddr>,
        /// JSON relay configuration
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Join a lobby and play from stdin
    Peer {
        /// Relay base URL
        #[arg(long, default_value = "ws://127.0.0.1:2222")]
        url: String,
        /// Lobby to join
        #[arg(long)]
        lobby: i64,
        /// JSON session configuration
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn load_config<T: DeserializeOwned + Default>(path: Option<&Path>) -> anyhow::Result<T> {
    let Some(path) = path else {
        return Ok(T::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Dino Duel v{}", VERSION);

    match Cli::parse().command {
        Command::Relay { bind, config } => {
            let mut config: RelayConfig = load_config(config.as_deref())?;
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }

            let server = RelayServer::new(config);
            tokio::select! {
                result = server.run() => result?,
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, shutting down");
                    server.shutdown();
                }
            }
        }
        Command::Peer { url, lobby, config } => {
            let config: SessionConfig = load_config(config.as_deref())?;
            peer::run(&url, lobby, config).await?;
        }
    }

    Ok(())
}
