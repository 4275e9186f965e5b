//! dirshare
//!
//! Password-protected sharing of one directory tree over HTTP.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use server::config::{default_config_path, Config};
use server::files::{DirectoryBrowser, ManifestBuilder, PathSandbox};
use server::launcher::open_in_browser;
use server::orchestrator::{share_urls, ServerEvent, ShareServer};
use tracing_subscriber::EnvFilter;

/// dirshare - share a directory with browsers on your network.
#[derive(Parser, Debug)]
#[command(name = "dirshare")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write logs to this file
    #[arg(long, global = true, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Serve the share until interrupted
    Start {
        /// Open the share in a local browser once listening
        #[arg(long)]
        open: bool,
    },

    /// List a directory inside the share
    List {
        /// Path relative to the share root
        #[arg(default_value = "")]
        path: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Print every file below a directory inside the share
    Manifest {
        /// Path relative to the share root
        #[arg(default_value = "")]
        path: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Write a default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long, short)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);

    // Load configuration
    let mut config = Config::load(&config_path)?;

    // Apply environment variable overrides
    config.apply_env_overrides();

    let _log_guard = init_tracing(&cli, &config)?;
    tracing::debug!("Using config file: {:?}", config_path);

    match cli.command {
        Commands::Start { open } => {
            config.validate()?;
            run(config, open).await?;
        }
        Commands::List { path, json } => {
            let browser = offline_browser(&config)?;
            let dir = browser.sandbox().resolve(&path)?;
            let listing = browser.list(&dir)?;

            if json {
                let response = protocol::ListResponse {
                    path: dir.relative().to_string(),
                    parent: protocol::messages::parent_path(dir.relative()),
                    dirs: listing.dirs.iter().map(|e| e.to_protocol()).collect(),
                    files: listing.files.iter().map(|e| e.to_protocol()).collect(),
                };
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                for entry in &listing.dirs {
                    println!("{}/", entry.name);
                }
                for entry in &listing.files {
                    println!("{}", entry.name);
                }
            }
        }
        Commands::Manifest { path, json } => {
            let browser = offline_browser(&config)?;
            let dir = browser.sandbox().resolve(&path)?;
            let manifest = ManifestBuilder::new(browser).build(&dir)?;

            if json {
                let response = protocol::ManifestResponse {
                    files: manifest.into_inner(),
                };
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                for file in manifest.iter() {
                    println!("{}", file);
                }
            }
        }
        Commands::InitConfig { force } => {
            init_config(&config_path, force)?;
            println!("Wrote configuration to {}", config_path.display());
        }
    }

    Ok(())
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `--verbose`, which wins over the configured level.
/// The returned guard flushes the log file on drop.
fn init_tracing(
    cli: &Cli,
    config: &Config,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let level = if cli.verbose {
        "debug"
    } else {
        config.server.log_level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match &cli.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            Ok(None)
        }
    }
}

/// Browser for the offline commands. The root must already exist.
fn offline_browser(config: &Config) -> anyhow::Result<DirectoryBrowser> {
    let sandbox = PathSandbox::new(&config.share.root)
        .with_context(|| format!("Cannot open share root {}", config.share.root.display()))?
        .allow_hidden(config.share.include_hidden);
    Ok(DirectoryBrowser::new(sandbox).follow_symlinks(config.share.follow_symlinks))
}

fn init_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {} (use --force to overwrite)",
            path.display()
        );
    }
    Config::default().save(path)
}

/// Serve until SIGINT or SIGTERM.
async fn run(config: Config, open: bool) -> anyhow::Result<()> {
    let mut server = ShareServer::new(config)?;

    // Subscribe to server events for logging
    let mut events = server.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ServerEvent::StateChanged(state) => {
                    tracing::debug!("Server state: {:?}", state);
                }
                ServerEvent::Listening { addr } => {
                    tracing::debug!("Listening on {}", addr);
                }
                ServerEvent::Error { message } => {
                    tracing::error!("Server error: {}", message);
                }
            }
        }
    });

    server.start().await?;

    if open {
        if let Some(url) = server.local_addr().and_then(|addr| share_urls(addr).into_iter().next()) {
            open_in_browser(&url);
        }
    }

    wait_for_shutdown_signal().await?;
    tracing::info!("Received shutdown signal");

    server.stop().await?;

    Ok(())
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to register SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to register SIGINT handler")?;

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM");
        }
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT");
        }
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> anyhow::Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")
}
