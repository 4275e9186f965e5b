//! # dirshare Server Library
//!
//! This crate serves a single directory tree over HTTP, behind a shared
//! password, to browsers on the local network.
//!
//! ## Overview
//!
//! - **Path sandboxing**: every client-supplied path is resolved against the
//!   share root and rejected if it would leave it
//! - **Browsing**: sorted directory listings, as HTML or JSON
//! - **Manifests**: recursive file lists that drive batch downloads
//! - **Streaming**: downloads of any size in bounded memory
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                    ShareServer                       │
//! ├──────────────────────────────────────────────────────┤
//! │  ┌───────────────┐   axum router   ┌──────────────┐  │
//! │  │  SessionGate  │ ──────────────▶ │   handlers   │  │
//! │  └───────────────┘                 └──────┬───────┘  │
//! │                                           │          │
//! │  ┌───────────┐ ┌──────────────┐ ┌─────────▼──────┐   │
//! │  │ Directory │ │   Manifest   │ │  FileTransfer  │   │
//! │  │  Browser  │ │   Builder    │ │                │   │
//! │  └─────┬─────┘ └──────┬───────┘ └────────┬───────┘   │
//! │        └──────────────┼──────────────────┘           │
//! │                ┌──────▼──────┐                       │
//! │                │ PathSandbox │                       │
//! │                └─────────────┘                       │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use server::{Config, ShareServer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut config = Config::load_default()?;
//!     config.auth.password = "hunter2".to_string();
//!
//!     let mut server = ShareServer::new(config)?;
//!     server.start().await?;
//!
//!     // Serve until interrupted...
//!
//!     server.stop().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and defaults
//! - [`files`]: Path sandbox, listings, manifests and streaming
//! - [`auth`]: Password session gate
//! - [`web`]: HTTP routes and pages
//! - [`orchestrator`]: Listener lifecycle
//! - [`launcher`]: Opening the share in a local browser

pub mod auth;
pub mod config;
pub mod files;
pub mod launcher;
pub mod orchestrator;
pub mod web;

// Re-export protocol for convenience
pub use protocol;

// Re-export config types for convenience
pub use config::{Config, ConfigError};

// Re-export files types for convenience
pub use files::{
    DirectoryBrowser, DirectoryEntry, FileTransfer, Listing, Manifest, ManifestBuilder,
    PathSandbox, ResolvedPath,
};

pub use auth::SessionGate;

// Re-export server types for convenience
pub use orchestrator::{ServerEvent, ServerState, ShareServer};
pub use web::{router, AppState};
