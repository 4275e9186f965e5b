//! HTTP surface of the share.
//!
//! Exposes listing, manifest and download operations over axum routes. Every
//! route except login and logout sits behind the session gate.

pub mod error;
pub mod handlers;
pub mod pages;

use std::sync::Arc;

use axum::middleware;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::SessionGate;
use crate::config::Config;
use crate::files::{DirectoryBrowser, FileTransfer, ManifestBuilder, PathSandbox, SandboxError};

pub use error::ApiError;

/// Immutable state shared by all handlers.
#[derive(Debug)]
pub struct AppState {
    pub sandbox: PathSandbox,
    pub browser: DirectoryBrowser,
    pub manifests: ManifestBuilder,
    pub transfer: FileTransfer,
    pub gate: SessionGate,
}

impl AppState {
    /// Assemble the state from its parts.
    pub fn new(sandbox: PathSandbox, gate: SessionGate) -> Self {
        let browser = DirectoryBrowser::new(sandbox.clone());
        Self {
            manifests: ManifestBuilder::new(browser.clone()),
            browser,
            sandbox,
            transfer: FileTransfer::new(),
            gate,
        }
    }

    /// Build the state from configuration, creating the share root if needed.
    pub fn from_config(config: &Config) -> Result<Self, SandboxError> {
        let sandbox = PathSandbox::ensure_root(&config.share.root)?
            .allow_hidden(config.share.include_hidden);
        let browser =
            DirectoryBrowser::new(sandbox.clone()).follow_symlinks(config.share.follow_symlinks);

        Ok(Self {
            manifests: ManifestBuilder::new(browser.clone()),
            browser,
            sandbox,
            transfer: FileTransfer::new().with_chunk_size(config.share.chunk_size),
            gate: SessionGate::new(&config.auth.password, config.auth.cookie_name.clone()),
        })
    }
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/", get(handlers::index))
        .route("/browse", get(handlers::browse))
        .route("/api/list", get(handlers::api_list))
        .route("/api/folder-files", get(handlers::folder_files))
        .route("/download", get(handlers::download))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            handlers::require_session,
        ));

    Router::new()
        .route("/login", get(handlers::login_page).post(handlers::login))
        .route("/logout", get(handlers::logout))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
