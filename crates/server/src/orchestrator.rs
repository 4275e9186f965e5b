//! Server lifecycle.
//!
//! This module provides the `ShareServer` that builds the shared state from
//! configuration, binds the HTTP listener and runs it until stopped.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::web::{self, AppState};

/// Server state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Initial state, not listening.
    Stopped,
    /// Binding the listener.
    Starting,
    /// Accepting requests.
    Running,
    /// Draining in-flight requests.
    ShuttingDown,
}

/// Events emitted by the server.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// Server state changed.
    StateChanged(ServerState),
    /// The listener is bound.
    Listening { addr: SocketAddr },
    /// Error occurred.
    Error { message: String },
}

/// Owns the HTTP listener and the state shared by its handlers.
pub struct ShareServer {
    /// Configuration.
    config: Config,
    /// Handler state, fixed for the lifetime of the server.
    app: Arc<AppState>,
    /// Current state.
    state: Arc<RwLock<ServerState>>,
    /// Bound address while running.
    local_addr: Option<SocketAddr>,
    /// The `axum::serve` task.
    serve_task: Option<JoinHandle<std::io::Result<()>>>,
    /// Cancellation token for graceful shutdown.
    shutdown_token: CancellationToken,
    /// Event sender.
    event_tx: broadcast::Sender<ServerEvent>,
}

impl ShareServer {
    /// Creates a new server, creating the share root if it is missing.
    pub fn new(config: Config) -> Result<Self> {
        let app = AppState::from_config(&config).with_context(|| {
            format!(
                "Failed to prepare share root: {}",
                config.share.root.display()
            )
        })?;

        info!(root = %app.sandbox.root().display(), "Sharing directory");

        let (event_tx, _) = broadcast::channel(64);

        Ok(Self {
            config,
            app: Arc::new(app),
            state: Arc::new(RwLock::new(ServerState::Stopped)),
            local_addr: None,
            serve_task: None,
            shutdown_token: CancellationToken::new(),
            event_tx,
        })
    }

    /// Returns the current state.
    pub async fn state(&self) -> ServerState {
        *self.state.read().await
    }

    /// Returns a receiver for server events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.event_tx.subscribe()
    }

    /// Returns the handler state.
    pub fn app(&self) -> &Arc<AppState> {
        &self.app
    }

    /// Address the listener is bound to, while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Binds the listener and starts serving.
    pub async fn start(&mut self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if *state != ServerState::Stopped {
                anyhow::bail!("Server is already running");
            }
            *state = ServerState::Starting;
        }
        self.emit_event(ServerEvent::StateChanged(ServerState::Starting));

        let addr = match self.bind_addr() {
            Ok(addr) => addr,
            Err(e) => return self.fail_start(e).await,
        };
        let listener = match TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))
        {
            Ok(listener) => listener,
            Err(e) => return self.fail_start(e).await,
        };
        let local_addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => return self.fail_start(e.into()).await,
        };
        self.local_addr = Some(local_addr);
        self.emit_event(ServerEvent::Listening { addr: local_addr });

        if self.shutdown_token.is_cancelled() {
            self.shutdown_token = CancellationToken::new();
        }
        let shutdown = self.shutdown_token.clone().cancelled_owned();
        let router = web::router(Arc::clone(&self.app));
        let event_tx = self.event_tx.clone();

        self.serve_task = Some(tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown)
                .await;
            if let Err(e) = &result {
                error!("HTTP server failed: {}", e);
                let _ = event_tx.send(ServerEvent::Error {
                    message: e.to_string(),
                });
            }
            result
        }));

        {
            let mut state = self.state.write().await;
            *state = ServerState::Running;
        }
        self.emit_event(ServerEvent::StateChanged(ServerState::Running));

        for url in share_urls(local_addr) {
            info!("Share available at {}", url);
        }

        Ok(())
    }

    /// Stops accepting requests and waits for in-flight ones to finish.
    pub async fn stop(&mut self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if *state != ServerState::Running {
                warn!("Server is not running, nothing to stop");
                return Ok(());
            }
            *state = ServerState::ShuttingDown;
        }
        self.emit_event(ServerEvent::StateChanged(ServerState::ShuttingDown));
        info!("Stopping server...");

        self.shutdown_token.cancel();

        if let Some(task) = self.serve_task.take() {
            match task.await {
                Ok(Ok(())) => debug!("HTTP server task finished"),
                Ok(Err(e)) => warn!("HTTP server exited with error: {}", e),
                Err(e) => warn!("HTTP server task panicked: {}", e),
            }
        }
        self.local_addr = None;

        {
            let mut state = self.state.write().await;
            *state = ServerState::Stopped;
        }
        self.emit_event(ServerEvent::StateChanged(ServerState::Stopped));
        info!("Server stopped");

        Ok(())
    }

    /// Returns the shutdown token for external tasks to observe shutdown.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    fn bind_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .config
            .server
            .bind
            .parse()
            .with_context(|| format!("Invalid bind address: {}", self.config.server.bind))?;
        Ok(SocketAddr::new(ip, self.config.server.port))
    }

    async fn fail_start(&self, e: anyhow::Error) -> Result<()> {
        *self.state.write().await = ServerState::Stopped;
        self.emit_event(ServerEvent::Error {
            message: format!("{e:#}"),
        });
        self.emit_event(ServerEvent::StateChanged(ServerState::Stopped));
        Err(e)
    }

    /// Emits a server event.
    fn emit_event(&self, event: ServerEvent) {
        let _ = self.event_tx.send(event);
    }
}

/// URLs under which the share can be reached.
///
/// A wildcard bind is announced on loopback and on the primary LAN address.
pub fn share_urls(addr: SocketAddr) -> Vec<String> {
    let port = addr.port();
    if !addr.ip().is_unspecified() {
        return vec![format!("http://{}", addr)];
    }

    let mut urls = vec![format!("http://127.0.0.1:{port}")];
    if let Some(ip) = lan_ipv4() {
        urls.push(format!("http://{ip}:{port}"));
    }
    urls
}

/// Primary LAN IPv4 address, as chosen by the routing table.
///
/// Connecting a UDP socket sends nothing; it only selects a source address.
fn lan_ipv4() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect((Ipv4Addr::new(192, 0, 2, 1), 80)).ok()?;
    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(ip) if !ip.is_loopback() && !ip.is_unspecified() => Some(ip),
        _ => None,
    }
}
