//! MCP server runner.
//!
//! [`McpServerBuilder`] wires a [`SessionHandler`] to one of the transport
//! bindings and runs it until the peer goes away or a shutdown signal arrives.
//!
//! On shutdown the session store releases its primary connection first, then
//! the protocol connections are closed, and only then does [`run`] return.
//!
//! ```ignore
//! use gaia_mcp_common::server::McpServerBuilder;
//! use gaia_mcp_common::transport::Transport;
//!
//! McpServerBuilder::new(handler)
//!     .with_transport(Transport::sse(3000))
//!     .with_session_store(store)
//!     .run()
//!     .await?;
//! ```
//!
//! [`run`]: McpServerBuilder::run

use std::sync::Arc;

use rmcp::service::RoleServer;
use rmcp::transport::IntoTransport;
use rmcp::{ServerHandler, ServiceExt};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::session::SessionStore;
use crate::sse::{self, SseState};
use crate::transport::Transport;

/// Errors that can occur when running an MCP server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to the specified port
    #[error("Failed to bind to port {port}: {message}")]
    BindFailed { port: u16, message: String },

    /// Transport error during communication
    #[error("Transport error: {0}")]
    Transport(String),
}

/// A protocol handler that can serve many sessions.
///
/// The SSE binding calls [`bind_session`](Self::bind_session) once per
/// connection and serves the returned clone, so every request handled by that
/// clone knows which session it belongs to.
pub trait SessionHandler: ServerHandler + Clone + Send + Sync + 'static {
    /// Prepare the handler before the first connection is accepted.
    ///
    /// Must be safe to call more than once.
    fn prepare(&self) {}

    /// A handler sharing all state with `self`, bound to `session_id`.
    fn bind_session(&self, session_id: &str) -> Self;
}

/// Builder for configuring and running MCP servers.
pub struct McpServerBuilder<H> {
    handler: H,
    transport: Transport,
    store: Option<Arc<SessionStore>>,
    shutdown_rx: Option<oneshot::Receiver<()>>,
}

impl<H: SessionHandler> McpServerBuilder<H> {
    /// Create a new server builder with the given handler.
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            transport: Transport::default(),
            store: None,
            shutdown_rx: None,
        }
    }

    /// Set the transport mode for the server.
    pub fn with_transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }

    /// Use `store` for session persistence.
    ///
    /// Without one, the SSE binding keeps sessions in memory.
    pub fn with_session_store(mut self, store: Arc<SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set a shutdown signal receiver for graceful shutdown.
    ///
    /// When the sender is dropped or a message is sent, the server
    /// will initiate graceful shutdown. Without one, SIGINT and SIGTERM
    /// are used.
    pub fn with_shutdown(mut self, shutdown_rx: oneshot::Receiver<()>) -> Self {
        self.shutdown_rx = Some(shutdown_rx);
        self
    }

    /// Run the MCP server with the configured transport.
    ///
    /// Returns once the server has shut down.
    pub async fn run(self) -> Result<(), ServerError> {
        info!(transport = %self.transport, "Starting MCP server");
        self.handler.prepare();

        match self.transport {
            Transport::Stdio => self.run_stdio().await,
            Transport::Sse { port } => self.run_sse(port).await,
        }
    }

    async fn run_stdio(self) -> Result<(), ServerError> {
        self.run_peer(rmcp::transport::io::stdio()).await
    }

    /// Serve the single peer behind `io` until it disconnects or shutdown is requested.
    pub(crate) async fn run_peer<T, E, A>(self, io: T) -> Result<(), ServerError>
    where
        T: IntoTransport<RoleServer, E, A>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let Self {
            handler,
            store,
            shutdown_rx,
            ..
        } = self;

        let shutdown = shutdown_signal(shutdown_rx);
        tokio::pin!(shutdown);

        let service = tokio::select! {
            service = handler.serve(io) => {
                service.map_err(|e| ServerError::Transport(e.to_string()))?
            }
            _ = &mut shutdown => {
                info!("Received shutdown signal before the peer initialized");
                release_store(store.as_deref()).await;
                info!("Server closed");
                return Ok(());
            }
        };
        let connection = service.cancellation_token();

        tokio::select! {
            result = service.waiting() => {
                result.map_err(|e| ServerError::Transport(e.to_string()))?;
                info!("Peer disconnected");
            }
            _ = &mut shutdown => {
                info!("Received shutdown signal, stopping server");
                release_store(store.as_deref()).await;
                connection.cancel();
            }
        }

        info!("Server closed");
        Ok(())
    }

    async fn run_sse(self, port: u16) -> Result<(), ServerError> {
        let Self {
            handler,
            store,
            shutdown_rx,
            ..
        } = self;

        let store = store.unwrap_or_default();
        let state = SseState::new(handler, store.clone());
        let app = sse::router(state.clone());

        let tcp_listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
            .await
            .map_err(|e| ServerError::BindFailed {
                port,
                message: e.to_string(),
            })?;

        info!(port, "SSE server listening");

        let shutdown = async move {
            shutdown_signal(shutdown_rx).await;
            info!("Shutting down...");
            release_store(Some(store.as_ref())).await;
            state.close_all();
        };

        axum::serve(tcp_listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Transport(e.to_string()))?;

        info!("Server closed");
        Ok(())
    }
}

async fn release_store(store: Option<&SessionStore>) {
    if let Some(store) = store {
        store.quit().await;
    }
}

async fn shutdown_signal(shutdown_rx: Option<oneshot::Receiver<()>>) {
    match shutdown_rx {
        Some(rx) => {
            let _ = rx.await;
        }
        None => wait_for_shutdown_signal().await,
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
pub async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                    _ = sigint.recv() => info!("Received SIGINT"),
                }
                return;
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "Failed to register signal handlers; waiting for Ctrl+C");
            }
        }
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C"),
        Err(e) => {
            warn!(error = %e, "Failed to listen for Ctrl+C; shutdown signals are unavailable");
            std::future::pending::<()>().await;
        }
    }
}

/// Create a channel for triggering shutdown programmatically.
///
/// Pass the receiver to [`McpServerBuilder::with_shutdown`].
pub fn shutdown_channel() -> (oneshot::Sender<()>, oneshot::Receiver<()>) {
    oneshot::channel()
}
