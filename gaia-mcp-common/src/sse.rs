//! SSE transport binding.
//!
//! Each `GET /sse?apiKey=...` opens one session:
//!
//! 1. a fresh session id is generated and the credential is persisted in the
//!    [`SessionStore`];
//! 2. a pair of channels is registered under the id in the live-transport
//!    index, and a session-bound clone of the handler is served over them;
//! 3. the response streams an `endpoint` event followed by one `message` event
//!    per outbound JSON-RPC message.
//!
//! `POST /messages?sessionId=...` looks the id up in the index and queues the
//! body for that session's protocol connection. When the event stream is
//! dropped (client disconnect or server shutdown) the index entry and the
//! stored session are removed.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use dashmap::DashMap;
use futures::StreamExt;
use rmcp::ServiceExt;
use rmcp::model::{ClientJsonRpcMessage, ServerJsonRpcMessage};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::{CancellationToken, PollSender};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::server::SessionHandler;
use crate::session::{SessionData, SessionStore};

/// Event-stream endpoint.
pub const SSE_PATH: &str = "/sse";

/// Message delivery endpoint.
pub const MESSAGE_PATH: &str = "/messages";

/// Body of `GET /`.
pub const BANNER: &str =
    "This is the SSE MCP server of ProtoGaia. Check more: https://protogaia.com/";

const CHANNEL_CAPACITY: usize = 64;

type ClientSender = mpsc::Sender<ClientJsonRpcMessage>;

/// Shared state of the SSE binding.
#[derive(Clone)]
pub struct SseState<H> {
    handler: H,
    store: Arc<SessionStore>,
    transports: Arc<DashMap<String, ClientSender>>,
    shutdown: CancellationToken,
}

impl<H: SessionHandler> SseState<H> {
    /// Create the binding state for `handler`, persisting sessions in `store`.
    pub fn new(handler: H, store: Arc<SessionStore>) -> Self {
        Self {
            handler,
            store,
            transports: Arc::new(DashMap::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// The session store used by this binding.
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Number of currently open sessions.
    pub fn live_sessions(&self) -> usize {
        self.transports.len()
    }

    /// Whether a transport is registered under `session_id`.
    pub fn is_live(&self, session_id: &str) -> bool {
        self.transports.contains_key(session_id)
    }

    /// End every open event stream and drop every protocol connection.
    pub fn close_all(&self) {
        self.shutdown.cancel();
        self.transports.clear();
    }
}

/// Build the HTTP router for the SSE binding.
pub fn router<H: SessionHandler>(state: SseState<H>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route(SSE_PATH, get(connect::<H>))
        .route(MESSAGE_PATH, post(deliver::<H>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": BANNER }))
}

async fn health() -> &'static str {
    "OK"
}

/// Query of `GET /sse`.
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    #[serde(rename = "apiKey")]
    api_key: Option<String>,
}

/// Query of `POST /messages`.
#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

async fn connect<H: SessionHandler>(
    State(state): State<SseState<H>>,
    Query(query): Query<ConnectQuery>,
) -> Response {
    let Some(api_key) = query.api_key.filter(|key| !key.is_empty()) else {
        warn!("Rejected SSE connection without API key");
        return (StatusCode::BAD_REQUEST, "API key is required").into_response();
    };

    let session_id = Uuid::new_v4().to_string();
    info!(session_id = %session_id, "New SSE connection established");

    state
        .store
        .save(&session_id, SessionData::new(session_id.clone(), api_key))
        .await;

    let (client_tx, client_rx) = mpsc::channel::<ClientJsonRpcMessage>(CHANNEL_CAPACITY);
    let (server_tx, server_rx) = mpsc::channel::<ServerJsonRpcMessage>(CHANNEL_CAPACITY);
    state.transports.insert(session_id.clone(), client_tx);

    let handler = state.handler.bind_session(&session_id);
    let transport = (PollSender::new(server_tx), ReceiverStream::new(client_rx));
    tokio::spawn(serve_session(handler, transport, session_id.clone()));

    let guard = SessionGuard {
        session_id: session_id.clone(),
        transports: state.transports.clone(),
        store: state.store.clone(),
    };

    let endpoint = Event::default()
        .event("endpoint")
        .data(format!("{MESSAGE_PATH}?sessionId={session_id}"));
    let messages = ReceiverStream::new(server_rx).map(message_event);

    let stream = futures::stream::once(async move { endpoint })
        .chain(messages)
        .map(move |event| {
            let _open = &guard;
            Ok::<Event, Infallible>(event)
        })
        .take_until(state.shutdown.clone().cancelled_owned());

    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}

async fn deliver<H: SessionHandler>(
    State(state): State<SseState<H>>,
    Query(query): Query<MessageQuery>,
    body: Bytes,
) -> Response {
    let sender = query
        .session_id
        .as_deref()
        .and_then(|id| state.transports.get(id).map(|entry| entry.value().clone()));
    let Some(sender) = sender else {
        warn!(session_id = ?query.session_id, "Session not found for message");
        return (StatusCode::NOT_FOUND, "Session not found").into_response();
    };

    let message: ClientJsonRpcMessage = match serde_json::from_slice(&body) {
        Ok(message) => message,
        Err(e) => {
            debug!(error = %e, "Rejected malformed message");
            return (StatusCode::BAD_REQUEST, format!("Invalid message: {e}")).into_response();
        }
    };

    if sender.send(message).await.is_err() {
        warn!(session_id = ?query.session_id, "Session closed before message was delivered");
        return (StatusCode::NOT_FOUND, "Session not found").into_response();
    }

    (StatusCode::ACCEPTED, "Accepted").into_response()
}

fn message_event(message: ServerJsonRpcMessage) -> Event {
    match Event::default().event("message").json_data(&message) {
        Ok(event) => event,
        Err(e) => {
            error!(error = %e, "Failed to encode outbound message");
            Event::default().comment("dropped unencodable message")
        }
    }
}

async fn serve_session<H: SessionHandler>(
    handler: H,
    transport: (
        PollSender<ServerJsonRpcMessage>,
        ReceiverStream<ClientJsonRpcMessage>,
    ),
    session_id: String,
) {
    match handler.serve(transport).await {
        Ok(service) => match service.waiting().await {
            Ok(reason) => debug!(session_id = %session_id, ?reason, "MCP session ended"),
            Err(e) => warn!(session_id = %session_id, error = %e, "MCP session task failed"),
        },
        Err(e) => {
            warn!(session_id = %session_id, error = %e, "MCP session failed to initialize")
        }
    }
}

/// Lives as long as the event stream of one session.
struct SessionGuard {
    session_id: String,
    transports: Arc<DashMap<String, ClientSender>>,
    store: Arc<SessionStore>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.transports.remove(&self.session_id);

        let session_id = std::mem::take(&mut self.session_id);
        let store = self.store.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    store.remove(&session_id).await;
                    info!(session_id = %session_id, "SSE connection closed");
                });
            }
            Err(_) => {
                warn!(
                    session_id = %session_id,
                    "No runtime to delete session data; relying on TTL"
                );
            }
        }
    }
}
