//! MCP server orchestrator.
//!
//! [`GaiaServer`] owns the tool registry and binds it to the protocol once.
//! Every call is validated against the tool's parameter descriptors, gets a
//! fresh [`InvocationContext`] carrying the resolved credential, and is then
//! handed to the tool adapter.
//!
//! The SSE binding serves one clone per connection, produced by
//! [`SessionHandler::bind_session`]; clones share all state and differ only in
//! the session id used for credential lookup.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use gaia_mcp_common::config::Config;
use gaia_mcp_common::error::Error;
use gaia_mcp_common::server::SessionHandler;
use gaia_mcp_common::session::SessionStore;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    model::{CallToolResult, JsonObject, ListToolsResult, ServerCapabilities, ServerInfo},
};
use tracing::{Instrument, debug, field, info, info_span, warn};

use crate::adapter;
use crate::context::{CredentialSource, InvocationContext, resolve_credential};
use crate::registry::ToolRegistry;

/// Name reported to clients during initialization.
pub const SERVER_NAME: &str = "GaiaMcpServer";

struct Shared {
    config: Config,
    store: Arc<SessionStore>,
    registry: ToolRegistry,
    bound: OnceLock<Vec<rmcp::model::Tool>>,
    registrations: AtomicUsize,
}

/// MCP server exposing the Gaia tools.
#[derive(Clone)]
pub struct GaiaServer {
    shared: Arc<Shared>,
    session_id: Option<String>,
}

impl std::fmt::Debug for GaiaServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GaiaServer")
            .field("session_id", &self.session_id)
            .field("tools", &self.shared.registry.names())
            .finish()
    }
}

impl GaiaServer {
    /// Create a server for `registry`, resolving session credentials from `store`.
    pub fn new(config: Config, store: Arc<SessionStore>, registry: ToolRegistry) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                store,
                registry,
                bound: OnceLock::new(),
                registrations: AtomicUsize::new(0),
            }),
            session_id: None,
        }
    }

    /// Configuration the server was started with.
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// Session this handler serves, if any.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Bind every registered tool to the protocol, once.
    ///
    /// Later calls, from this handler or any clone, return the same bindings.
    pub fn register_tools(&self) -> &[rmcp::model::Tool] {
        self.shared.bound.get_or_init(|| {
            self.shared.registrations.fetch_add(1, Ordering::SeqCst);
            let tools: Vec<rmcp::model::Tool> =
                self.shared.registry.iter().map(|tool| tool.to_mcp()).collect();
            info!(count = tools.len(), "Registered tools");
            tools
        })
    }

    /// How many times tool registration actually ran.
    pub fn registrations(&self) -> usize {
        self.shared.registrations.load(Ordering::SeqCst)
    }

    /// Build the context for one call of `tool`.
    pub async fn resolve_context(&self, tool: &str) -> InvocationContext {
        let session_credential = match &self.session_id {
            Some(session_id) => match self.shared.store.load(session_id).await {
                Some(session) => Some(session.api_key),
                None => {
                    warn!(session_id = %session_id, "No stored credential for session");
                    None
                }
            },
            None => None,
        };

        let default_credential = self.shared.config.api_key.as_deref();
        let resolved = resolve_credential(session_credential, default_credential);
        if resolved.source == CredentialSource::None {
            warn!(tool, "No API credential available");
        }

        let span = info_span!("tool", tool = %tool, session_id = field::Empty);
        if let Some(session_id) = &self.session_id {
            span.record("session_id", session_id.as_str());
        }
        debug!(parent: &span, source = ?resolved.source, "Resolved credential");

        InvocationContext::with_span(&self.shared.config.api_url, resolved.credential, span)
    }

    /// Validate `args`, resolve the context and run the tool named `name`.
    pub async fn invoke(&self, name: &str, args: JsonObject) -> Result<CallToolResult, McpError> {
        self.register_tools();

        let tool = self
            .shared
            .registry
            .get(name)
            .ok_or_else(|| McpError::invalid_params(format!("Unknown tool: {}", name), None))?;

        if let Err(errors) = tool.validate(&args) {
            let details: Vec<String> = errors.iter().map(ToString::to_string).collect();
            return Err(McpError::invalid_params(
                format!("Invalid parameters: {}", details.join("; ")),
                None,
            ));
        }

        let ctx = self.resolve_context(name).await;
        let span = ctx.span().clone();
        async {
            info!("Tool called");
            let result = adapter::invoke(tool.handler(), args, ctx).await;
            if let Err(e) = &result {
                warn!(error = %e, "Tool failed");
            }
            result
        }
        .instrument(span)
        .await
        .map_err(to_mcp_error)
    }
}

fn to_mcp_error(err: Error) -> McpError {
    match err {
        Error::Validation(message) => McpError::invalid_params(message, None),
        other => McpError::internal_error(other.to_string(), None),
    }
}

impl SessionHandler for GaiaServer {
    fn prepare(&self) {
        self.register_tools();
    }

    fn bind_session(&self, session_id: &str) -> Self {
        Self {
            shared: self.shared.clone(),
            session_id: Some(session_id.to_string()),
        }
    }
}

impl ServerHandler for GaiaServer {
    fn get_info(&self) -> ServerInfo {
        let mut info = ServerInfo {
            instructions: Some(
                "Image generation tools for the ProtoGaia platform. \
                 Use generate-image to create images from a prompt, remix, face-enhancer and \
                 upscaler to transform existing images, and upload-image or create-style to \
                 bring your own images."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        };
        info.server_info.name = SERVER_NAME.to_string();
        info.server_info.version = env!("CARGO_PKG_VERSION").to_string();
        info
    }

    fn list_tools(
        &self,
        _params: Option<rmcp::model::PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        async move {
            Ok(ListToolsResult {
                tools: self.register_tools().to_vec(),
                next_cursor: None,
                meta: None,
            })
        }
    }

    fn call_tool(
        &self,
        params: rmcp::model::CallToolRequestParam,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        async move {
            let args = params.arguments.unwrap_or_default();
            self.invoke(&params.name, args).await
        }
    }
}
