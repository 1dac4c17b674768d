//! Gaia MCP Server
//!
//! MCP server exposing ProtoGaia image generation tools over stdio or SSE.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use gaia_mcp_common::tracing::init_tracing_with_default;
use gaia_mcp_common::{McpServerBuilder, SessionStore};
use gaia_mcp_server::cli::{Args, Command};
use gaia_mcp_server::{GaiaServer, tools};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Fails before anything is bound when stdio has no usable --api-key
    let config = args.command.config_builder()?.with_env()?.build();

    init_tracing_with_default(&config.log_level);
    tracing::info!("gaia-mcp-server starting...");

    let transport = args.command.transport(&config);
    let store = match args.command {
        Command::Stdio { .. } => SessionStore::in_memory(),
        Command::Sse { .. } => SessionStore::connect(config.redis_url.as_deref()).await,
    };
    let store = Arc::new(store);

    tracing::info!(
        api_url = %config.api_url,
        has_default_key = config.api_key.is_some(),
        "Configuration loaded"
    );

    let server = GaiaServer::new(config, store.clone(), tools::builtin()?);

    McpServerBuilder::new(server)
        .with_transport(transport)
        .with_session_store(store)
        .run()
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
