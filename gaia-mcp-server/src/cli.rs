//! Command-line interface of the `gaia-mcp-server` binary.

use clap::{Parser, Subcommand};
use gaia_mcp_common::config::{Config, ConfigBuilder};
use gaia_mcp_common::error::ConfigError;
use gaia_mcp_common::transport::Transport;

/// Command-line arguments for the Gaia server.
#[derive(Parser, Debug)]
#[command(name = "gaia-mcp-server")]
#[command(about = "MCP server for ProtoGaia image generation", version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

/// Transport to serve.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Serve a single client over stdin/stdout.
    Stdio {
        /// Base URL of the ProtoGaia API
        #[arg(long)]
        api_url: Option<String>,

        /// ProtoGaia API key used for every call
        #[arg(long)]
        api_key: Option<String>,
    },
    /// Serve many clients over HTTP with Server-Sent Events.
    Sse {
        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,
    },
}

impl Command {
    /// Configuration builder seeded with this command's flags.
    ///
    /// # Errors
    /// Returns `ConfigError::MissingValue` when `stdio` is given no
    /// `--api-key`, or an empty one. The environment never stands in for it.
    pub fn config_builder(&self) -> Result<ConfigBuilder, ConfigError> {
        match self {
            Command::Stdio { api_url, api_key } => {
                let api_key = api_key
                    .as_deref()
                    .map(str::trim)
                    .filter(|key| !key.is_empty())
                    .ok_or_else(|| ConfigError::missing_value("API key (--api-key)"))?;
                Ok(Config::builder()
                    .api_url(api_url.clone())
                    .api_key(Some(api_key.to_string())))
            }
            Command::Sse { port } => Ok(Config::builder().port(*port)),
        }
    }

    /// Transport binding for this command under `config`.
    pub fn transport(&self, config: &Config) -> Transport {
        match self {
            Command::Stdio { .. } => Transport::stdio(),
            Command::Sse { .. } => Transport::sse(config.port),
        }
    }
}
