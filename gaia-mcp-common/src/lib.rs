//! Gaia MCP Common Library
//!
//! Shared configuration, error handling, tracing, session persistence and
//! transport bindings for the Gaia MCP server.

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;
pub mod error;
pub mod server;
pub mod session;
pub mod sse;
pub mod tracing;
pub mod transport;


pub use config::Config;
pub use error::{ConfigError, Error, Result};
pub use server::{McpServerBuilder, ServerError, SessionHandler, shutdown_channel};
pub use session::{SessionData, SessionStore};
pub use transport::Transport;
