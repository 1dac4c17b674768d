//! Gaia MCP Server Library
//!
//! Exposes ProtoGaia image operations (upload, style creation, generation,
//! remix, face enhancement, upscaling) as MCP tools.

pub mod adapter;
pub mod cli;
pub mod client;
pub mod context;
pub mod registry;
pub mod server;
pub mod tools;

pub use adapter::{ToolHandler, ToolOutput};
pub use client::ApiClient;
pub use context::{CredentialSource, InvocationContext, resolve_credential};
pub use registry::{ParamKind, ParamSpec, RegistryError, Tool, ToolRegistry};
pub use server::GaiaServer;
