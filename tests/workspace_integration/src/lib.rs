//! Workspace-level integration tests for the Gaia MCP server.
//!
//! These tests verify:
//! - The server starts correctly and binds its tools once
//! - Tool registration and schema generation
//! - Property-based tests for tool schema validity, input validation, and output format

pub mod server_startup;
pub mod tool_schema;
pub mod input_validation;
pub mod output_format;
