//! Tracing initialization for the Gaia MCP server.
//!
//! Logs always go to stderr: with the stdio transport, stdout carries the
//! protocol stream and must not see anything else.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Takes precedence over the configured level. Examples:
//!   - `RUST_LOG=debug` - Enable debug logging for all modules
//!   - `RUST_LOG=warn,gaia_mcp_common=debug` - Warn by default, debug for common
//! - `LOG_LEVEL`: Read through [`Config`](crate::config::Config) and passed in as the
//!   default level. `silent` disables logging.

use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    prelude::*,
};

/// Translate a configured level into an `EnvFilter` directive.
///
/// `silent` is accepted as an alias for `off`.
pub fn filter_directive(level: &str) -> &str {
    match level.trim() {
        "" => "info",
        "silent" => "off",
        other => other,
    }
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(default_level)))
}

/// Initialize tracing with a default level used when `RUST_LOG` is not set.
///
/// # Panics
///
/// Panics if a global subscriber is already installed.
pub fn init_tracing_with_default(default_level: &str) {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_span_events(FmtSpan::NONE);

    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(fmt_layer)
        .init();
}

/// Try to initialize tracing, returning an error if already initialized.
///
/// Unlike [`init_tracing_with_default`], this does not panic when a subscriber
/// is already set, which makes it safe to call from tests.
pub fn try_init_tracing(default_level: &str) -> Result<(), ()> {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_span_events(FmtSpan::NONE);

    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(fmt_layer)
        .try_init()
        .map_err(|_| ())
}
