//! MCP transport selection.
//!
//! Two transport bindings are supported:
//!
//! - **Stdio**: one implicit peer over stdin/stdout. No sessions; every call
//!   uses the credential supplied at process start.
//! - **SSE**: many concurrent HTTP-held peers, each identified by a generated
//!   session id and carrying its own credential.

use std::fmt;

/// Transport mode for MCP server communication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    /// Standard input/output transport (default).
    #[default]
    Stdio,
    /// Server-Sent Events transport over HTTP.
    Sse {
        /// Port to listen on
        port: u16,
    },
}

impl Transport {
    /// Create a new stdio transport.
    pub fn stdio() -> Self {
        Transport::Stdio
    }

    /// Create a new SSE transport on the specified port.
    pub fn sse(port: u16) -> Self {
        Transport::Sse { port }
    }

    /// Check if this is a stdio transport.
    pub fn is_stdio(&self) -> bool {
        matches!(self, Transport::Stdio)
    }

    /// Check if this is an SSE transport.
    pub fn is_sse(&self) -> bool {
        matches!(self, Transport::Sse { .. })
    }

    /// Get the port if this is a network transport.
    pub fn port(&self) -> Option<u16> {
        match self {
            Transport::Stdio => None,
            Transport::Sse { port } => Some(*port),
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Stdio => write!(f, "stdio"),
            Transport::Sse { port } => write!(f, "sse (port {})", port),
        }
    }
}
