//! Per-call invocation context and credential resolution.

use gaia_mcp_common::error::Result;
use tracing::Span;

use crate::client::ApiClient;

/// Where the credential for a call came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Stored for the caller's session when it connected.
    Session,
    /// Configured for the whole process.
    Default,
    /// Nothing available; the upstream API is called unauthenticated.
    None,
}

/// Result of [`resolve_credential`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCredential {
    pub credential: Option<String>,
    pub source: CredentialSource,
}

/// Pick the credential for one call.
///
/// Precedence: the session's stored credential, then the process default.
/// Empty strings count as absent.
pub fn resolve_credential(
    session_credential: Option<String>,
    default_credential: Option<&str>,
) -> ResolvedCredential {
    if let Some(credential) = session_credential.filter(|c| !c.is_empty()) {
        return ResolvedCredential {
            credential: Some(credential),
            source: CredentialSource::Session,
        };
    }

    match default_credential.filter(|c| !c.is_empty()) {
        Some(credential) => ResolvedCredential {
            credential: Some(credential.to_string()),
            source: CredentialSource::Default,
        },
        None => ResolvedCredential {
            credential: None,
            source: CredentialSource::None,
        },
    }
}

/// Configuration injected into a tool handler for a single call.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    api_base_url: String,
    api_credential: Option<String>,
    span: Span,
}

impl InvocationContext {
    /// Create a context whose span is scoped to `tool`.
    pub fn new(
        api_base_url: impl Into<String>,
        api_credential: Option<String>,
        tool: &str,
    ) -> Self {
        Self::with_span(
            api_base_url,
            api_credential,
            tracing::info_span!("tool", tool = %tool),
        )
    }

    /// Create a context that logs under `span`.
    pub fn with_span(
        api_base_url: impl Into<String>,
        api_credential: Option<String>,
        span: Span,
    ) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            api_credential,
            span,
        }
    }

    /// Base URL of the ProtoGaia API for this call.
    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    /// API key for this call, if one was resolved.
    pub fn api_credential(&self) -> Option<&str> {
        self.api_credential.as_deref()
    }

    /// Span scoping every log line of this call.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Upstream API client bound to this call's URL and credential.
    pub fn api_client(&self) -> Result<ApiClient> {
        ApiClient::new(&self.api_base_url, self.api_credential.clone())
    }
}
