//! Server startup integration tests.
//!
//! Tests that the Gaia server can be instantiated from the real configuration
//! path, provides correct server info and binds its tools exactly once.

use std::sync::Arc;

use gaia_mcp_common::config::Config;
use gaia_mcp_common::session::SessionStore;
use gaia_mcp_server::{GaiaServer, tools};

/// Test configuration built the way the binary builds it, minus the process environment.
fn test_config(vars: &[(&str, &str)]) -> Config {
    let vars: Vec<(String, String)> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Config::builder()
        .with_lookup(|name| {
            vars.iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        })
        .unwrap()
        .build()
}

fn test_server(config: Config) -> GaiaServer {
    GaiaServer::new(
        config,
        Arc::new(SessionStore::in_memory()),
        tools::builtin().unwrap(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use gaia_mcp_common::config::{DEFAULT_API_URL, DEFAULT_PORT};
    use gaia_mcp_common::server::SessionHandler;
    use gaia_mcp_common::session::SessionData;
    use gaia_mcp_server::CredentialSource;
    use rmcp::ServerHandler;

    #[test]
    fn test_gaia_server_startup() {
        let server = test_server(test_config(&[("GAIA_API_KEY", "k1")]));
        let info = server.get_info();

        assert_eq!(info.server_info.name, "GaiaMcpServer");
        let instructions = info.instructions.as_ref().unwrap().to_lowercase();
        assert!(
            instructions.contains("image"),
            "Server instructions should mention 'image'"
        );
    }

    #[test]
    fn test_server_has_tools_capability_only() {
        let server = test_server(test_config(&[]));
        let info = server.get_info();
        assert!(info.capabilities.tools.is_some());
        assert!(info.capabilities.resources.is_none());
        assert!(info.capabilities.prompts.is_none());
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = test_config(&[]);
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.api_key, None);
        assert_eq!(config.redis_url, None);
    }

    #[test]
    fn test_environment_reaches_the_server() {
        let server = test_server(test_config(&[
            ("GAIA_API_URL", "https://staging.example.test"),
            ("PORT", "4100"),
        ]));
        assert_eq!(server.config().api_url, "https://staging.example.test");
        assert_eq!(server.config().port, 4100);
    }

    #[test]
    fn test_tools_bound_once_across_sessions() {
        let server = test_server(test_config(&[]));
        server.prepare();
        for i in 0..10 {
            let session = server.bind_session(&format!("s{i}"));
            session.prepare();
            assert_eq!(session.register_tools().len(), 6);
        }
        assert_eq!(server.registrations(), 1);
    }

    #[tokio::test]
    async fn test_session_credential_overrides_default() {
        let store = Arc::new(SessionStore::in_memory());
        store.save("s1", SessionData::new("s1", "kA")).await;
        let server = GaiaServer::new(
            test_config(&[("GAIA_API_KEY", "k1")]),
            store,
            tools::builtin().unwrap(),
        );

        let stdio = server.resolve_context("upload-image").await;
        assert_eq!(stdio.api_credential(), Some("k1"));

        let sse = server.bind_session("s1").resolve_context("upload-image").await;
        assert_eq!(sse.api_credential(), Some("kA"));
        assert_eq!(sse.api_base_url(), DEFAULT_API_URL);

        let resolved = gaia_mcp_server::resolve_credential(None, None);
        assert_eq!(resolved.source, CredentialSource::None);
    }
}
