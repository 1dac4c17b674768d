//! Input parameter validation tests.
//!
//! For any tool invocation with invalid parameters, the server returns an MCP
//! `invalid_params` error naming the offending field, and the upstream API is
//! never contacted.

use std::sync::Arc;

use gaia_mcp_common::config::Config;
use gaia_mcp_common::session::SessionStore;
use gaia_mcp_server::{GaiaServer, tools};
use rmcp::model::JsonObject;
use serde_json::Value;

/// Server whose upstream URL points at `api_url`.
fn server(api_url: &str) -> GaiaServer {
    let config = Config::builder()
        .api_url(Some(api_url.to_string()))
        .api_key(Some("k1".to_string()))
        .build();
    GaiaServer::new(
        config,
        Arc::new(SessionStore::in_memory()),
        tools::builtin().unwrap(),
    )
}

fn object(value: Value) -> JsonObject {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rmcp::model::ErrorCode;
    use serde_json::json;
    use wiremock::MockServer;

    /// A minimal valid argument set for every builtin tool.
    fn valid_args(tool: &str) -> JsonObject {
        object(match tool {
            "upload-image" => json!({ "imageUrls": ["https://cdn/1.png"] }),
            "create-style" => json!({ "imageUrls": ["https://cdn/1.png"], "name": "s" }),
            "generate-image" => json!({ "prompt": "a cat" }),
            "remix" | "face-enhancer" | "upscaler" => json!({ "image": "https://cdn/1.png" }),
            other => panic!("unknown tool {other}"),
        })
    }

    #[test]
    fn test_valid_args_pass_validation() {
        let registry = tools::builtin().unwrap();
        for tool in registry.iter() {
            assert!(tool.validate(&valid_args(tool.name())).is_ok(), "{}", tool.name());
        }
    }

    #[test]
    fn test_each_required_field_is_enforced() {
        let registry = tools::builtin().unwrap();
        for tool in registry.iter() {
            for param in tool.params().iter().filter(|p| p.required) {
                let mut args = valid_args(tool.name());
                args.remove(param.name.as_ref());

                let errors = tool.validate(&args).unwrap_err();
                assert!(
                    errors
                        .iter()
                        .any(|e| e.field == param.name && e.message == "is required"),
                    "{}: {:?}",
                    tool.name(),
                    errors
                );
            }
        }
    }

    #[test]
    fn test_array_elements_are_checked() {
        let registry = tools::builtin().unwrap();
        let upload = registry.get("upload-image").unwrap();

        let errors = upload
            .validate(&object(json!({ "imageUrls": ["https://cdn/1.png", 7] })))
            .unwrap_err();
        assert_eq!(errors[0].field, "imageUrls");
        assert_eq!(errors[0].message, "expected array of string");
    }

    #[tokio::test]
    async fn test_invalid_call_never_reaches_the_upstream() {
        let api = MockServer::start().await;
        let server = server(&api.uri());

        let err = server
            .invoke("create-style", object(json!({ "imageUrls": "https://cdn/1.png" })))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
        assert!(err.message.contains("imageUrls"), "{}", err.message);
        assert!(err.message.contains("name"), "{}", err.message);

        assert!(api.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upscale_ratio_out_of_range() {
        let api = MockServer::start().await;
        let server = server(&api.uri());

        for ratio in [0.5, 4.5, -1.0] {
            let err = server
                .invoke(
                    "upscaler",
                    object(json!({ "image": "https://cdn/1.png", "ratio": ratio })),
                )
                .await
                .unwrap_err();
            assert_eq!(err.code, ErrorCode::INVALID_PARAMS, "ratio {ratio}");
            assert!(err.message.contains("ratio"), "{}", err.message);
        }

        assert!(api.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let server = server("http://127.0.0.1:9");
        let err = server
            .invoke("generate-video", JsonObject::new())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
    }

    fn non_string() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<i64>().prop_map(Value::from),
            any::<bool>().prop_map(Value::from),
            Just(json!([])),
            Just(json!({})),
        ]
    }

    proptest! {
        #[test]
        fn non_string_prompts_are_rejected(prompt in non_string()) {
            let registry = tools::builtin().unwrap();
            let tool = registry.get("generate-image").unwrap();

            let errors = tool.validate(&object(json!({ "prompt": prompt }))).unwrap_err();
            prop_assert_eq!(errors.len(), 1);
            prop_assert_eq!(errors[0].field.as_str(), "prompt");
            prop_assert_eq!(errors[0].message.as_str(), "expected string");
        }

        #[test]
        fn undeclared_arguments_are_ignored(key in "[a-z]{1,8}", value in non_string()) {
            prop_assume!(key != "prompt" && key != "aspectRatio" && key != "style");
            let registry = tools::builtin().unwrap();
            let tool = registry.get("generate-image").unwrap();

            let mut args = valid_args("generate-image");
            args.insert(key, value);
            prop_assert!(tool.validate(&args).is_ok());
        }
    }
}
