//! Output format tests.
//!
//! Every tool result is MCP content: a leading non-empty text item followed by
//! `image/png` items, with upstream failures reported as error results rather
//! than protocol errors.

use rmcp::model::{CallToolResult, Content, RawContent};

/// Validates that a CallToolResult has valid content format.
fn validate_tool_result(result: &CallToolResult) -> Result<(), String> {
    let first = result
        .content
        .first()
        .ok_or_else(|| "Result should have content".to_string())?;
    if !matches!(first.raw, RawContent::Text(_)) {
        return Err("First content item should be text".to_string());
    }

    for content in &result.content {
        validate_content(content)?;
    }

    Ok(())
}

/// Validates that a Content item has valid structure.
fn validate_content(content: &Content) -> Result<(), String> {
    match &content.raw {
        RawContent::Text(text_content) => {
            if text_content.text.is_empty() {
                return Err("Text content should not be empty".to_string());
            }
            Ok(())
        }
        RawContent::Image(image_content) => {
            if image_content.data.is_empty() {
                return Err("Image content should have data".to_string());
            }
            if image_content.mime_type != "image/png" {
                return Err(format!(
                    "Image content should be image/png, got: {}",
                    image_content.mime_type
                ));
            }
            Ok(())
        }
        other => Err(format!("Unexpected content type: {:?}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use gaia_mcp_common::config::Config;
    use gaia_mcp_common::session::SessionStore;
    use gaia_mcp_server::{GaiaServer, tools};
    use rmcp::model::JsonObject;
    use serde_json::{Value, json};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CREATE_TASK: &str = "/api/recipe/agi-tasks/create-task";

    async fn server_with(api: &MockServer) -> GaiaServer {
        let config = Config::builder()
            .api_url(Some(api.uri()))
            .api_key(Some("k1".to_string()))
            .build();
        GaiaServer::new(
            config,
            Arc::new(SessionStore::in_memory()),
            tools::builtin().unwrap(),
        )
    }

    async fn recipe_returns(body: Value, status: u16) -> MockServer {
        let api = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(CREATE_TASK))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&api)
            .await;
        api
    }

    fn object(value: Value) -> JsonObject {
        match value {
            Value::Object(map) => map,
            other => panic!("expected an object, got {other}"),
        }
    }

    fn text(result: &CallToolResult) -> &str {
        result.content[0].as_text().map(|t| t.text.as_str()).unwrap()
    }

    #[test]
    fn test_validate_content() {
        assert!(validate_content(&Content::text("ok")).is_ok());
        assert!(validate_content(&Content::text("")).is_err());
        assert!(validate_content(&Content::image("https://cdn/1.png", "image/png")).is_ok());
        assert!(validate_content(&Content::image("https://cdn/1.png", "image/jpeg")).is_err());
        assert!(validate_content(&Content::image("", "image/png")).is_err());
    }

    #[test]
    fn test_validate_tool_result() {
        let good = CallToolResult::success(vec![
            Content::text("Successfully generated 1 images"),
            Content::image("https://cdn/1.png", "image/png"),
        ]);
        assert!(validate_tool_result(&good).is_ok());

        let image_first =
            CallToolResult::success(vec![Content::image("https://cdn/1.png", "image/png")]);
        assert!(validate_tool_result(&image_first).is_err());

        assert!(validate_tool_result(&CallToolResult::success(vec![])).is_err());
    }

    #[tokio::test]
    async fn test_recipe_tools_return_text_then_images() {
        let api = recipe_returns(
            json!({ "images": ["https://cdn/a.png", "https://cdn/b.png"] }),
            200,
        )
        .await;
        let server = server_with(&api).await;

        let cases = [
            ("generate-image", json!({ "prompt": "a cat" }), "Successfully generated 2 images"),
            (
                "remix",
                json!({ "image": "https://cdn/1.png", "prompt": "in winter" }),
                "Successfully created 2 variations of the image",
            ),
            (
                "face-enhancer",
                json!({ "image": "https://cdn/1.png" }),
                "Successfully enhanced face's details in the image",
            ),
            ("upscaler", json!({ "image": "https://cdn/1.png", "ratio": 2 }), "Upscaled image"),
        ];

        for (tool, args, expected) in cases {
            let result = server.invoke(tool, object(args)).await.unwrap();
            validate_tool_result(&result).unwrap_or_else(|e| panic!("{tool}: {e}"));
            assert_ne!(result.is_error, Some(true), "{tool}");
            assert_eq!(text(&result), expected, "{tool}");
            assert_eq!(result.content.len(), 3, "{tool}");
        }
    }

    #[tokio::test]
    async fn test_upstream_failures_are_error_results() {
        let api = recipe_returns(json!({ "message": "Quota exceeded" }), 429).await;
        let server = server_with(&api).await;

        let result = server
            .invoke("generate-image", object(json!({ "prompt": "a cat" })))
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(true));
        validate_tool_result(&result).unwrap();
        assert_eq!(text(&result), "Failed to generate images: Quota exceeded");
    }

    #[tokio::test]
    async fn test_error_only_recipe_response_is_a_failure() {
        let body = json!({ "images": [], "error": "NSFW content detected" });
        let api = recipe_returns(body, 200).await;
        let server = server_with(&api).await;

        let result = server
            .invoke("remix", object(json!({ "image": "https://cdn/1.png" })))
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(true));
        assert!(text(&result).contains("NSFW content detected"), "{}", text(&result));
    }

    #[tokio::test]
    async fn test_create_style_without_uploads_is_an_error_result() {
        let api = MockServer::start().await;
        let server = server_with(&api).await;

        let result = server
            .invoke(
                "create-style",
                object(json!({ "imageUrls": ["ftp://nowhere/1.png"], "name": "mine" })),
            )
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(true));
        assert!(text(&result).starts_with("Failed to create style"), "{}", text(&result));
        assert!(api.received_requests().await.unwrap().is_empty());
    }
}
