//! Tool schema validity tests.
//!
//! For any registered tool, the tool's input schema is a JSON Schema object
//! that lists every parameter with its type and marks exactly the required
//! ones as required.

use serde_json::Value;

/// Validates that a JSON schema has the required structure.
fn validate_json_schema(schema: &Value) -> Result<(), String> {
    let obj = schema
        .as_object()
        .ok_or_else(|| "Schema must be an object".to_string())?;

    if obj.get("type") != Some(&Value::from("object")) {
        return Err(format!("Expected type 'object', got {:?}", obj.get("type")));
    }

    let properties = obj
        .get("properties")
        .and_then(Value::as_object)
        .ok_or_else(|| "Properties must be an object".to_string())?;

    for (name, property) in properties {
        if property.get("type").and_then(Value::as_str).is_none() {
            return Err(format!("Property '{}' has no type", name));
        }
    }

    if let Some(required) = obj.get("required") {
        let required = required
            .as_array()
            .ok_or_else(|| "Required must be an array".to_string())?;
        for name in required {
            let name = name.as_str().ok_or("Required entries must be strings")?;
            if !properties.contains_key(name) {
                return Err(format!("Required field '{}' is not a property", name));
            }
        }
    }

    Ok(())
}

/// Validates that a tool has required fields.
fn validate_tool(tool: &rmcp::model::Tool) -> Result<(), String> {
    if tool.name.is_empty() {
        return Err("Tool name cannot be empty".to_string());
    }

    match tool.description.as_deref() {
        Some(description) if !description.is_empty() => {}
        _ => return Err(format!("Tool '{}' must have a description", tool.name)),
    }

    let schema_value = serde_json::to_value(&*tool.input_schema)
        .map_err(|e| format!("Failed to serialize schema: {}", e))?;
    validate_json_schema(&schema_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gaia_mcp_server::adapter::{ToolOutput, typed};
    use gaia_mcp_server::{ParamKind, ParamSpec, Tool, tools};
    use proptest::prelude::*;
    use rmcp::model::JsonObject;
    use serde_json::json;

    fn schema_of(name: &str) -> Value {
        let registry = tools::builtin().unwrap();
        Value::Object(registry.get(name).unwrap().input_schema())
    }

    #[test]
    fn test_json_schema_validation() {
        let valid_schema = json!({
            "type": "object",
            "properties": { "prompt": { "type": "string" } },
            "required": ["prompt"]
        });
        assert!(validate_json_schema(&valid_schema).is_ok());

        assert!(validate_json_schema(&json!({ "type": "string" })).is_err());
        assert!(
            validate_json_schema(&json!({
                "type": "object",
                "properties": {},
                "required": ["ghost"]
            }))
            .is_err()
        );
    }

    #[test]
    fn test_all_builtin_tools_are_valid() {
        let registry = tools::builtin().unwrap();
        assert_eq!(registry.len(), 6);
        for tool in registry.iter() {
            validate_tool(&tool.to_mcp()).unwrap_or_else(|e| panic!("{}: {}", tool.name(), e));
        }
    }

    #[test]
    fn test_upload_image_schema() {
        let schema = schema_of("upload-image");
        assert_eq!(schema["properties"]["imageUrls"]["type"], "array");
        assert_eq!(schema["properties"]["imageUrls"]["items"]["type"], "string");
        assert_eq!(schema["required"], json!(["imageUrls"]));
    }

    #[test]
    fn test_create_style_schema() {
        let schema = schema_of("create-style");
        let properties = schema["properties"].as_object().unwrap();
        assert!(properties.contains_key("description"));
        assert_eq!(schema["required"], json!(["imageUrls", "name"]));
    }

    #[test]
    fn test_generate_image_schema() {
        let schema = schema_of("generate-image");
        assert_eq!(schema["properties"]["prompt"]["type"], "string");
        assert_eq!(schema["required"], json!(["prompt"]));
    }

    #[test]
    fn test_image_tools_require_an_image() {
        for name in ["remix", "face-enhancer", "upscaler"] {
            let schema = schema_of(name);
            assert_eq!(schema["properties"]["image"]["type"], "string", "{name}");
            assert_eq!(schema["required"], json!(["image"]), "{name}");
        }
        assert_eq!(schema_of("upscaler")["properties"]["ratio"]["type"], "number");
    }

    fn kind_strategy() -> impl Strategy<Value = ParamKind> {
        let leaf = prop_oneof![
            Just(ParamKind::String),
            Just(ParamKind::Number),
            Just(ParamKind::Boolean),
            Just(ParamKind::Object),
        ];
        leaf.prop_recursive(2, 4, 1, |inner| inner.prop_map(ParamKind::array_of))
    }

    proptest! {
        #[test]
        fn generated_schemas_are_valid(
            params in proptest::collection::btree_map(
                "[a-z][a-zA-Z]{0,11}",
                (kind_strategy(), any::<bool>()),
                0..6,
            )
        ) {
            let specs: Vec<ParamSpec> = params
                .iter()
                .map(|(name, (kind, required))| {
                    if *required {
                        ParamSpec::required(name.clone(), kind.clone(), "generated")
                    } else {
                        ParamSpec::optional(name.clone(), kind.clone(), "generated")
                    }
                })
                .collect();
            let tool = Tool::new(
                "generated",
                "Generated tool",
                specs,
                typed(|_: JsonObject, _ctx| async { Ok(ToolOutput::Value(Value::Null)) }),
            );

            prop_assert!(validate_tool(&tool.to_mcp()).is_ok());

            let schema = Value::Object(tool.input_schema());
            let required_count = schema
                .get("required")
                .and_then(Value::as_array)
                .map(Vec::len)
                .unwrap_or(0);
            prop_assert_eq!(required_count, params.values().filter(|(_, r)| *r).count());
            for (name, (kind, _)) in &params {
                prop_assert_eq!(
                    schema["properties"][name]["type"].as_str(),
                    Some(kind.type_name())
                );
            }
        }
    }
}
