//! Tool registry.
//!
//! A [`Tool`] couples a unique name and description with an explicit list of
//! [`ParamSpec`] descriptors and the [`ToolHandler`] that implements it. The
//! descriptors are the single source for both the JSON input schema advertised
//! to clients and the argument check performed before dispatch.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use rmcp::model::JsonObject;
use serde_json::{Value, json};
use thiserror::Error;

use crate::adapter::ToolHandler;

/// JSON kind accepted by a parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Number,
    Boolean,
    /// Array whose elements all have the given kind
    Array(Box<ParamKind>),
    Object,
}

impl ParamKind {
    /// Array of `items`.
    pub fn array_of(items: ParamKind) -> Self {
        ParamKind::Array(Box::new(items))
    }

    /// JSON schema `type` keyword for this kind.
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Number => "number",
            ParamKind::Boolean => "boolean",
            ParamKind::Array(_) => "array",
            ParamKind::Object => "object",
        }
    }

    fn schema(&self) -> Value {
        match self {
            ParamKind::Array(items) => json!({ "type": "array", "items": items.schema() }),
            other => json!({ "type": other.type_name() }),
        }
    }

    /// Whether `value` has this kind.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ParamKind::String => value.is_string(),
            ParamKind::Number => value.is_number(),
            ParamKind::Boolean => value.is_boolean(),
            ParamKind::Object => value.is_object(),
            ParamKind::Array(items) => value
                .as_array()
                .is_some_and(|elements| elements.iter().all(|element| items.matches(element))),
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKind::Array(items) => write!(f, "array of {}", items),
            other => f.write_str(other.type_name()),
        }
    }
}

/// Descriptor for one tool parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: Cow<'static, str>,
    pub kind: ParamKind,
    pub required: bool,
    pub description: Cow<'static, str>,
}

impl ParamSpec {
    /// A parameter the caller must supply.
    pub fn required(
        name: impl Into<Cow<'static, str>>,
        kind: ParamKind,
        description: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            description: description.into(),
        }
    }

    /// A parameter the caller may omit.
    pub fn optional(
        name: impl Into<Cow<'static, str>>,
        kind: ParamKind,
        description: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind, description)
        }
    }
}

/// A rejected argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The parameter that failed validation.
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// A named, described, schema-validated unit of work.
#[derive(Clone)]
pub struct Tool {
    name: Cow<'static, str>,
    description: Cow<'static, str>,
    params: Vec<ParamSpec>,
    handler: Arc<dyn ToolHandler>,
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl Tool {
    /// Describe a tool. `params` lists its arguments in schema order.
    pub fn new(
        name: impl Into<Cow<'static, str>>,
        description: impl Into<Cow<'static, str>>,
        params: Vec<ParamSpec>,
        handler: Arc<dyn ToolHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params,
            handler,
        }
    }

    /// Name clients call the tool by.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable summary shown in tool listings.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Declared arguments, in schema order.
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Handler that runs the tool.
    pub fn handler(&self) -> &dyn ToolHandler {
        self.handler.as_ref()
    }

    /// JSON schema object describing the accepted arguments.
    pub fn input_schema(&self) -> JsonObject {
        let mut properties = serde_json::Map::new();
        for param in &self.params {
            let mut schema = param.kind.schema();
            if !param.description.is_empty() {
                schema["description"] = Value::String(param.description.to_string());
            }
            properties.insert(param.name.to_string(), schema);
        }

        let required: Vec<Value> = self
            .params
            .iter()
            .filter(|param| param.required)
            .map(|param| Value::String(param.name.to_string()))
            .collect();

        let mut schema = serde_json::Map::new();
        schema.insert("type".to_string(), json!("object"));
        schema.insert("properties".to_string(), Value::Object(properties));
        if !required.is_empty() {
            schema.insert("required".to_string(), Value::Array(required));
        }
        schema
    }

    /// Protocol-facing description of this tool.
    pub fn to_mcp(&self) -> rmcp::model::Tool {
        rmcp::model::Tool {
            name: self.name.clone(),
            description: Some(self.description.clone()),
            input_schema: Arc::new(self.input_schema()),
            annotations: None,
            icons: None,
            meta: None,
            output_schema: None,
            title: None,
        }
    }

    /// Check `args` against the declared parameters.
    ///
    /// Required parameters must be present and non-null; every supplied,
    /// non-null parameter must have its declared kind. Undeclared arguments
    /// are ignored.
    pub fn validate(&self, args: &JsonObject) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        for param in &self.params {
            match args.get(param.name.as_ref()) {
                None | Some(Value::Null) => {
                    if param.required {
                        errors.push(ValidationError {
                            field: param.name.to_string(),
                            message: "is required".to_string(),
                        });
                    }
                }
                Some(value) if !param.kind.matches(value) => {
                    errors.push(ValidationError {
                        field: param.name.to_string(),
                        message: format!("expected {}", param.kind),
                    });
                }
                Some(_) => {}
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Errors raised while building a registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Tool '{0}' is already registered")]
    DuplicateName(String),
}

/// Ordered set of tools with unique names.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Tool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from `tools`, keeping their order.
    pub fn from_tools(tools: impl IntoIterator<Item = Tool>) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for tool in tools {
            registry.register(tool)?;
        }
        Ok(registry)
    }

    /// Add `tool`. Fails if a tool with the same name exists.
    pub fn register(&mut self, tool: Tool) -> Result<(), RegistryError> {
        if self.index.contains_key(tool.name()) {
            return Err(RegistryError::DuplicateName(tool.name().to_string()));
        }
        self.index.insert(tool.name().to_string(), self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.index.get(name).map(|&position| &self.tools[position])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tool> {
        self.tools.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(Tool::name).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
