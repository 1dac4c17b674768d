//! Tool adapter.
//!
//! Turns typed handler functions into the uniform [`ToolHandler`] contract
//! used by the registry: raw JSON arguments and an [`InvocationContext`] in,
//! a protocol-shaped [`CallToolResult`] out.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use gaia_mcp_common::error::{Error, Result};
use rmcp::model::{CallToolResult, Content, JsonObject};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::context::InvocationContext;

/// What a handler produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// Already in protocol shape; returned verbatim.
    Protocol(CallToolResult),
    /// Any other value; serialized into a single text item.
    Value(Value),
}

impl ToolOutput {
    /// Convert to the result returned to the client.
    pub fn into_call_result(self) -> CallToolResult {
        match self {
            ToolOutput::Protocol(result) => result,
            ToolOutput::Value(value) => {
                CallToolResult::success(vec![Content::text(value.to_string())])
            }
        }
    }
}

impl From<CallToolResult> for ToolOutput {
    fn from(result: CallToolResult) -> Self {
        ToolOutput::Protocol(result)
    }
}

impl From<Value> for ToolOutput {
    fn from(value: Value) -> Self {
        ToolOutput::Value(value)
    }
}

/// Uniform invocation contract for tools.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Run the tool with already validated `args`.
    async fn call(&self, args: JsonObject, ctx: InvocationContext) -> Result<ToolOutput>;
}

/// Adapts a function taking deserialized arguments.
pub struct TypedHandler<A, F> {
    f: F,
    _args: PhantomData<fn() -> A>,
}

#[async_trait]
impl<A, F, Fut> ToolHandler for TypedHandler<A, F>
where
    A: DeserializeOwned + Send + 'static,
    F: Fn(A, InvocationContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ToolOutput>> + Send + 'static,
{
    async fn call(&self, args: JsonObject, ctx: InvocationContext) -> Result<ToolOutput> {
        let args: A = serde_json::from_value(Value::Object(args))
            .map_err(|e| Error::validation(format!("Invalid parameters: {}", e)))?;
        (self.f)(args, ctx).await
    }
}

/// Wrap `f` as a shareable [`ToolHandler`].
pub fn typed<A, F, Fut>(f: F) -> Arc<dyn ToolHandler>
where
    A: DeserializeOwned + Send + 'static,
    F: Fn(A, InvocationContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ToolOutput>> + Send + 'static,
{
    Arc::new(TypedHandler {
        f,
        _args: PhantomData,
    })
}

/// Invoke `handler` and normalize its output.
///
/// Handler errors are returned unchanged.
pub async fn invoke(
    handler: &dyn ToolHandler,
    args: JsonObject,
    ctx: InvocationContext,
) -> Result<CallToolResult> {
    let output = handler.call(args, ctx).await?;
    Ok(output.into_call_result())
}
