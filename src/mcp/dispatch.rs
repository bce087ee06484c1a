//! Tool routing table
//!
//! Built once from a fixed list of [`ToolSpec`]s. Every invocation produces a
//! [`ToolResult`]; unknown tools, bad arguments, REST failures and handler
//! panics all come back as `success: false` rather than as protocol errors.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use schemars::JsonSchema;
use serde::Serialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::client::RobotApiClient;
use super::error::ToolError;

pub type JsonObject = Map<String, Value>;

pub type ToolFuture = BoxFuture<'static, Result<Value, ToolError>>;

/// Handler entry point: raw arguments in, JSON payload out
pub type ToolHandler = fn(ToolContext, Value) -> ToolFuture;

/// What every handler gets to work with
#[derive(Clone)]
pub struct ToolContext {
    pub api: RobotApiClient,
}

/// One tool call, as received from a transport
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    /// Correlates the log lines of one call
    pub id: Uuid,
    pub tool_name: String,
    pub arguments: JsonObject,
}

impl ToolInvocation {
    pub fn new(tool_name: impl Into<String>, arguments: Value) -> Self {
        let arguments = match arguments {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            id: Uuid::new_v4(),
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResult {
    pub success: bool,
    pub payload: Value,
    pub error_message: Option<String>,
}

impl ToolResult {
    pub fn ok(payload: Value) -> Self {
        Self {
            success: true,
            payload,
            error_message: None,
        }
    }

    /// Failure payload echoes the tool and its arguments
    pub fn failure(invocation: &ToolInvocation, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            success: false,
            payload: json!({
                "error": message,
                "tool": invocation.tool_name,
                "arguments": invocation.arguments,
            }),
            error_message: Some(message),
        }
    }

    /// Pretty JSON of the payload, the text clients see
    pub fn to_text(&self) -> String {
        serde_json::to_string_pretty(&self.payload).unwrap_or_else(|_| self.payload.to_string())
    }
}

#[derive(Clone)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Arc<JsonObject>,
    pub handler: ToolHandler,
}

impl ToolSpec {
    /// Pair a handler with the schema generated for its argument type
    pub fn new<A: JsonSchema>(name: &'static str, description: &'static str, handler: ToolHandler) -> Self {
        Self {
            name,
            description,
            input_schema: Arc::new(object_schema::<A>()),
            handler,
        }
    }
}

/// MCP requires `"type": "object"` at the root of every input schema
fn object_schema<A: JsonSchema>() -> JsonObject {
    let mut schema = serde_json::to_value(schemars::schema_for!(A))
        .ok()
        .and_then(|v| v.as_object().cloned())
        .unwrap_or_default();
    schema.remove("$schema");
    schema.remove("title");
    schema
        .entry("type".to_string())
        .or_insert_with(|| json!("object"));
    schema
        .entry("properties".to_string())
        .or_insert_with(|| json!({}));
    schema
}

pub struct Dispatcher {
    ctx: ToolContext,
    tools: Vec<ToolSpec>,
    index: HashMap<&'static str, usize>,
}

impl Dispatcher {
    pub fn new(ctx: ToolContext, tools: Vec<ToolSpec>) -> Self {
        let index = tools
            .iter()
            .enumerate()
            .map(|(i, spec)| (spec.name, i))
            .collect();
        Self { ctx, tools, index }
    }

    pub fn context(&self) -> &ToolContext {
        &self.ctx
    }

    pub fn tools(&self) -> &[ToolSpec] {
        &self.tools
    }

    pub fn tool_names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name).collect()
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub async fn invoke(&self, invocation: ToolInvocation) -> ToolResult {
        let Some(spec) = self.get(&invocation.tool_name) else {
            tracing::warn!(call_id = %invocation.id, tool = %invocation.tool_name, "unknown tool");
            let message = format!(
                "Unknown tool: {}. Available tools: {}",
                invocation.tool_name,
                self.tool_names().join(", ")
            );
            return ToolResult::failure(&invocation, message);
        };

        tracing::debug!(call_id = %invocation.id, tool = spec.name, arguments = ?invocation.arguments, "calling tool");
        let future = (spec.handler)(self.ctx.clone(), Value::Object(invocation.arguments.clone()));

        // a panicking handler fails its own call only
        match tokio::spawn(future).await {
            Ok(Ok(payload)) => ToolResult::ok(payload),
            Ok(Err(e)) => {
                tracing::info!(call_id = %invocation.id, tool = spec.name, error = %e, "tool failed");
                ToolResult::failure(&invocation, e.to_string())
            }
            Err(e) => {
                tracing::error!(call_id = %invocation.id, tool = spec.name, error = %e, "tool handler aborted");
                ToolResult::failure(&invocation, ToolError::Internal(e.to_string()).to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::client::ApiClientConfig;
    use serde::Deserialize;

    #[derive(Deserialize, JsonSchema)]
    struct EchoArgs {
        /// Anything
        word: String,
    }

    fn echo(_: ToolContext, args: Value) -> ToolFuture {
        Box::pin(async move {
            let args: EchoArgs = serde_json::from_value(args)
                .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
            Ok(json!({ "echo": args.word }))
        })
    }

    fn explode(_: ToolContext, _: Value) -> ToolFuture {
        Box::pin(async move {
            if true {
                panic!("handler bug");
            }
            Ok(Value::Null)
        })
    }

    fn dispatcher() -> Dispatcher {
        let api = RobotApiClient::new(ApiClientConfig::default()).unwrap();
        Dispatcher::new(
            ToolContext { api },
            vec![
                ToolSpec::new::<EchoArgs>("echo", "Echo a word", echo),
                ToolSpec::new::<EchoArgs>("explode", "Always panics", explode),
            ],
        )
    }

    #[tokio::test]
    async fn unknown_tool_is_a_failed_result() {
        let result = dispatcher()
            .invoke(ToolInvocation::new("teleport", json!({"x": 1})))
            .await;
        assert!(!result.success);
        let message = result.error_message.unwrap();
        assert!(message.contains("Unknown tool: teleport"));
        assert!(message.contains("echo, explode"));
        assert_eq!(result.payload["tool"], "teleport");
        assert_eq!(result.payload["arguments"]["x"], 1);
    }

    #[tokio::test]
    async fn handler_output_becomes_payload() {
        let result = dispatcher()
            .invoke(ToolInvocation::new("echo", json!({"word": "hi"})))
            .await;
        assert_eq!(result, ToolResult::ok(json!({"echo": "hi"})));
    }

    #[tokio::test]
    async fn bad_arguments_and_panics_fail_softly() {
        let d = dispatcher();
        let result = d.invoke(ToolInvocation::new("echo", json!({}))).await;
        assert!(!result.success);
        assert!(result.error_message.unwrap().starts_with("Invalid arguments"));

        let result = d.invoke(ToolInvocation::new("explode", json!({}))).await;
        assert!(!result.success);
        assert!(result.error_message.unwrap().starts_with("Tool execution failed"));
    }

    #[test]
    fn schemas_are_objects_with_descriptions() {
        let spec = ToolSpec::new::<EchoArgs>("echo", "Echo a word", echo);
        assert_eq!(spec.input_schema["type"], "object");
        assert_eq!(spec.input_schema["properties"]["word"]["description"], "Anything");
        assert_eq!(spec.input_schema["required"], json!(["word"]));
        assert!(!spec.input_schema.contains_key("$schema"));
    }
}
