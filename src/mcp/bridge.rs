//! rmcp server handler over the tool dispatcher
//!
//! The same handler backs both transports. Over stdio it is built with
//! [`CobotMcpBridge::sequential`], which lets only one tool call run at a
//! time; over HTTP every call runs independently.

use std::sync::Arc;

use rmcp::{
    model::*,
    service::{RequestContext, RoleServer},
    ErrorData as McpError, ServerHandler,
};
use serde_json::Value;
use tokio::sync::Mutex;

use super::dispatch::{Dispatcher, ToolInvocation, ToolResult};
use super::prompts::{self, PROMPTS};

/// Name reported in the MCP handshake and discovery documents
pub const SERVER_NAME: &str = "cobot-controller";

/// Tools whose effect on the arm outlives the call
const ARM_COMMANDS: [&str; 4] = ["move_joint", "move_all_joints", "home_position", "jog_joint"];

fn moves_the_arm(tool: &str) -> bool {
    ARM_COMMANDS.contains(&tool)
}

#[derive(Clone)]
pub struct CobotMcpBridge {
    dispatcher: Arc<Dispatcher>,
    gate: Option<Arc<Mutex<()>>>,
}

impl CobotMcpBridge {
    /// Concurrent calls are dispatched in parallel
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            gate: None,
        }
    }

    /// One tool call at a time, in arrival order
    pub fn sequential(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            gate: Some(Arc::new(Mutex::new(()))),
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn tools(&self) -> Vec<Tool> {
        self.dispatcher
            .tools()
            .iter()
            .map(|spec| Tool::new(spec.name, spec.description, spec.input_schema.clone()))
            .collect()
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        PROMPTS
            .iter()
            .map(|p| Prompt::new(p.name, Some(p.description), None))
            .collect()
    }

    /// Run one tool call through the dispatcher, honouring the gate.
    ///
    /// Once the handler is dispatched it runs to completion even if this
    /// future is dropped; only `stop_robot` halts a motion already sent.
    pub async fn execute(&self, name: &str, arguments: Option<JsonObject>) -> ToolResult {
        let arguments = arguments.map(Value::Object).unwrap_or(Value::Null);
        let invocation = ToolInvocation::new(name, arguments);
        let _turn = match &self.gate {
            Some(gate) => Some(gate.lock().await),
            None => None,
        };
        self.dispatcher.invoke(invocation).await
    }

    /// Render a prompt, rejecting names outside the fixed set
    pub async fn prompt(&self, name: &str) -> Result<GetPromptResult, McpError> {
        let spec = prompts::find(name).ok_or_else(|| {
            McpError::invalid_params(
                format!(
                    "Unknown prompt: {name}. Available prompts: {}",
                    PROMPTS.map(|p| p.name).join(", ")
                ),
                None,
            )
        })?;
        let text = prompts::render(spec.name, &self.dispatcher.context().api)
            .await
            .unwrap_or_default();
        Ok(GetPromptResult {
            description: Some(spec.description.to_string()),
            messages: vec![PromptMessage::new_text(PromptMessageRole::User, text)],
        })
    }
}

fn to_call_result(result: ToolResult) -> CallToolResult {
    let content = vec![Content::text(result.to_text())];
    if result.success {
        CallToolResult::success(content)
    } else {
        CallToolResult::error(content)
    }
}

impl ServerHandler for CobotMcpBridge {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_prompts()
                .enable_logging()
                .build(),
            server_info: Implementation {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(
                "Cobot controller: read joint angles, move joints, home, jog and stop the arm. \
                 Use search and fetch to look up joint limits and capabilities."
                    .into(),
            ),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _ctx: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        let tools = self.tools();
        tracing::debug!("Listing {} tools", tools.len());
        Ok(ListToolsResult {
            tools,
            next_cursor: None,
            meta: None,
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        ctx: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        tokio::select! {
            result = self.execute(&request.name, request.arguments) => {
                if !result.success {
                    let _ = ctx
                        .peer
                        .notify_logging_message(LoggingMessageNotificationParam {
                            level: LoggingLevel::Warning,
                            logger: Some(format!("cobot.{}", request.name)),
                            data: result.payload.clone(),
                        })
                        .await;
                }
                Ok(to_call_result(result))
            }
            _ = ctx.ct.cancelled() => {
                if moves_the_arm(&request.name) {
                    tracing::warn!(
                        tool = %request.name,
                        "call cancelled by the client; a command already sent keeps running, use stop_robot to halt it"
                    );
                } else {
                    tracing::debug!(tool = %request.name, "call cancelled by the client");
                }
                Err(McpError::internal_error("Cancelled", None))
            }
        }
    }

    async fn list_prompts(
        &self,
        _request: Option<PaginatedRequestParam>,
        _ctx: RequestContext<RoleServer>,
    ) -> Result<ListPromptsResult, McpError> {
        Ok(ListPromptsResult {
            prompts: self.prompts(),
            next_cursor: None,
            meta: None,
        })
    }

    async fn get_prompt(
        &self,
        request: GetPromptRequestParam,
        _ctx: RequestContext<RoleServer>,
    ) -> Result<GetPromptResult, McpError> {
        self.prompt(&request.name).await
    }
}
