//! MCP server: tool dispatch over the REST API, plus its transports
//!
//! ```text
//! agent --stdio | HTTP--> CobotMcpBridge --> Dispatcher --> RobotApiClient --HTTP--> cobot-api
//! ```

pub mod bridge;
pub mod catalog;
pub mod client;
pub mod dispatch;
pub mod error;
pub mod prompts;
pub mod tools;
pub mod transport;

pub use bridge::{CobotMcpBridge, SERVER_NAME};
pub use catalog::Catalog;
pub use client::{ApiClientConfig, RobotApiClient};
pub use dispatch::{Dispatcher, ToolContext, ToolInvocation, ToolResult, ToolSpec};
pub use error::{ApiClientError, ToolError};
pub use tools::all_tools;

/// Dispatcher over the full tool table, talking to `api`
pub fn build_dispatcher(api: RobotApiClient) -> Dispatcher {
    Dispatcher::new(ToolContext { api }, all_tools())
}
