//! cobot-mcp: MCP server that exposes the REST API as tools and prompts
//!
//! ```text
//! agent <--stdio | HTTP--> cobot-mcp <--HTTP--> cobot-api <--serial--> arm
//! ```

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use serde_json::json;
use tokio::net::TcpListener;

use cobot::config::{ApiTargetArgs, ServeArgs};
use cobot::logging::init_tracing;
use cobot::mcp::transport::{serve_http, serve_stdio};
use cobot::mcp::{build_dispatcher, CobotMcpBridge, RobotApiClient};
use cobot::signal::shutdown_signal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Transport {
    Stdio,
    Http,
}

#[derive(Parser, Debug)]
#[command(name = "cobot-mcp", version)]
#[command(about = "MCP server for the cobot REST API")]
struct Cli {
    /// Channel the MCP client connects over
    #[arg(long, env = "COBOT_MCP_TRANSPORT", value_enum, default_value_t = Transport::Stdio)]
    transport: Transport,

    /// HTTP transport only
    #[command(flatten)]
    serve: ServeArgs,

    #[command(flatten)]
    api: ApiTargetArgs,

    /// Check mode: exercise the tools against the API and exit
    #[arg(long)]
    check: bool,
}

/// Run the read-only tools and prompts once; error if any of them fail
async fn run_check(bridge: &CobotMcpBridge) -> anyhow::Result<()> {
    let mut failures = Vec::new();

    let tools = bridge.tools();
    tracing::info!("MCP tools: {}", tools.len());
    for tool in &tools {
        tracing::info!("  - {}", tool.name);
    }

    let critical = [
        ("get_robot_status", json!({})),
        ("get_all_joint_angles", json!({})),
        ("get_joint_angle", json!({"joint_num": 1})),
    ];
    for (name, args) in critical {
        let result = bridge.execute(name, args.as_object().cloned()).await;
        if result.success {
            tracing::info!("  ok   {name}");
        } else {
            tracing::error!("  FAIL {name}: {}", result.error_message.unwrap_or_default());
            failures.push(name.to_string());
        }
    }

    let prompts = bridge.prompts();
    tracing::info!("MCP prompts: {}", prompts.len());
    match bridge.prompt("robot_status").await {
        Ok(_) => tracing::info!("  ok   robot_status prompt"),
        Err(e) => {
            tracing::error!("  FAIL robot_status prompt: {}", e.message);
            failures.push("robot_status prompt".to_string());
        }
    }

    let bogus = bridge.execute("invalid_tool", None).await;
    if bogus.success {
        tracing::error!("  FAIL invalid_tool was accepted");
        failures.push("invalid_tool".to_string());
    } else {
        tracing::info!("  ok   invalid_tool rejected");
    }

    anyhow::ensure!(failures.is_empty(), "check failed: {}", failures.join(", "));
    tracing::info!("Check complete!");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing("cobot=info,cobot_mcp=info,rmcp=warn");

    let api = RobotApiClient::new(cli.api.client_config()).context("failed to build HTTP client")?;
    let health = api
        .health()
        .await
        .with_context(|| format!("cannot reach the REST API at {}", api.base_url()))?;
    tracing::info!(
        api = api.base_url(),
        status = %health.status,
        robot_connected = health.robot_connected,
        "REST API reachable"
    );

    let dispatcher = Arc::new(build_dispatcher(api));

    if cli.check {
        return run_check(&CobotMcpBridge::new(dispatcher)).await;
    }

    match cli.transport {
        Transport::Stdio => serve_stdio(CobotMcpBridge::sequential(dispatcher)).await,
        Transport::Http => {
            let addr = cli.serve.listen_addr("localhost", 8081);
            let listener = TcpListener::bind(&addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))?;
            serve_http(listener, CobotMcpBridge::new(dispatcher), shutdown_signal()).await
        }
    }
}
