//! cobot-api: REST API over the arm's joint controller
//!
//! ```text
//! cobot-api --robot-port /dev/ttyACM0        # real arm
//! cobot-api --simulate --port 9080           # no hardware
//! ```

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;

use cobot::api::{self, AppState};
use cobot::config::{RobotArgs, ServeArgs};
use cobot::joint::{JointController, SerialArm, SimulatedArm};
use cobot::logging::init_tracing;
use cobot::signal::shutdown_signal;

#[derive(Parser, Debug)]
#[command(name = "cobot-api", version)]
#[command(about = "REST API for a six-joint robot arm")]
struct Cli {
    #[command(flatten)]
    serve: ServeArgs,

    #[command(flatten)]
    robot: RobotArgs,
}

/// Open the arm and prove the link works with one angle read
async fn connect(args: &RobotArgs) -> anyhow::Result<JointController> {
    let options = args.controller_options();
    let controller = if args.simulate {
        tracing::info!("using simulated arm");
        JointController::new(SimulatedArm::new(), options)?
    } else {
        let port = args.robot_port.clone();
        let baud_rate = args.robot_baudrate;
        let arm = tokio::task::spawn_blocking(move || SerialArm::open(&port, baud_rate))
            .await
            .context("serial open task failed")?
            .with_context(|| format!("cannot open robot on {}", args.robot_port))?;
        JointController::new(arm, options)?
    };

    let angles = controller
        .get_all_joint_angles()
        .await
        .context("robot did not answer an angle read")?;
    tracing::info!(angles = ?angles.as_slice(), "robot connected");
    Ok(controller)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing("cobot=info,cobot_api=info,tower_http=info");

    let controller = connect(&cli.robot).await?;

    let addr = cli.serve.listen_addr("0.0.0.0", 8080);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    let state = AppState {
        controller: controller.clone(),
    };
    api::serve(listener, state, shutdown_signal())
        .await
        .context("REST API server failed")?;

    if let Err(e) = controller.shutdown().await {
        tracing::warn!(error = %e, "robot link did not close cleanly");
    }
    tracing::info!("cobot-api stopped");
    Ok(())
}
