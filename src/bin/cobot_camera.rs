//! cobot-camera: publish a V4L2 camera as an RTSP stream
//!
//! Starts the encoder, then supervises it until Ctrl-C / SIGTERM or until the
//! encoder exits on its own, which is reported as a failure.

use anyhow::Context;
use clap::Parser;

use cobot::camera::{StartOutcome, StreamLauncher};
use cobot::config::StreamArgs;
use cobot::logging::init_tracing;
use cobot::signal::shutdown_signal;

#[derive(Parser, Debug)]
#[command(name = "cobot-camera", version)]
#[command(about = "RTSP camera stream launcher")]
struct Cli {
    #[command(flatten)]
    stream: StreamArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing("cobot=info,cobot_camera=info");

    let config = cli.stream.stream_config()?;
    let mut launcher = StreamLauncher::new(config);

    match launcher.start().await.context("camera stream failed to start")? {
        StartOutcome::Started { pid } => tracing::info!(pid, "encoder started"),
        StartOutcome::AlreadyRunning => {}
    }
    let info = launcher.info();
    tracing::info!(
        url = %info.url,
        resolution = %info.resolution,
        fps = info.fps,
        bitrate = info.bitrate,
        "streaming"
    );

    let exited = tokio::select! {
        status = launcher.wait() => Some(status),
        _ = shutdown_signal() => None,
    };

    match exited {
        Some(status) => {
            let status = status.context("lost track of the encoder process")?;
            anyhow::bail!("encoder exited unexpectedly ({status})");
        }
        None => {
            launcher.stop().await.context("failed to stop the encoder")?;
            tracing::info!("camera stream stopped");
            Ok(())
        }
    }
}
