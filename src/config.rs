//! Command-line and environment configuration shared by the binaries
//!
//! Each group is flattened into a binary's `clap` parser. Every flag also
//! reads a `COBOT_*` variable, so a `.env` file can stand in for flags.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use crate::camera::{Encoder, StreamConfig};
use crate::joint::{ControllerOptions, MotionPolicy};
use crate::mcp::ApiClientConfig;

/// Where an HTTP server listens
#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Address to bind
    #[arg(long, env = "COBOT_HOST")]
    pub host: Option<String>,

    /// Port to bind
    #[arg(long, env = "COBOT_PORT")]
    pub port: Option<u16>,
}

impl ServeArgs {
    /// `host:port` to bind, resolved against the binary's own defaults
    pub fn listen_addr(&self, default_host: &str, default_port: u16) -> String {
        let host = self.host.as_deref().unwrap_or(default_host);
        format!("{host}:{}", self.port.unwrap_or(default_port))
    }
}

/// How the API server reaches the arm
#[derive(Debug, Clone, Args)]
pub struct RobotArgs {
    /// Serial device of the arm's controller board
    #[arg(long, env = "COBOT_ROBOT_PORT", default_value = "/dev/ttyACM0")]
    pub robot_port: String,

    /// Serial baud rate
    #[arg(long, env = "COBOT_ROBOT_BAUDRATE", default_value_t = 115_200)]
    pub robot_baudrate: u32,

    /// Drive an in-process simulated arm instead of the serial link
    #[arg(long, env = "COBOT_SIMULATE")]
    pub simulate: bool,

    /// What a motion command does while another is still running
    #[arg(long, env = "COBOT_MOTION_POLICY", value_enum, default_value_t = MotionPolicy::Queue)]
    pub motion_policy: MotionPolicy,

    /// Interval between angle polls while waiting for motion to settle
    #[arg(long, env = "COBOT_POLL_INTERVAL_MS", default_value_t = 100)]
    pub poll_interval_ms: u64,
}

impl RobotArgs {
    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            motion_policy: self.motion_policy,
            ..ControllerOptions::default()
        }
    }
}

/// Which REST API the MCP server talks to
#[derive(Debug, Clone, Args)]
pub struct ApiTargetArgs {
    /// REST API host
    #[arg(long, env = "COBOT_API_HOST", default_value = "localhost")]
    pub api_host: String,

    /// REST API port
    #[arg(long, env = "COBOT_API_PORT", default_value_t = 8080)]
    pub api_port: u16,

    /// Per-request timeout
    #[arg(long, env = "COBOT_API_TIMEOUT_SECS", default_value_t = 30)]
    pub api_timeout_secs: u64,
}

impl ApiTargetArgs {
    pub fn client_config(&self) -> ApiClientConfig {
        ApiClientConfig {
            timeout: Duration::from_secs(self.api_timeout_secs.max(1)),
            ..ApiClientConfig::new(&self.api_host, self.api_port)
        }
    }
}

/// Camera capture and encoder settings
#[derive(Debug, Clone, Args)]
pub struct StreamArgs {
    /// V4L2 capture device
    #[arg(long, env = "COBOT_CAMERA_DEVICE", default_value = "/dev/video0")]
    pub device: PathBuf,

    #[arg(long, env = "COBOT_CAMERA_WIDTH", default_value_t = 640)]
    pub width: u32,

    #[arg(long, env = "COBOT_CAMERA_HEIGHT", default_value_t = 480)]
    pub height: u32,

    #[arg(long, env = "COBOT_CAMERA_FPS", default_value_t = 30)]
    pub fps: u32,

    /// Target bitrate in bits per second
    #[arg(long, env = "COBOT_CAMERA_BITRATE", default_value_t = 1_000_000)]
    pub bitrate: u32,

    /// Address the stream is published on
    #[arg(long, env = "COBOT_CAMERA_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Stream port
    #[arg(long, env = "COBOT_CAMERA_PORT", default_value_t = 8554)]
    pub port: u16,

    /// Path component of the RTSP URL
    #[arg(long, env = "COBOT_CAMERA_STREAM_NAME", default_value = "camera")]
    pub stream_name: String,

    #[arg(long, env = "COBOT_CAMERA_ENCODER", value_enum, default_value_t = Encoder::Ffmpeg)]
    pub encoder: Encoder,

    /// Encoder binary to run instead of the one found on PATH
    #[arg(long, env = "COBOT_CAMERA_ENCODER_PATH")]
    pub encoder_path: Option<PathBuf>,
}

impl StreamArgs {
    pub fn stream_config(&self) -> anyhow::Result<StreamConfig> {
        anyhow::ensure!(self.width > 0 && self.height > 0, "resolution must be non-zero");
        anyhow::ensure!(self.fps > 0, "fps must be non-zero");
        anyhow::ensure!(self.bitrate >= 1000, "bitrate must be at least 1000 bps");
        Ok(StreamConfig {
            device_path: self.device.clone(),
            width: self.width,
            height: self.height,
            fps: self.fps,
            bitrate: self.bitrate,
            bind_address: self.bind_address.clone(),
            port: self.port,
            stream_name: self.stream_name.clone(),
            encoder: self.encoder,
            encoder_path: self.encoder_path.clone(),
        })
    }
}
