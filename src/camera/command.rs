//! Encoder command lines
//!
//! Both encoders read straight from the V4L2 device. ffmpeg pushes H.264 to
//! an RTSP server; the GStreamer pipeline sends RTP/H.264 over UDP to the
//! local host.

use std::path::PathBuf;

use serde::Serialize;

use super::error::StreamError;

/// Which external program does the encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Encoder {
    #[default]
    Ffmpeg,
    Gstreamer,
}

impl Encoder {
    pub fn binary(self) -> &'static str {
        match self {
            Encoder::Ffmpeg => "ffmpeg",
            Encoder::Gstreamer => "gst-launch-1.0",
        }
    }
}

/// Everything needed to launch one stream; fixed for the process lifetime
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub device_path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Bits per second
    pub bitrate: u32,
    pub bind_address: String,
    pub port: u16,
    pub stream_name: String,
    pub encoder: Encoder,
    /// Use this binary instead of looking the encoder up on `PATH`
    pub encoder_path: Option<PathBuf>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            device_path: PathBuf::from("/dev/video0"),
            width: 640,
            height: 480,
            fps: 30,
            bitrate: 1_000_000,
            bind_address: "0.0.0.0".to_string(),
            port: 8554,
            stream_name: "camera".to_string(),
            encoder: Encoder::Ffmpeg,
            encoder_path: None,
        }
    }
}

impl StreamConfig {
    /// Where clients pick the stream up
    pub fn stream_url(&self) -> String {
        match self.encoder {
            Encoder::Ffmpeg => format!(
                "rtsp://{}:{}/{}",
                self.bind_address, self.port, self.stream_name
            ),
            Encoder::Gstreamer => format!("udp://127.0.0.1:{}", self.port),
        }
    }

    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// A resolved program and its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl EncoderCommand {
    /// Resolve the encoder binary and build its argument list
    pub fn for_config(config: &StreamConfig) -> Result<Self, StreamError> {
        let program = match &config.encoder_path {
            Some(path) => path.clone(),
            None => which::which(config.encoder.binary()).map_err(|source| {
                StreamError::EncoderNotFound {
                    binary: config.encoder.binary(),
                    source,
                }
            })?,
        };
        Ok(Self {
            program,
            args: build_args(config),
        })
    }

    /// Shell-style rendering for logs
    pub fn display(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

pub fn build_args(config: &StreamConfig) -> Vec<String> {
    match config.encoder {
        Encoder::Ffmpeg => ffmpeg_args(config),
        Encoder::Gstreamer => gstreamer_args(config),
    }
}

fn ffmpeg_args(config: &StreamConfig) -> Vec<String> {
    let bitrate = config.bitrate.to_string();
    let mut args: Vec<String> = vec!["-hide_banner".into(), "-loglevel".into(), "warning".into()];

    // capture
    args.extend([
        "-f".into(),
        "v4l2".into(),
        "-framerate".into(),
        config.fps.to_string(),
        "-video_size".into(),
        config.resolution(),
        "-i".into(),
        config.device_path.display().to_string(),
    ]);

    // encode
    args.extend([
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        "ultrafast".into(),
        "-tune".into(),
        "zerolatency".into(),
        "-b:v".into(),
        bitrate.clone(),
        "-maxrate".into(),
        bitrate,
        "-bufsize".into(),
        (u64::from(config.bitrate) * 2).to_string(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-g".into(),
        (config.fps * 2).to_string(),
    ]);

    args.extend(["-f".into(), "rtsp".into(), config.stream_url()]);
    args
}

fn gstreamer_args(config: &StreamConfig) -> Vec<String> {
    let kbps = (config.bitrate / 1000).max(1);
    vec![
        "-v".to_string(),
        "v4l2src".to_string(),
        format!("device={}", config.device_path.display()),
        "!".to_string(),
        format!(
            "video/x-raw,width={},height={},framerate={}/1",
            config.width, config.height, config.fps
        ),
        "!".to_string(),
        "videoconvert".to_string(),
        "!".to_string(),
        "x264enc".to_string(),
        "tune=zerolatency".to_string(),
        format!("bitrate={kbps}"),
        "speed-preset=superfast".to_string(),
        "!".to_string(),
        "rtph264pay".to_string(),
        "config-interval=1".to_string(),
        "pt=96".to_string(),
        "!".to_string(),
        "udpsink".to_string(),
        "host=127.0.0.1".to_string(),
        format!("port={}", config.port),
    ]
}
