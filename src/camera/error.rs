use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Errors raised while launching or supervising the encoder
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Camera device not found: {}", .0.display())]
    DeviceNotFound(PathBuf),

    #[error("{binary} not found on PATH: {source}")]
    EncoderNotFound {
        binary: &'static str,
        #[source]
        source: which::Error,
    },

    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Encoder exited during startup ({status})")]
    ExitedEarly { status: ExitStatus },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
