//! RTSP camera streaming through an external encoder process

pub mod command;
pub mod error;
pub mod launcher;
pub mod shutdown;

pub use command::{Encoder, EncoderCommand, StreamConfig};
pub use error::StreamError;
pub use launcher::{StartOutcome, StopOutcome, StreamInfo, StreamLauncher};
