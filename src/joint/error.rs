use thiserror::Error;

/// Errors raised by the SDK boundary (serial link or simulator)
#[derive(Debug, Error)]
pub enum SdkError {
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no reply to command 0x{command:02X} within {timeout_ms} ms")]
    Timeout { command: u8, timeout_ms: u64 },

    #[error("malformed reply to command 0x{command:02X}: {reason}")]
    Protocol { command: u8, reason: String },

    #[error("robot link is closed")]
    Disconnected,
}

/// Errors returned by the joint controller
#[derive(Debug, Error)]
pub enum JointError {
    #[error("Joint number must be between 1-6, got {0}")]
    InvalidJoint(i64),

    #[error("Angle {angle} out of range for joint {joint}. Valid range: {min} to {max} degrees")]
    AngleOutOfRange {
        joint: u8,
        angle: f64,
        min: f64,
        max: f64,
    },

    #[error("Speed must be between 1-100, got {0}")]
    InvalidSpeed(i64),

    #[error("Direction must be 1 or -1, got {0}")]
    InvalidDirection(i64),

    #[error("Must provide exactly 6 angles, got {0}")]
    WrongAngleCount(usize),

    #[error("Another motion command is in progress")]
    Busy,

    #[error("Motion command cancelled by emergency stop")]
    Cancelled,

    #[error("Robot communication failed: {0}")]
    Communication(#[from] SdkError),

    #[error("Internal controller error: {0}")]
    Internal(String),
}

impl JointError {
    /// True for input errors that were caught before reaching the SDK
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            JointError::InvalidJoint(_)
                | JointError::AngleOutOfRange { .. }
                | JointError::InvalidSpeed(_)
                | JointError::InvalidDirection(_)
                | JointError::WrongAngleCount(_)
        )
    }
}
