//! Request and response bodies

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::joint::{JointAngles, RobotStatus, DEFAULT_SPEED};

pub const API_VERSION: &str = "1.0.0";

/// Accepted range for `/robot/wait` timeouts, in seconds
pub const WAIT_TIMEOUT_RANGE: std::ops::RangeInclusive<f64> = 0.1..=60.0;

pub const DEFAULT_WAIT_TIMEOUT: f64 = 10.0;

/// ISO-8601 UTC timestamp with millisecond precision
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn default_speed() -> i64 {
    i64::from(DEFAULT_SPEED)
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MoveJointRequest {
    pub angle: f64,
    #[serde(default = "default_speed")]
    pub speed: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MoveAllJointsRequest {
    pub angles: Vec<f64>,
    #[serde(default = "default_speed")]
    pub speed: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JogJointRequest {
    pub direction: i64,
    #[serde(default = "default_speed")]
    pub speed: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SpeedRequest {
    #[serde(default = "default_speed")]
    pub speed: i64,
}

impl Default for SpeedRequest {
    fn default() -> Self {
        Self {
            speed: default_speed(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WaitRequest {
    #[serde(default = "default_wait_timeout")]
    pub timeout: f64,
}

fn default_wait_timeout() -> f64 {
    DEFAULT_WAIT_TIMEOUT
}

impl Default for WaitRequest {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub robot_connected: bool,
    pub api_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JointAngleResponse {
    pub joint: u8,
    pub angle: f64,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllJointAnglesResponse {
    pub angles: Vec<f64>,
    pub timestamp: String,
}

impl AllJointAnglesResponse {
    pub fn new(angles: JointAngles) -> Self {
        Self {
            angles: angles.as_slice().to_vec(),
            timestamp: timestamp(),
        }
    }
}

/// Returned by every command endpoint once the robot has taken the command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptedResponse {
    pub accepted: bool,
    pub message: String,
    pub timestamp: String,
}

impl AcceptedResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            accepted: true,
            message: message.into(),
            timestamp: timestamp(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobotStatusResponse {
    pub connected: bool,
    pub angles: Vec<f64>,
    pub is_moving: bool,
    pub last_error: Option<String>,
    pub timestamp: String,
}

impl From<RobotStatus> for RobotStatusResponse {
    fn from(status: RobotStatus) -> Self {
        Self {
            connected: status.connected,
            angles: status.joint_angles.as_slice().to_vec(),
            is_moving: status.is_moving,
            last_error: status.last_error,
            timestamp: timestamp(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitResponse {
    pub completed: bool,
    pub elapsed_time: f64,
}
