//! Validated value types for joint commands
//!
//! Every type here can only be constructed through a checking constructor,
//! so anything that reaches the SDK has already passed range validation.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::JointError;

/// Number of joints on the arm
pub const JOINT_COUNT: usize = 6;

/// Speed used when a caller does not supply one
pub const DEFAULT_SPEED: u8 = 50;

/// Human-readable joint names, indexed by `JointIndex::get() - 1`
pub const JOINT_NAMES: [&str; JOINT_COUNT] =
    ["Base", "Shoulder", "Elbow", "Wrist 1", "Wrist 2", "Wrist 3"];

/// Inclusive angle range for one joint, in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct JointLimits {
    pub min: f64,
    pub max: f64,
}

impl JointLimits {
    pub const fn symmetric(limit: f64) -> Self {
        Self { min: -limit, max: limit }
    }

    /// NaN and infinities are never contained.
    pub fn contains(&self, angle: f64) -> bool {
        angle.is_finite() && angle >= self.min && angle <= self.max
    }
}

/// A joint number in `1..=6`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct JointIndex(u8);

impl JointIndex {
    pub fn new(index: i64) -> Result<Self, JointError> {
        if (1..=JOINT_COUNT as i64).contains(&index) {
            Ok(Self(index as u8))
        } else {
            Err(JointError::InvalidJoint(index))
        }
    }

    /// All six joints in order
    pub fn all() -> impl Iterator<Item = JointIndex> {
        (1..=JOINT_COUNT as u8).map(JointIndex)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Zero-based position in a `JointAngles` array
    pub fn offset(self) -> usize {
        usize::from(self.0) - 1
    }

    pub fn name(self) -> &'static str {
        JOINT_NAMES[self.offset()]
    }

    /// Joints 1-5 travel ±165°, the last wrist joint ±175°.
    pub fn limits(self) -> JointLimits {
        match self.0 {
            6 => JointLimits::symmetric(175.0),
            _ => JointLimits::symmetric(165.0),
        }
    }

    /// Check `angle` against this joint's limits
    pub fn check_angle(self, angle: f64) -> Result<f64, JointError> {
        let limits = self.limits();
        if limits.contains(angle) {
            Ok(angle)
        } else {
            Err(JointError::AngleOutOfRange {
                joint: self.0,
                angle,
                min: limits.min,
                max: limits.max,
            })
        }
    }
}

impl fmt::Display for JointIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Movement speed in `1..=100`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Speed(u8);

impl Speed {
    pub fn new(speed: i64) -> Result<Self, JointError> {
        if (1..=100).contains(&speed) {
            Ok(Self(speed as u8))
        } else {
            Err(JointError::InvalidSpeed(speed))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for Speed {
    fn default() -> Self {
        Self(DEFAULT_SPEED)
    }
}

/// Jog direction, `1` or `-1` on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JogDirection {
    Positive,
    Negative,
}

impl JogDirection {
    pub fn new(direction: i64) -> Result<Self, JointError> {
        match direction {
            1 => Ok(Self::Positive),
            -1 => Ok(Self::Negative),
            other => Err(JointError::InvalidDirection(other)),
        }
    }

    pub fn as_i8(self) -> i8 {
        match self {
            Self::Positive => 1,
            Self::Negative => -1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
        }
    }
}

/// One angle per joint, in joint order
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JointAngles(pub [f64; JOINT_COUNT]);

impl JointAngles {
    pub const HOME: JointAngles = JointAngles([0.0; JOINT_COUNT]);

    /// Build a validated target pose: exactly six angles, each inside its joint's range.
    pub fn checked(angles: &[f64]) -> Result<Self, JointError> {
        if angles.len() != JOINT_COUNT {
            return Err(JointError::WrongAngleCount(angles.len()));
        }
        let mut out = [0.0; JOINT_COUNT];
        for (joint, (slot, angle)) in JointIndex::all().zip(out.iter_mut().zip(angles)) {
            *slot = joint.check_angle(*angle)?;
        }
        Ok(Self(out))
    }

    pub fn get(&self, joint: JointIndex) -> f64 {
        self.0[joint.offset()]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Largest absolute per-joint difference between two readings
    pub fn max_delta(&self, other: &JointAngles) -> f64 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max)
    }
}

/// Live snapshot of the arm, produced on demand
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RobotStatus {
    pub connected: bool,
    #[serde(rename = "angles")]
    pub joint_angles: JointAngles,
    pub is_moving: bool,
    pub last_error: Option<String>,
}
