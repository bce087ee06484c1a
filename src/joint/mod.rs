//! Joint-space control of the arm

pub mod controller;
pub mod error;
pub mod protocol;
pub mod sdk;
pub mod serial;
pub mod simulated;
pub mod types;

pub use controller::{ControllerOptions, JointController, MotionPolicy};
pub use error::{JointError, SdkError};
pub use sdk::{ArmSdk, EmergencyStop};
pub use serial::SerialArm;
pub use simulated::SimulatedArm;
pub use types::{
    JogDirection, JointAngles, JointIndex, JointLimits, RobotStatus, Speed, DEFAULT_SPEED,
    JOINT_COUNT, JOINT_NAMES,
};
