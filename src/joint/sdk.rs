//! The boundary between the controller and whatever actually moves the arm
//!
//! Implementations are blocking: the controller drives them from
//! `spawn_blocking` and never calls two methods concurrently.

use super::error::SdkError;
use super::types::{JogDirection, JointAngles, JointIndex, Speed};

/// Commands the vendor SDK exposes for joint-space control
pub trait ArmSdk: Send + 'static {
    fn send_angle(&mut self, joint: JointIndex, angle: f64, speed: Speed) -> Result<(), SdkError>;

    fn send_angles(&mut self, angles: &JointAngles, speed: Speed) -> Result<(), SdkError>;

    fn get_angles(&mut self) -> Result<JointAngles, SdkError>;

    fn jog_angle(
        &mut self,
        joint: JointIndex,
        direction: JogDirection,
        speed: Speed,
    ) -> Result<(), SdkError>;

    fn is_moving(&mut self) -> Result<bool, SdkError>;

    /// Whether the link is believed to be up
    fn is_connected(&self) -> bool;

    /// Open an independent path for emergency stops.
    ///
    /// The returned handle must be usable while another thread is inside
    /// one of the methods above.
    fn stop_channel(&mut self) -> Result<Box<dyn EmergencyStop>, SdkError>;

    /// Release the link. Called once when the controller shuts down.
    fn close(&mut self) -> Result<(), SdkError> {
        Ok(())
    }
}

/// Fire-and-forget stop path, independent of the command link
pub trait EmergencyStop: Send + Sync + 'static {
    fn stop(&self) -> Result<(), SdkError>;
}
