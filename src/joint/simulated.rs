//! In-process stand-in for the arm
//!
//! Joints ramp linearly toward their targets at `speed * degrees_per_speed`
//! degrees per second, which is enough for callers to observe motion,
//! stops and settling. Time is sampled lazily on every call.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use super::error::SdkError;
use super::sdk::{ArmSdk, EmergencyStop};
use super::types::{JogDirection, JointAngles, JointIndex, Speed, JOINT_COUNT};

const DEFAULT_DEGREES_PER_SPEED: f64 = 2.0;

#[derive(Debug)]
struct SimState {
    angles: [f64; JOINT_COUNT],
    targets: [f64; JOINT_COUNT],
    rates: [f64; JOINT_COUNT],
    updated: Instant,
}

impl SimState {
    fn advance(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.updated).as_secs_f64();
        self.updated = now;
        for i in 0..JOINT_COUNT {
            let remaining = self.targets[i] - self.angles[i];
            let step = self.rates[i] * dt;
            if remaining.abs() <= step {
                self.angles[i] = self.targets[i];
            } else {
                self.angles[i] += step.copysign(remaining);
            }
        }
    }

    fn moving(&self) -> bool {
        self.angles
            .iter()
            .zip(self.targets.iter())
            .any(|(a, t)| (a - t).abs() > f64::EPSILON)
    }

    fn halt(&mut self) {
        self.advance();
        self.targets = self.angles;
    }
}

/// Simulated arm; clones share the same state.
#[derive(Debug, Clone)]
pub struct SimulatedArm {
    state: Arc<Mutex<SimState>>,
    degrees_per_speed: f64,
}

impl SimulatedArm {
    pub fn new() -> Self {
        Self::with_rate(DEFAULT_DEGREES_PER_SPEED)
    }

    /// Degrees per second contributed by each unit of speed
    pub fn with_rate(degrees_per_speed: f64) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                angles: [0.0; JOINT_COUNT],
                targets: [0.0; JOINT_COUNT],
                rates: [0.0; JOINT_COUNT],
                updated: Instant::now(),
            })),
            degrees_per_speed,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn rate(&self, speed: Speed) -> f64 {
        f64::from(speed.get()) * self.degrees_per_speed
    }
}

impl Default for SimulatedArm {
    fn default() -> Self {
        Self::new()
    }
}

impl ArmSdk for SimulatedArm {
    fn send_angle(&mut self, joint: JointIndex, angle: f64, speed: Speed) -> Result<(), SdkError> {
        let rate = self.rate(speed);
        let mut state = self.lock();
        state.advance();
        state.targets[joint.offset()] = angle;
        state.rates[joint.offset()] = rate;
        Ok(())
    }

    fn send_angles(&mut self, angles: &JointAngles, speed: Speed) -> Result<(), SdkError> {
        let rate = self.rate(speed);
        let mut state = self.lock();
        state.advance();
        state.targets = angles.0;
        state.rates = [rate; JOINT_COUNT];
        Ok(())
    }

    fn get_angles(&mut self) -> Result<JointAngles, SdkError> {
        let mut state = self.lock();
        state.advance();
        Ok(JointAngles(state.angles))
    }

    fn jog_angle(
        &mut self,
        joint: JointIndex,
        direction: JogDirection,
        speed: Speed,
    ) -> Result<(), SdkError> {
        let limits = joint.limits();
        let target = match direction {
            JogDirection::Positive => limits.max,
            JogDirection::Negative => limits.min,
        };
        self.send_angle(joint, target, speed)
    }

    fn is_moving(&mut self) -> Result<bool, SdkError> {
        let mut state = self.lock();
        state.advance();
        Ok(state.moving())
    }

    fn is_connected(&self) -> bool {
        true
    }

    fn stop_channel(&mut self) -> Result<Box<dyn EmergencyStop>, SdkError> {
        Ok(Box::new(self.clone()))
    }
}

impl EmergencyStop for SimulatedArm {
    fn stop(&self) -> Result<(), SdkError> {
        self.lock().halt();
        Ok(())
    }
}
