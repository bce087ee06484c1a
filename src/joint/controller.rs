//! Joint controller: validation, serialization of SDK access, priority stop
//!
//! All SDK calls run on the blocking pool behind one mutex so commands never
//! interleave on the link. Motion commands additionally pass a single-permit
//! gate whose behavior under contention is set by [`MotionPolicy`]. `stop()`
//! bypasses both through the SDK's emergency-stop channel and bumps the stop
//! epoch, which cancels any motion command still waiting its turn.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::sync::{Semaphore, SemaphorePermit};

use super::error::{JointError, SdkError};
use super::sdk::{ArmSdk, EmergencyStop};
use super::types::{JogDirection, JointAngles, JointIndex, RobotStatus, Speed};

/// What a motion command does when another one holds the motion gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum MotionPolicy {
    /// Wait for the in-flight command to finish
    #[default]
    Queue,
    /// Fail immediately with [`JointError::Busy`]
    Reject,
}

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub poll_interval: Duration,
    pub settle_tolerance: f64,
    pub motion_policy: MotionPolicy,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            settle_tolerance: 0.05,
            motion_policy: MotionPolicy::Queue,
        }
    }
}

struct Inner {
    sdk: Mutex<Box<dyn ArmSdk>>,
    estop: Arc<dyn EmergencyStop>,
    motion_gate: Semaphore,
    stop_epoch: AtomicU64,
    last_error: Mutex<Option<String>>,
    options: ControllerOptions,
}

impl Inner {
    fn sdk(&self) -> MutexGuard<'_, Box<dyn ArmSdk>> {
        self.sdk.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record_error(&self, op: &str, err: &SdkError) {
        tracing::warn!(op, error = %err, "robot command failed");
        *self
            .last_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(err.to_string());
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Err(e) = self.sdk().close() {
            tracing::warn!(error = %e, "failed to close robot link");
        }
    }
}

/// Owns the SDK connection; clones share it.
#[derive(Clone)]
pub struct JointController {
    inner: Arc<Inner>,
}

impl JointController {
    pub fn new(sdk: impl ArmSdk, options: ControllerOptions) -> Result<Self, JointError> {
        let mut sdk: Box<dyn ArmSdk> = Box::new(sdk);
        let estop: Arc<dyn EmergencyStop> = Arc::from(sdk.stop_channel()?);
        tracing::debug!(policy = ?options.motion_policy, "joint controller ready");
        Ok(Self {
            inner: Arc::new(Inner {
                sdk: Mutex::new(sdk),
                estop,
                motion_gate: Semaphore::new(1),
                stop_epoch: AtomicU64::new(0),
                last_error: Mutex::new(None),
                options,
            }),
        })
    }

    pub fn options(&self) -> &ControllerOptions {
        &self.inner.options
    }

    /// Run `f` against the SDK on the blocking pool.
    ///
    /// With `issued` set, the call is dropped as cancelled if a stop happened
    /// after the command was issued.
    async fn call<T, F>(&self, op: &'static str, issued: Option<u64>, f: F) -> Result<T, JointError>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn ArmSdk) -> Result<T, SdkError> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let result = tokio::task::spawn_blocking(move || {
            let mut sdk = inner.sdk();
            if let Some(epoch) = issued {
                if inner.stop_epoch.load(Ordering::SeqCst) != epoch {
                    return Err(JointError::Cancelled);
                }
            }
            f(&mut **sdk).map_err(|e| {
                inner.record_error(op, &e);
                JointError::Communication(e)
            })
        })
        .await;

        match result {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(op, error = %e, "robot command task failed");
                Err(JointError::Internal(format!("{op} task failed: {e}")))
            }
        }
    }

    async fn acquire_gate(&self) -> Result<SemaphorePermit<'_>, JointError> {
        let gate = &self.inner.motion_gate;
        match self.inner.options.motion_policy {
            MotionPolicy::Queue => gate
                .acquire()
                .await
                .map_err(|_| JointError::Internal("motion gate closed".to_string())),
            MotionPolicy::Reject => gate.try_acquire().map_err(|_| JointError::Busy),
        }
    }

    async fn motion<F>(&self, op: &'static str, f: F) -> Result<(), JointError>
    where
        F: FnOnce(&mut dyn ArmSdk) -> Result<(), SdkError> + Send + 'static,
    {
        let issued = self.inner.stop_epoch.load(Ordering::SeqCst);
        let _permit = self.acquire_gate().await?;
        if self.inner.stop_epoch.load(Ordering::SeqCst) != issued {
            tracing::info!(op, "motion command cancelled by stop");
            return Err(JointError::Cancelled);
        }
        self.call(op, Some(issued), f).await
    }

    pub async fn move_joint(&self, joint: i64, angle: f64, speed: i64) -> Result<(), JointError> {
        let joint = JointIndex::new(joint)?;
        let angle = joint.check_angle(angle)?;
        let speed = Speed::new(speed)?;
        tracing::info!(joint = %joint, angle, speed = speed.get(), "moving joint");
        self.motion("move_joint", move |sdk| sdk.send_angle(joint, angle, speed))
            .await
    }

    pub async fn move_all_joints(&self, angles: &[f64], speed: i64) -> Result<(), JointError> {
        let angles = JointAngles::checked(angles)?;
        let speed = Speed::new(speed)?;
        tracing::info!(angles = ?angles.0, speed = speed.get(), "moving all joints");
        self.motion("move_all_joints", move |sdk| sdk.send_angles(&angles, speed))
            .await
    }

    /// Send every joint to 0°
    pub async fn home(&self, speed: i64) -> Result<(), JointError> {
        self.move_all_joints(JointAngles::HOME.as_slice(), speed).await
    }

    pub async fn jog_joint(&self, joint: i64, direction: i64, speed: i64) -> Result<(), JointError> {
        let joint = JointIndex::new(joint)?;
        let direction = JogDirection::new(direction)?;
        let speed = Speed::new(speed)?;
        tracing::info!(joint = %joint, direction = direction.label(), speed = speed.get(), "jogging joint");
        self.motion("jog_joint", move |sdk| sdk.jog_angle(joint, direction, speed))
            .await
    }

    pub async fn get_joint_angle(&self, joint: i64) -> Result<f64, JointError> {
        let joint = JointIndex::new(joint)?;
        let angles = self.get_all_joint_angles().await?;
        Ok(angles.get(joint))
    }

    pub async fn get_all_joint_angles(&self) -> Result<JointAngles, JointError> {
        self.call("get_angles", None, |sdk| sdk.get_angles()).await
    }

    pub async fn is_moving(&self) -> Result<bool, JointError> {
        self.call("is_moving", None, |sdk| sdk.is_moving()).await
    }

    /// Whether the link is up, without talking to the robot
    pub async fn is_connected(&self) -> bool {
        self.call("is_connected", None, |sdk| Ok(sdk.is_connected()))
            .await
            .unwrap_or(false)
    }

    /// Halt all motion.
    ///
    /// Goes straight to the emergency-stop channel, never waits behind queued
    /// motion, and cancels every motion command issued before it.
    pub async fn stop(&self) -> Result<(), JointError> {
        let epoch = self.inner.stop_epoch.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::warn!(epoch, "emergency stop");
        let inner = Arc::clone(&self.inner);
        let result = tokio::task::spawn_blocking(move || {
            inner.estop.stop().map_err(|e| {
                inner.record_error("stop", &e);
                JointError::Communication(e)
            })
        })
        .await;
        match result {
            Ok(r) => r,
            Err(e) => Err(JointError::Internal(format!("stop task failed: {e}"))),
        }
    }

    /// Poll until the arm reports it has stopped and two consecutive
    /// readings agree within the settle tolerance.
    ///
    /// Returns `false` if the arm is still moving when `timeout` elapses.
    pub async fn wait_for_completion(&self, timeout: Duration) -> Result<bool, JointError> {
        let ControllerOptions {
            poll_interval,
            settle_tolerance,
            ..
        } = self.inner.options;
        let deadline = Instant::now() + timeout;
        let (mut previous, _) = self.sample().await?;

        loop {
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(poll_interval.min(deadline - now)).await;
            let (current, moving) = self.sample().await?;
            let delta = current.max_delta(&previous);
            if !moving && delta <= settle_tolerance {
                return Ok(true);
            }
            tracing::trace!(delta, moving, "arm still moving");
            previous = current;
        }
    }

    /// Angles and the moving flag, read under one lock
    async fn sample(&self) -> Result<(JointAngles, bool), JointError> {
        self.call("poll_motion", None, |sdk| {
            let angles = sdk.get_angles()?;
            Ok((angles, sdk.is_moving()?))
        })
        .await
    }

    /// Live snapshot; never cached
    pub async fn status(&self) -> Result<RobotStatus, JointError> {
        let (connected, joint_angles, is_moving) = self
            .call("status", None, |sdk| {
                let angles = sdk.get_angles()?;
                let moving = sdk.is_moving()?;
                Ok((sdk.is_connected(), angles, moving))
            })
            .await?;
        Ok(RobotStatus {
            connected,
            joint_angles,
            is_moving,
            last_error: self.last_error(),
        })
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner
            .last_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Close the robot link now rather than when the last clone drops
    pub async fn shutdown(&self) -> Result<(), JointError> {
        self.call("close", None, |sdk| sdk.close()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::joint::simulated::SimulatedArm;

    /// Arm that records every SDK call and can be made slow or broken
    #[derive(Clone, Default)]
    struct RecordingArm {
        calls: Arc<Mutex<Vec<String>>>,
        delay: Duration,
        fail: bool,
    }

    impl RecordingArm {
        fn log(&self, call: String) -> Result<(), SdkError> {
            self.calls.lock().unwrap().push(call);
            std::thread::sleep(self.delay);
            if self.fail {
                Err(SdkError::Disconnected)
            } else {
                Ok(())
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ArmSdk for RecordingArm {
        fn send_angle(&mut self, joint: JointIndex, angle: f64, _: Speed) -> Result<(), SdkError> {
            self.log(format!("send_angle {joint} {angle}"))
        }

        fn send_angles(&mut self, angles: &JointAngles, _: Speed) -> Result<(), SdkError> {
            self.log(format!("send_angles {:?}", angles.0))
        }

        fn get_angles(&mut self) -> Result<JointAngles, SdkError> {
            self.log("get_angles".to_string())?;
            Ok(JointAngles::HOME)
        }

        fn jog_angle(&mut self, joint: JointIndex, d: JogDirection, _: Speed) -> Result<(), SdkError> {
            self.log(format!("jog {joint} {}", d.as_i8()))
        }

        fn is_moving(&mut self) -> Result<bool, SdkError> {
            self.log("is_moving".to_string())?;
            Ok(false)
        }

        fn is_connected(&self) -> bool {
            !self.fail
        }

        fn stop_channel(&mut self) -> Result<Box<dyn EmergencyStop>, SdkError> {
            Ok(Box::new(RecordingStop(Arc::clone(&self.calls))))
        }
    }

    struct RecordingStop(Arc<Mutex<Vec<String>>>);

    impl EmergencyStop for RecordingStop {
        fn stop(&self) -> Result<(), SdkError> {
            self.0.lock().unwrap().push("stop".to_string());
            Ok(())
        }
    }

    fn controller(arm: RecordingArm, policy: MotionPolicy) -> JointController {
        let options = ControllerOptions {
            motion_policy: policy,
            ..Default::default()
        };
        JointController::new(arm, options).unwrap()
    }

    #[tokio::test]
    async fn validation_failures_never_reach_the_sdk() {
        let arm = RecordingArm::default();
        let ctl = controller(arm.clone(), MotionPolicy::Queue);

        assert!(matches!(ctl.move_joint(0, 0.0, 50).await, Err(JointError::InvalidJoint(0))));
        assert!(matches!(ctl.move_joint(7, 0.0, 50).await, Err(JointError::InvalidJoint(7))));
        assert!(matches!(
            ctl.move_joint(1, 165.01, 50).await,
            Err(JointError::AngleOutOfRange { joint: 1, .. })
        ));
        assert!(matches!(
            ctl.move_joint(6, -176.0, 50).await,
            Err(JointError::AngleOutOfRange { joint: 6, .. })
        ));
        assert!(matches!(ctl.move_joint(2, 10.0, 0).await, Err(JointError::InvalidSpeed(0))));
        assert!(matches!(ctl.move_joint(2, f64::NAN, 50).await, Err(JointError::AngleOutOfRange { .. })));
        assert!(matches!(ctl.jog_joint(2, 0, 50).await, Err(JointError::InvalidDirection(0))));
        assert!(matches!(
            ctl.move_all_joints(&[0.0; 5], 50).await,
            Err(JointError::WrongAngleCount(5))
        ));
        assert!(matches!(ctl.get_joint_angle(9).await, Err(JointError::InvalidJoint(9))));

        assert!(arm.calls().is_empty());
    }

    #[tokio::test]
    async fn limits_are_inclusive() {
        let arm = RecordingArm::default();
        let ctl = controller(arm.clone(), MotionPolicy::Queue);

        ctl.move_joint(1, -165.0, 50).await.unwrap();
        ctl.move_joint(6, 175.0, 50).await.unwrap();
        assert_eq!(arm.calls(), vec!["send_angle 1 -165", "send_angle 6 175"]);
    }

    #[tokio::test]
    async fn sdk_failure_is_communication_and_recorded() {
        let arm = RecordingArm {
            fail: true,
            ..Default::default()
        };
        let ctl = controller(arm, MotionPolicy::Queue);

        let err = ctl.move_joint(3, 10.0, 50).await.unwrap_err();
        assert!(matches!(err, JointError::Communication(SdkError::Disconnected)));
        assert!(!err.is_validation());
        assert_eq!(ctl.last_error().as_deref(), Some("robot link is closed"));
        assert!(!ctl.is_connected().await);
    }

    #[tokio::test]
    async fn home_sends_all_zeroes() {
        let arm = RecordingArm::default();
        let ctl = controller(arm.clone(), MotionPolicy::Queue);
        ctl.home(50).await.unwrap();
        assert_eq!(arm.calls(), vec![format!("send_angles {:?}", [0.0; 6])]);
    }

    #[tokio::test]
    async fn reject_policy_fails_fast_while_motion_in_flight() {
        let arm = RecordingArm {
            delay: Duration::from_millis(300),
            ..Default::default()
        };
        let ctl = controller(arm.clone(), MotionPolicy::Reject);

        let first = tokio::spawn({
            let ctl = ctl.clone();
            async move { ctl.move_joint(1, 10.0, 50).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(matches!(ctl.move_joint(2, 10.0, 50).await, Err(JointError::Busy)));
        first.await.unwrap().unwrap();
        assert_eq!(arm.calls(), vec!["send_angle 1 10"]);
    }

    #[tokio::test]
    async fn stop_bypasses_the_queue_and_cancels_waiting_motion() {
        let arm = RecordingArm {
            delay: Duration::from_millis(300),
            ..Default::default()
        };
        let ctl = controller(arm.clone(), MotionPolicy::Queue);

        let first = tokio::spawn({
            let ctl = ctl.clone();
            async move { ctl.move_joint(1, 10.0, 50).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        let queued = tokio::spawn({
            let ctl = ctl.clone();
            async move { ctl.move_joint(2, 20.0, 50).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let started = Instant::now();
        ctl.stop().await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(200));

        first.await.unwrap().unwrap();
        assert!(matches!(queued.await.unwrap(), Err(JointError::Cancelled)));
        assert_eq!(arm.calls(), vec!["send_angle 1 10", "stop"]);

        // commands issued after the stop run normally
        ctl.move_joint(3, 5.0, 50).await.unwrap();
    }

    #[tokio::test]
    async fn stop_while_moving_halts_the_arm() {
        let ctl = JointController::new(SimulatedArm::with_rate(1.0), ControllerOptions::default())
            .unwrap();
        ctl.move_joint(1, 90.0, 50).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(ctl.is_moving().await.unwrap());

        ctl.stop().await.unwrap();
        let after_stop = ctl.get_all_joint_angles().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(ctl.get_all_joint_angles().await.unwrap(), after_stop);
        assert!(!ctl.status().await.unwrap().is_moving);
    }

    #[tokio::test]
    async fn wait_reports_settled_arm() {
        let ctl = JointController::new(SimulatedArm::with_rate(1000.0), ControllerOptions {
            poll_interval: Duration::from_millis(20),
            ..Default::default()
        })
        .unwrap();
        ctl.move_joint(2, 30.0, 100).await.unwrap();
        assert!(ctl.wait_for_completion(Duration::from_secs(2)).await.unwrap());
        assert_eq!(ctl.get_joint_angle(2).await.unwrap(), 30.0);
    }

    #[tokio::test]
    async fn wait_times_out_while_still_moving() {
        let ctl = JointController::new(SimulatedArm::with_rate(1.0), ControllerOptions {
            poll_interval: Duration::from_millis(20),
            ..Default::default()
        })
        .unwrap();
        ctl.move_joint(2, 150.0, 10).await.unwrap();

        let started = Instant::now();
        assert!(!ctl.wait_for_completion(Duration::from_millis(150)).await.unwrap());
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn slow_motion_is_not_mistaken_for_settled() {
        // 0.2°/s moves far less than the settle tolerance between polls
        let ctl = JointController::new(SimulatedArm::with_rate(0.002), ControllerOptions {
            poll_interval: Duration::from_millis(20),
            ..Default::default()
        })
        .unwrap();
        ctl.move_joint(1, 150.0, 100).await.unwrap();

        assert!(!ctl.wait_for_completion(Duration::from_millis(200)).await.unwrap());
        assert!(ctl.is_moving().await.unwrap());

        ctl.stop().await.unwrap();
        assert!(ctl.wait_for_completion(Duration::from_millis(200)).await.unwrap());
    }

    #[tokio::test]
    async fn status_is_live() {
        let ctl = JointController::new(SimulatedArm::with_rate(1000.0), ControllerOptions::default())
            .unwrap();
        ctl.move_joint(4, -45.0, 100).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let status = ctl.status().await.unwrap();
        assert!(status.connected);
        assert!(!status.is_moving);
        assert_eq!(status.joint_angles.0[3], -45.0);
        assert!(status.last_error.is_none());
    }
}
