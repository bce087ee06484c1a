//! `ArmSdk` over the controller board's USB serial link

use std::io::{Read, Write};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serialport::{ClearBuffer, SerialPort};

use super::error::SdkError;
use super::protocol::{self, Command, Frame};
use super::sdk::{ArmSdk, EmergencyStop};
use super::types::{JogDirection, JointAngles, JointIndex, Speed};

/// How long to wait for a reply frame
const REPLY_TIMEOUT: Duration = Duration::from_millis(500);

/// The board resets when the port opens and ignores commands until it settles.
const SETTLE_DELAY: Duration = Duration::from_millis(500);

pub struct SerialArm {
    path: String,
    port: Option<Box<dyn SerialPort>>,
    rx: Vec<u8>,
}

impl SerialArm {
    pub fn open(path: &str, baud_rate: u32) -> Result<Self, SdkError> {
        let port = serialport::new(path, baud_rate)
            .timeout(Duration::from_millis(50))
            .open()?;
        tracing::info!(port = %path, baud_rate, "serial link opened");
        std::thread::sleep(SETTLE_DELAY);
        Ok(Self {
            path: path.to_string(),
            port: Some(port),
            rx: Vec::with_capacity(64),
        })
    }

    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>, SdkError> {
        self.port.as_mut().ok_or(SdkError::Disconnected)
    }

    fn send(&mut self, frame: &[u8]) -> Result<(), SdkError> {
        let port = self.port()?;
        port.write_all(frame)?;
        port.flush()?;
        Ok(())
    }

    /// Send a query and wait for the reply carrying the same command code
    fn query(&mut self, command: Command, data: &[u8]) -> Result<Frame, SdkError> {
        self.port()?.clear(ClearBuffer::Input)?;
        self.rx.clear();
        self.send(&protocol::encode(command, data))?;

        let deadline = Instant::now() + REPLY_TIMEOUT;
        let mut chunk = [0u8; 64];
        while Instant::now() < deadline {
            match self.port()?.read(&mut chunk) {
                Ok(0) => {}
                Ok(n) => self.rx.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => return Err(e.into()),
            }
            while let Some((frame, consumed)) = protocol::find_frame(&self.rx) {
                self.rx.drain(..consumed);
                if frame.command == command.code() {
                    return Ok(frame);
                }
                tracing::trace!(command = frame.command, "ignoring unrelated frame");
            }
        }
        Err(SdkError::Timeout {
            command: command.code(),
            timeout_ms: REPLY_TIMEOUT.as_millis() as u64,
        })
    }
}

impl ArmSdk for SerialArm {
    fn send_angle(&mut self, joint: JointIndex, angle: f64, speed: Speed) -> Result<(), SdkError> {
        self.send(&protocol::send_angle(joint, angle, speed))
    }

    fn send_angles(&mut self, angles: &JointAngles, speed: Speed) -> Result<(), SdkError> {
        self.send(&protocol::send_angles(angles, speed))
    }

    fn get_angles(&mut self) -> Result<JointAngles, SdkError> {
        let reply = self.query(Command::GetAngles, &[])?;
        protocol::decode_angles(&reply.data).ok_or_else(|| SdkError::Protocol {
            command: Command::GetAngles.code(),
            reason: format!("expected 12 data bytes, got {}", reply.data.len()),
        })
    }

    fn jog_angle(
        &mut self,
        joint: JointIndex,
        direction: JogDirection,
        speed: Speed,
    ) -> Result<(), SdkError> {
        self.send(&protocol::jog_angle(joint, direction, speed))
    }

    fn is_moving(&mut self) -> Result<bool, SdkError> {
        let reply = self.query(Command::IsMoving, &[])?;
        match reply.data.first() {
            Some(flag) => Ok(*flag == 1),
            None => Err(SdkError::Protocol {
                command: Command::IsMoving.code(),
                reason: "empty reply".to_string(),
            }),
        }
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    fn stop_channel(&mut self) -> Result<Box<dyn EmergencyStop>, SdkError> {
        let clone = self.port()?.try_clone()?;
        Ok(Box::new(SerialStop {
            port: Mutex::new(clone),
        }))
    }

    fn close(&mut self) -> Result<(), SdkError> {
        if self.port.take().is_some() {
            tracing::info!(port = %self.path, "serial link closed");
        }
        Ok(())
    }
}

/// Second handle on the same port; a stop frame goes out in one write.
struct SerialStop {
    port: Mutex<Box<dyn SerialPort>>,
}

impl EmergencyStop for SerialStop {
    fn stop(&self) -> Result<(), SdkError> {
        let mut port = self
            .port
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        port.write_all(&protocol::encode(Command::Stop, &[]))?;
        port.flush()?;
        Ok(())
    }
}
