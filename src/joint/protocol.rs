//! Serial frame codec for the arm's controller board
//!
//! Frame layout: `FE FE <len> <command> <data..> FA`, where `len` counts the
//! command byte, the data and the footer. Angles travel as big-endian `i16`
//! hundredths of a degree.

use super::types::{JogDirection, JointAngles, JointIndex, Speed, JOINT_COUNT};

pub const HEADER: u8 = 0xFE;
pub const FOOTER: u8 = 0xFA;

/// Controller command codes used by this crate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    GetAngles = 0x20,
    SendAngle = 0x21,
    SendAngles = 0x22,
    Stop = 0x29,
    IsMoving = 0x2B,
    JogAngle = 0x30,
}

impl Command {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// A decoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: u8,
    pub data: Vec<u8>,
}

pub fn encode(command: Command, data: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(data.len() + 5);
    frame.extend_from_slice(&[HEADER, HEADER, (data.len() + 2) as u8, command.code()]);
    frame.extend_from_slice(data);
    frame.push(FOOTER);
    frame
}

pub fn encode_angle(angle: f64) -> [u8; 2] {
    ((angle * 100.0).round() as i16).to_be_bytes()
}

pub fn send_angle(joint: JointIndex, angle: f64, speed: Speed) -> Vec<u8> {
    let [hi, lo] = encode_angle(angle);
    encode(Command::SendAngle, &[joint.get(), hi, lo, speed.get()])
}

pub fn send_angles(angles: &JointAngles, speed: Speed) -> Vec<u8> {
    let mut data: Vec<u8> = angles.0.iter().flat_map(|a| encode_angle(*a)).collect();
    data.push(speed.get());
    encode(Command::SendAngles, &data)
}

/// The controller expects `0` for decreasing and `1` for increasing.
pub fn jog_angle(joint: JointIndex, direction: JogDirection, speed: Speed) -> Vec<u8> {
    let dir = match direction {
        JogDirection::Positive => 1,
        JogDirection::Negative => 0,
    };
    encode(Command::JogAngle, &[joint.get(), dir, speed.get()])
}

/// Locate the first complete, well-formed frame in `buf`.
///
/// Returns the frame and the number of bytes consumed up to and including
/// its footer. Garbage before a frame and frames with a bad footer are
/// skipped; `None` means more bytes are needed.
pub fn find_frame(buf: &[u8]) -> Option<(Frame, usize)> {
    for start in 0..buf.len().saturating_sub(2) {
        if buf[start] != HEADER || buf[start + 1] != HEADER {
            continue;
        }
        let len = buf[start + 2] as usize;
        // header(2) + len byte + len bytes (command, data, footer)
        let end = start + 3 + len;
        if len < 2 || buf.len() < end || buf[end - 1] != FOOTER {
            continue;
        }
        let frame = Frame {
            command: buf[start + 3],
            data: buf[start + 4..end - 1].to_vec(),
        };
        return Some((frame, end));
    }
    None
}

/// Decode the payload of a `GetAngles` reply
pub fn decode_angles(data: &[u8]) -> Option<JointAngles> {
    if data.len() != JOINT_COUNT * 2 {
        return None;
    }
    let mut angles = [0.0; JOINT_COUNT];
    for (slot, pair) in angles.iter_mut().zip(data.chunks_exact(2)) {
        *slot = f64::from(i16::from_be_bytes([pair[0], pair[1]])) / 100.0;
    }
    Some(JointAngles(angles))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_angle_frame_layout() {
        let joint = JointIndex::new(1).unwrap();
        let frame = send_angle(joint, 45.5, Speed::new(50).unwrap());
        // 4550 = 0x11C6
        assert_eq!(frame, vec![0xFE, 0xFE, 0x06, 0x21, 0x01, 0x11, 0xC6, 0x32, 0xFA]);
    }

    #[test]
    fn negative_angles_use_twos_complement() {
        assert_eq!(encode_angle(-90.0), (-9000i16).to_be_bytes());
    }

    #[test]
    fn jog_maps_direction_to_controller_convention() {
        let joint = JointIndex::new(2).unwrap();
        let frame = jog_angle(joint, JogDirection::Negative, Speed::new(10).unwrap());
        assert_eq!(frame, vec![0xFE, 0xFE, 0x05, 0x30, 0x02, 0x00, 0x0A, 0xFA]);
    }

    #[test]
    fn stop_frame_has_no_data() {
        assert_eq!(encode(Command::Stop, &[]), vec![0xFE, 0xFE, 0x02, 0x29, 0xFA]);
    }

    #[test]
    fn find_frame_skips_leading_noise() {
        let mut buf = vec![0x00, 0x13, 0xFE];
        buf.extend(encode(Command::IsMoving, &[0x01]));
        let (frame, consumed) = find_frame(&buf).unwrap();
        assert_eq!(frame.command, Command::IsMoving.code());
        assert_eq!(frame.data, vec![0x01]);
        assert_eq!(consumed, buf.len());
    }

    #[test]
    fn find_frame_waits_for_incomplete_frame() {
        let full = encode(Command::IsMoving, &[0x00]);
        assert!(find_frame(&full[..full.len() - 1]).is_none());
    }

    #[test]
    fn find_frame_skips_bad_footer() {
        let mut buf = vec![0xFE, 0xFE, 0x03, 0x2B, 0x01, 0x00];
        buf.extend(encode(Command::IsMoving, &[0x00]));
        let (frame, _) = find_frame(&buf).unwrap();
        assert_eq!(frame.data, vec![0x00]);
    }

    #[test]
    fn decode_angles_reads_hundredths() {
        let mut data = Vec::new();
        for a in [12.34, -56.78, 0.0, 90.0, -165.0, 175.0] {
            data.extend(encode_angle(a));
        }
        let angles = decode_angles(&data).unwrap();
        assert!((angles.0[0] - 12.34).abs() < 1e-9);
        assert!((angles.0[1] + 56.78).abs() < 1e-9);
        assert_eq!(angles.0[5], 175.0);
        assert!(decode_angles(&data[..10]).is_none());
    }
}
