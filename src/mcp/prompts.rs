//! Prompt templates filled in with live readings from the REST API

use std::fmt::Write as _;

use crate::joint::{JointIndex, DEFAULT_SPEED};

use super::client::RobotApiClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptSpec {
    pub name: &'static str,
    pub description: &'static str,
}

pub const PROMPTS: [PromptSpec; 3] = [
    PromptSpec {
        name: "robot_status",
        description: "Get current robot status and joint positions",
    },
    PromptSpec {
        name: "joint_info",
        description: "Joint limits, speed range and current joint angles",
    },
    PromptSpec {
        name: "basic_movements",
        description: "Examples of basic robot movement commands",
    },
];

pub fn find(name: &str) -> Option<&'static PromptSpec> {
    PROMPTS.iter().find(|p| p.name == name)
}

/// Render a prompt by name; `None` if no such prompt exists.
///
/// A failed live lookup becomes an error line in the text rather than an
/// error, so a prompt always renders.
pub async fn render(name: &str, api: &RobotApiClient) -> Option<String> {
    let text = match name {
        "robot_status" => robot_status(api).await,
        "joint_info" => joint_info(api).await,
        "basic_movements" => basic_movements(),
        _ => return None,
    };
    Some(text)
}

fn angle_lines(out: &mut String, angles: &[f64]) {
    for (joint, angle) in JointIndex::all().zip(angles) {
        let _ = writeln!(out, "- Joint {joint} ({}): {angle:.1}°", joint.name());
    }
}

async fn robot_status(api: &RobotApiClient) -> String {
    let status = match api.status().await {
        Ok(status) => status,
        Err(e) => return format!("Error getting robot status: {e}"),
    };

    let mut out = String::from("Robot Status:\n\nJoint Angles:\n");
    angle_lines(&mut out, &status.angles);
    let _ = write!(
        out,
        "\nMovement Status: {}\nConnected: {}",
        if status.is_moving { "Moving" } else { "Stationary" },
        if status.connected { "Yes" } else { "No" },
    );
    if let Some(err) = status.last_error {
        let _ = write!(out, "\nLast Error: {err}");
    }
    out
}

async fn joint_info(api: &RobotApiClient) -> String {
    let mut out = String::from("Robot Joint Information:\n\nJoint Limits:\n");
    for joint in JointIndex::all() {
        let limits = joint.limits();
        let _ = writeln!(
            out,
            "- Joint {joint} ({}): {}° to +{}°",
            joint.name(),
            limits.min,
            limits.max
        );
    }
    out.push_str("\nSpeed Range: 1-100\nHome Position: All joints at 0°\n\nCurrent Angles:\n");
    match api.joint_angles().await {
        Ok(reading) => angle_lines(&mut out, &reading.angles),
        Err(e) => {
            let _ = writeln!(out, "Error getting current angles: {e}");
        }
    }
    out.trim_end().to_string()
}

fn basic_movements() -> String {
    format!(
        "Basic Robot Movement Examples:\n\
         \n\
         1. Check current position:\n   get_all_joint_angles()\n\
         \n\
         2. Move a single joint:\n   move_joint(joint_num=1, angle=45, speed={DEFAULT_SPEED})\n\
         \n\
         3. Move all joints at once:\n   move_all_joints(angles=[0, 30, -30, 0, 45, 0], speed=30)\n\
         \n\
         4. Return to home position:\n   home_position(speed=30)\n\
         \n\
         5. Jog a joint:\n   jog_joint(joint_num=2, direction=1, speed=20)\n\
         \n\
         6. Wait for a movement to finish:\n   wait_for_completion(timeout=10)\n\
         \n\
         7. Emergency stop:\n   stop_robot()\n\
         \n\
         Always check robot status before and after movements for safety."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::client::ApiClientConfig;
    use std::time::Duration;

    fn offline_api() -> RobotApiClient {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        RobotApiClient::new(ApiClientConfig {
            read_attempts: 1,
            timeout: Duration::from_secs(1),
            ..ApiClientConfig::new("127.0.0.1", port)
        })
        .unwrap()
    }

    #[tokio::test]
    async fn unknown_prompt_renders_nothing() {
        assert!(render("dance", &offline_api()).await.is_none());
        assert!(find("dance").is_none());
        assert_eq!(find("joint_info").map(|p| p.name), Some("joint_info"));
    }

    #[tokio::test]
    async fn basic_movements_is_static() {
        let text = render("basic_movements", &offline_api()).await.unwrap();
        assert!(text.contains("move_joint(joint_num=1, angle=45, speed=50)"));
        assert!(text.contains("7. Emergency stop"));
        assert!(text.ends_with("for safety."));
    }

    #[tokio::test]
    async fn live_failures_render_as_error_lines() {
        let api = offline_api();
        let status = render("robot_status", &api).await.unwrap();
        assert!(status.starts_with("Error getting robot status:"), "{status}");

        let info = render("joint_info", &api).await.unwrap();
        assert!(info.contains("- Joint 6 (Wrist 3): -175° to +175°"), "{info}");
        assert!(info.contains("- Joint 1 (Base): -165° to +165°"));
        assert!(info.contains("Error getting current angles:"));
    }

    #[test]
    fn angles_use_one_decimal() {
        let mut out = String::new();
        angle_lines(&mut out, &[1.0, -2.34, 3.0, 4.0, 5.0, 6.0]);
        assert!(out.starts_with("- Joint 1 (Base): 1.0°\n- Joint 2 (Shoulder): -2.3°"));
    }
}
