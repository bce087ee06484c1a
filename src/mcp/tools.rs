//! The fixed tool table
//!
//! Each tool has a typed argument struct (its JSON schema is derived from
//! it) and a handler that validates locally before touching the REST API.

use schemars::JsonSchema;
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};

use crate::api::dto::{DEFAULT_WAIT_TIMEOUT, WAIT_TIMEOUT_RANGE};
use crate::joint::{JogDirection, JointAngles, JointIndex, Speed, DEFAULT_SPEED};

use super::catalog::Catalog;
use super::dispatch::{ToolContext, ToolFuture, ToolSpec};
use super::error::ToolError;

fn default_speed() -> i64 {
    i64::from(DEFAULT_SPEED)
}

fn default_timeout() -> f64 {
    DEFAULT_WAIT_TIMEOUT
}

/// Accept `3` and `3.0` alike; reject fractional values
fn integral<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let number = serde_json::Number::deserialize(deserializer)?;
    if let Some(n) = number.as_i64() {
        return Ok(n);
    }
    match number.as_f64() {
        Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => Ok(f as i64),
        _ => Err(D::Error::custom(format!("expected an integer, found {number}"))),
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchArgs {
    /// Keywords to look for, e.g. "joint limits"
    pub query: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FetchArgs {
    /// Resource id returned by `search`
    pub id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct JointArgs {
    /// Joint number (1-6)
    #[schemars(range(min = 1, max = 6))]
    #[serde(deserialize_with = "integral")]
    pub joint_num: i64,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct MoveJointArgs {
    /// Joint number (1-6)
    #[schemars(range(min = 1, max = 6))]
    #[serde(deserialize_with = "integral")]
    pub joint_num: i64,
    /// Target angle in degrees (joints 1-5: -165 to 165, joint 6: -175 to 175)
    #[schemars(range(min = -175.0, max = 175.0))]
    pub angle: f64,
    /// Movement speed (1-100)
    #[serde(default = "default_speed", deserialize_with = "integral")]
    #[schemars(range(min = 1, max = 100))]
    pub speed: i64,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct MoveAllJointsArgs {
    /// Six target angles in degrees, joint 1 first
    #[schemars(length(min = 6, max = 6))]
    pub angles: Vec<f64>,
    /// Movement speed (1-100)
    #[serde(default = "default_speed", deserialize_with = "integral")]
    #[schemars(range(min = 1, max = 100))]
    pub speed: i64,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SpeedArgs {
    /// Movement speed (1-100)
    #[serde(default = "default_speed", deserialize_with = "integral")]
    #[schemars(range(min = 1, max = 100))]
    pub speed: i64,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct JogJointArgs {
    /// Joint number (1-6)
    #[schemars(range(min = 1, max = 6))]
    #[serde(deserialize_with = "integral")]
    pub joint_num: i64,
    /// 1 for positive, -1 for negative
    #[serde(deserialize_with = "integral")]
    pub direction: i64,
    /// Jog speed (1-100)
    #[serde(default = "default_speed", deserialize_with = "integral")]
    #[schemars(range(min = 1, max = 100))]
    pub speed: i64,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct WaitArgs {
    /// Maximum time to wait, in seconds
    #[serde(default = "default_timeout")]
    #[schemars(range(min = 0.1, max = 60.0))]
    pub timeout: f64,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct NoArgs {}

fn parse<A: DeserializeOwned>(args: Value) -> Result<A, ToolError> {
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

fn joints_payload(angles: &[f64]) -> Value {
    let joints: Vec<Value> = JointIndex::all()
        .zip(angles)
        .map(|(joint, angle)| {
            json!({
                "joint": joint.get(),
                "angle": angle,
                "name": format!("{} Joint", joint.name()),
            })
        })
        .collect();
    Value::Array(joints)
}

fn search(_: ToolContext, args: Value) -> ToolFuture {
    Box::pin(async move {
        let args: SearchArgs = parse(args)?;
        Ok(json!(Catalog::new().search(&args.query)))
    })
}

fn fetch(ctx: ToolContext, args: Value) -> ToolFuture {
    Box::pin(async move {
        let args: FetchArgs = parse(args)?;
        Catalog::new().fetch(&args.id, &ctx.api).await
    })
}

fn get_joint_angle(ctx: ToolContext, args: Value) -> ToolFuture {
    Box::pin(async move {
        let args: JointArgs = parse(args)?;
        let joint = JointIndex::new(args.joint_num)?;
        let reading = ctx.api.joint_angle(i64::from(joint.get())).await?;
        Ok(json!({
            "joint_num": joint.get(),
            "angle": reading.angle,
            "unit": "degrees",
        }))
    })
}

fn move_joint(ctx: ToolContext, args: Value) -> ToolFuture {
    Box::pin(async move {
        let args: MoveJointArgs = parse(args)?;
        let joint = JointIndex::new(args.joint_num)?;
        let angle = joint.check_angle(args.angle)?;
        let speed = Speed::new(args.speed)?;
        let accepted = ctx
            .api
            .move_joint(i64::from(joint.get()), angle, i64::from(speed.get()))
            .await?;
        Ok(json!({
            "success": accepted.accepted,
            "message": accepted.message,
            "joint_num": joint.get(),
            "target_angle": angle,
            "speed": speed.get(),
        }))
    })
}

fn get_all_joint_angles(ctx: ToolContext, args: Value) -> ToolFuture {
    Box::pin(async move {
        let _: NoArgs = parse(args)?;
        let reading = ctx.api.joint_angles().await?;
        Ok(json!({
            "joint_angles": reading.angles,
            "joints": joints_payload(&reading.angles),
            "unit": "degrees",
        }))
    })
}

fn move_all_joints(ctx: ToolContext, args: Value) -> ToolFuture {
    Box::pin(async move {
        let args: MoveAllJointsArgs = parse(args)?;
        let target = JointAngles::checked(&args.angles)?;
        let speed = Speed::new(args.speed)?;
        let accepted = ctx
            .api
            .move_all_joints(target.as_slice(), i64::from(speed.get()))
            .await?;
        Ok(json!({
            "success": accepted.accepted,
            "message": accepted.message,
            "target_angles": target.as_slice(),
            "speed": speed.get(),
        }))
    })
}

fn home_position(ctx: ToolContext, args: Value) -> ToolFuture {
    Box::pin(async move {
        let args: SpeedArgs = parse(args)?;
        let speed = Speed::new(args.speed)?;
        let accepted = ctx.api.home(i64::from(speed.get())).await?;
        Ok(json!({
            "success": accepted.accepted,
            "message": accepted.message,
            "target_angles": JointAngles::HOME.as_slice(),
            "speed": speed.get(),
        }))
    })
}

fn stop_robot(ctx: ToolContext, _: Value) -> ToolFuture {
    // arguments are ignored so a malformed call still stops the arm
    Box::pin(async move {
        let accepted = ctx.api.stop().await?;
        Ok(json!({
            "success": accepted.accepted,
            "message": accepted.message,
        }))
    })
}

fn jog_joint(ctx: ToolContext, args: Value) -> ToolFuture {
    Box::pin(async move {
        let args: JogJointArgs = parse(args)?;
        let joint = JointIndex::new(args.joint_num)?;
        let direction = JogDirection::new(args.direction)?;
        let speed = Speed::new(args.speed)?;
        let accepted = ctx
            .api
            .jog_joint(
                i64::from(joint.get()),
                i64::from(direction.as_i8()),
                i64::from(speed.get()),
            )
            .await?;
        Ok(json!({
            "success": accepted.accepted,
            "message": accepted.message,
            "joint_num": joint.get(),
            "direction": direction.as_i8(),
            "speed": speed.get(),
        }))
    })
}

fn wait_for_completion(ctx: ToolContext, args: Value) -> ToolFuture {
    Box::pin(async move {
        let args: WaitArgs = parse(args)?;
        if !WAIT_TIMEOUT_RANGE.contains(&args.timeout) {
            return Err(ToolError::Validation(format!(
                "Timeout must be between {} and {} seconds, got {}",
                WAIT_TIMEOUT_RANGE.start(),
                WAIT_TIMEOUT_RANGE.end(),
                args.timeout
            )));
        }
        let outcome = ctx.api.wait_for_completion(args.timeout).await?;
        Ok(json!({
            "completed": outcome.completed,
            "elapsed_time": outcome.elapsed_time,
            "timeout": args.timeout,
        }))
    })
}

fn get_robot_status(ctx: ToolContext, args: Value) -> ToolFuture {
    Box::pin(async move {
        let _: NoArgs = parse(args)?;
        let status = ctx.api.status().await?;
        Ok(json!({
            "connected": status.connected,
            "joint_angles": status.angles,
            "is_moving": status.is_moving,
            "last_error": status.last_error,
            "joints": joints_payload(&status.angles),
            "unit": "degrees",
        }))
    })
}

/// Every tool the MCP server exposes, in manifest order
pub fn all_tools() -> Vec<ToolSpec> {
    vec![
        ToolSpec::new::<SearchArgs>(
            "search",
            "Search robot resources (status, joints, movements, positions) by keyword",
            search,
        ),
        ToolSpec::new::<FetchArgs>(
            "fetch",
            "Fetch the full content of a robot resource by id, with live data where available",
            fetch,
        ),
        ToolSpec::new::<JointArgs>(
            "get_joint_angle",
            "Get current angle of a specific joint (1-6)",
            get_joint_angle,
        ),
        ToolSpec::new::<MoveJointArgs>(
            "move_joint",
            "Move a specific joint to target angle",
            move_joint,
        ),
        ToolSpec::new::<NoArgs>(
            "get_all_joint_angles",
            "Get current angles of all joints",
            get_all_joint_angles,
        ),
        ToolSpec::new::<MoveAllJointsArgs>(
            "move_all_joints",
            "Move all joints to target angles simultaneously",
            move_all_joints,
        ),
        ToolSpec::new::<SpeedArgs>(
            "home_position",
            "Move robot to home position (all joints at 0 degrees)",
            home_position,
        ),
        ToolSpec::new::<NoArgs>(
            "stop_robot",
            "Emergency stop - immediately stop all robot movement",
            stop_robot,
        ),
        ToolSpec::new::<JogJointArgs>(
            "jog_joint",
            "Jog a joint continuously in a direction",
            jog_joint,
        ),
        ToolSpec::new::<WaitArgs>(
            "wait_for_completion",
            "Wait for current robot movement to complete",
            wait_for_completion,
        ),
        ToolSpec::new::<NoArgs>(
            "get_robot_status",
            "Get comprehensive robot status including joint angles and movement state",
            get_robot_status,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::client::{ApiClientConfig, RobotApiClient};
    use crate::mcp::dispatch::{Dispatcher, ToolInvocation};
    use std::time::Duration;

    /// Points at a closed port, so any HTTP call fails with a connect error
    fn offline() -> Dispatcher {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let api = RobotApiClient::new(ApiClientConfig {
            read_attempts: 1,
            timeout: Duration::from_secs(1),
            ..ApiClientConfig::new("127.0.0.1", port)
        })
        .unwrap();
        Dispatcher::new(ToolContext { api }, all_tools())
    }

    async fn error_of(d: &Dispatcher, tool: &str, args: Value) -> String {
        let result = d.invoke(ToolInvocation::new(tool, args)).await;
        assert!(!result.success, "{tool} unexpectedly succeeded");
        result.error_message.unwrap()
    }

    #[test]
    fn manifest_has_eleven_tools_in_order() {
        let names: Vec<_> = all_tools().iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            [
                "search",
                "fetch",
                "get_joint_angle",
                "move_joint",
                "get_all_joint_angles",
                "move_all_joints",
                "home_position",
                "stop_robot",
                "jog_joint",
                "wait_for_completion",
                "get_robot_status",
            ]
        );
    }

    #[test]
    fn schemas_carry_defaults_and_required_fields() {
        let tools = all_tools();
        let move_joint = tools.iter().find(|t| t.name == "move_joint").unwrap();
        let schema = &move_joint.input_schema;
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["speed"]["default"], 50);
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert!(required.contains(&"joint_num"));
        assert!(required.contains(&"angle"));
        assert!(!required.contains(&"speed"));

        let stop = tools.iter().find(|t| t.name == "stop_robot").unwrap();
        assert_eq!(stop.input_schema["type"], "object");
    }

    #[tokio::test]
    async fn range_errors_are_caught_before_any_request() {
        let d = offline();
        assert_eq!(
            error_of(&d, "move_joint", json!({"joint_num": 7, "angle": 0.0})).await,
            "Joint number must be between 1-6, got 7"
        );
        assert!(error_of(&d, "move_joint", json!({"joint_num": 2, "angle": 170.0}))
            .await
            .starts_with("Angle 170 out of range for joint 2"));
        assert_eq!(
            error_of(&d, "move_all_joints", json!({"angles": [0.0, 0.0, 0.0]})).await,
            "Must provide exactly 6 angles, got 3"
        );
        assert_eq!(
            error_of(&d, "jog_joint", json!({"joint_num": 1, "direction": 0})).await,
            "Direction must be 1 or -1, got 0"
        );
        assert_eq!(
            error_of(&d, "home_position", json!({"speed": 0})).await,
            "Speed must be between 1-100, got 0"
        );
        assert!(error_of(&d, "wait_for_completion", json!({"timeout": 120.0}))
            .await
            .starts_with("Timeout must be between"));
    }

    #[tokio::test]
    async fn wrong_types_are_invalid_arguments() {
        let d = offline();
        let message = error_of(&d, "get_joint_angle", json!({"joint_num": "one"})).await;
        assert!(message.starts_with("Invalid arguments"), "{message}");
        let message = error_of(&d, "fetch", json!({})).await;
        assert!(message.contains("missing field `id`"), "{message}");
    }

    #[tokio::test]
    async fn integral_floats_count_as_integers() {
        let args: JogJointArgs =
            parse(json!({"joint_num": 2.0, "direction": -1.0, "speed": 50.0})).unwrap();
        assert_eq!((args.joint_num, args.direction, args.speed), (2, -1, 50));
        let args: SpeedArgs = parse(json!({})).unwrap();
        assert_eq!(args.speed, 50);

        let d = offline();
        // validated, so the call gets as far as the API
        let message = error_of(&d, "move_joint", json!({"joint_num": 1.0, "angle": 10, "speed": 50.0})).await;
        assert!(message.starts_with("Cannot reach API server"), "{message}");
        assert_eq!(
            error_of(&d, "get_joint_angle", json!({"joint_num": 7.0})).await,
            "Joint number must be between 1-6, got 7"
        );
        let message = error_of(&d, "get_joint_angle", json!({"joint_num": 1.5})).await;
        assert!(message.starts_with("Invalid arguments"), "{message}");
    }

    #[tokio::test]
    async fn unreachable_api_is_a_failed_result() {
        let d = offline();
        let message = error_of(&d, "stop_robot", json!({})).await;
        assert!(message.starts_with("Cannot reach API server"), "{message}");
    }

    #[tokio::test]
    async fn search_works_without_the_api() {
        let result = offline()
            .invoke(ToolInvocation::new("search", json!({"query": "home"})))
            .await;
        assert!(result.success);
        assert_eq!(result.payload["results"][0]["id"], "home_position");
    }
}
