//! REST endpoints over the joint controller

use std::any::Any;
use std::time::{Duration, Instant};

use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::http::Uri;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::joint::{JogDirection, JointController};

use super::dto::{
    AcceptedResponse, AllJointAnglesResponse, HealthResponse, JogJointRequest, JointAngleResponse,
    MoveAllJointsRequest, MoveJointRequest, RobotStatusResponse, SpeedRequest, WaitRequest,
    WaitResponse, API_VERSION, WAIT_TIMEOUT_RANGE,
};
use super::error::ApiError;
use super::extract::{joint_param, ApiJson, OptionalJson};

#[derive(Clone)]
pub struct AppState {
    pub controller: JointController,
}

type ApiResult<T> = Result<Json<T>, ApiError>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/joints/angles", get(get_all_joint_angles).put(move_all_joints))
        .route("/joints/:joint/angle", get(get_joint_angle).put(move_joint))
        .route("/joints/:joint/jog", post(jog_joint))
        .route("/robot/home", post(home_position))
        .route("/robot/stop", post(stop_robot))
        .route("/robot/status", get(robot_status))
        .route("/robot/wait", post(wait_for_completion))
        .fallback(not_found)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn panic_response(_: Box<dyn Any + Send + 'static>) -> Response {
    ApiError::Internal("Handler panicked".to_string()).into_response()
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("No route for {}", uri.path()))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let robot_connected = state.controller.is_connected().await;
    Json(HealthResponse {
        status: if robot_connected { "healthy" } else { "degraded" }.to_string(),
        robot_connected,
        api_version: API_VERSION.to_string(),
    })
}

async fn get_joint_angle(
    State(state): State<AppState>,
    joint: Result<Path<i64>, PathRejection>,
) -> ApiResult<JointAngleResponse> {
    let joint = joint_param(joint)?;
    let angle = state.controller.get_joint_angle(joint).await?;
    Ok(Json(JointAngleResponse {
        joint: joint as u8,
        angle,
        timestamp: super::dto::timestamp(),
    }))
}

async fn move_joint(
    State(state): State<AppState>,
    joint: Result<Path<i64>, PathRejection>,
    ApiJson(req): ApiJson<MoveJointRequest>,
) -> ApiResult<AcceptedResponse> {
    let joint = joint_param(joint)?;
    state.controller.move_joint(joint, req.angle, req.speed).await?;
    Ok(Json(AcceptedResponse::new(format!(
        "Joint {joint} moving to {} degrees at speed {}",
        req.angle, req.speed
    ))))
}

async fn get_all_joint_angles(State(state): State<AppState>) -> ApiResult<AllJointAnglesResponse> {
    let angles = state.controller.get_all_joint_angles().await?;
    Ok(Json(AllJointAnglesResponse::new(angles)))
}

async fn move_all_joints(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<MoveAllJointsRequest>,
) -> ApiResult<AcceptedResponse> {
    state.controller.move_all_joints(&req.angles, req.speed).await?;
    Ok(Json(AcceptedResponse::new(format!(
        "All joints moving to {:?} at speed {}",
        req.angles, req.speed
    ))))
}

async fn jog_joint(
    State(state): State<AppState>,
    joint: Result<Path<i64>, PathRejection>,
    ApiJson(req): ApiJson<JogJointRequest>,
) -> ApiResult<AcceptedResponse> {
    let joint = joint_param(joint)?;
    state
        .controller
        .jog_joint(joint, req.direction, req.speed)
        .await?;
    let direction = JogDirection::new(req.direction)?;
    Ok(Json(AcceptedResponse::new(format!(
        "Joint {joint} jogging in {} direction at speed {}",
        direction.label(),
        req.speed
    ))))
}

async fn home_position(
    State(state): State<AppState>,
    OptionalJson(req): OptionalJson<SpeedRequest>,
) -> ApiResult<AcceptedResponse> {
    state.controller.home(req.speed).await?;
    Ok(Json(AcceptedResponse::new(format!(
        "Moving to home position at speed {}",
        req.speed
    ))))
}

async fn stop_robot(State(state): State<AppState>) -> ApiResult<AcceptedResponse> {
    state.controller.stop().await?;
    Ok(Json(AcceptedResponse::new("All joints stopped")))
}

async fn robot_status(State(state): State<AppState>) -> ApiResult<RobotStatusResponse> {
    let status = state.controller.status().await?;
    Ok(Json(status.into()))
}

async fn wait_for_completion(
    State(state): State<AppState>,
    OptionalJson(req): OptionalJson<WaitRequest>,
) -> ApiResult<WaitResponse> {
    if !WAIT_TIMEOUT_RANGE.contains(&req.timeout) {
        return Err(ApiError::BadRequest(format!(
            "Timeout must be between {} and {} seconds, got {}",
            WAIT_TIMEOUT_RANGE.start(),
            WAIT_TIMEOUT_RANGE.end(),
            req.timeout
        )));
    }
    let started = Instant::now();
    let completed = state
        .controller
        .wait_for_completion(Duration::from_secs_f64(req.timeout))
        .await?;
    Ok(Json(WaitResponse {
        completed,
        elapsed_time: started.elapsed().as_secs_f64(),
    }))
}
