//! HTTP client for the REST API
//!
//! One `reqwest::Client` is shared by every clone, so all tool handlers draw
//! from the same connection pool. Reads are retried on transient failures;
//! commands that move the arm are sent exactly once.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::api::dto::{
    AcceptedResponse, AllJointAnglesResponse, HealthResponse, JointAngleResponse,
    RobotStatusResponse, WaitResponse,
};

use super::error::ApiClientError;

/// Slack on top of a server-side wait before the request itself times out
const WAIT_RESPONSE_MARGIN: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    /// e.g. `http://localhost:8080`
    pub base_url: String,
    pub timeout: Duration,
    /// Total attempts for GET requests
    pub read_attempts: u32,
    /// Delay before the first retry; doubles on each further retry
    pub retry_backoff: Duration,
}

impl ApiClientConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            base_url: format!("http://{host}:{port}"),
            ..Default::default()
        }
    }
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout: Duration::from_secs(30),
            read_attempts: 3,
            retry_backoff: Duration::from_millis(200),
        }
    }
}

#[derive(Clone)]
pub struct RobotApiClient {
    http: reqwest::Client,
    config: Arc<ApiClientConfig>,
}

impl RobotApiClient {
    pub fn new(config: ApiClientConfig) -> Result<Self, ApiClientError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            config: Arc::new(config),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn send<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, ApiClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_with_timeout(method, path, body, None).await
    }

    /// `timeout` replaces the client-wide timeout for this one request
    async fn send_with_timeout<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        timeout: Option<Duration>,
    ) -> Result<T, ApiClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        let mut request = self.http.request(method.clone(), &url);
        if let Some(body) = body {
            request = request.json(body);
        }
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|e| classify(&url, e))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ApiClientError::Status {
                status: status.as_u16(),
                message: error_message(status, &text),
            });
        }
        tracing::trace!(%method, %url, status = status.as_u16(), "API call ok");
        response.json::<T>().await.map_err(ApiClientError::Decode)
    }

    /// GET with retries on timeouts, refused connections and 5xx
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiClientError> {
        let attempts = self.config.read_attempts.max(1);
        let mut delay = self.config.retry_backoff;
        let mut attempt = 1;
        loop {
            match self.send::<(), T>(Method::GET, path, None).await {
                Err(e) if e.is_transient() && attempt < attempts => {
                    tracing::debug!(path, attempt, error = %e, "retrying API read");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    pub async fn health(&self) -> Result<HealthResponse, ApiClientError> {
        self.get("/health").await
    }

    pub async fn joint_angle(&self, joint: i64) -> Result<JointAngleResponse, ApiClientError> {
        self.get(&format!("/joints/{joint}/angle")).await
    }

    pub async fn joint_angles(&self) -> Result<AllJointAnglesResponse, ApiClientError> {
        self.get("/joints/angles").await
    }

    pub async fn status(&self) -> Result<RobotStatusResponse, ApiClientError> {
        self.get("/robot/status").await
    }

    pub async fn move_joint(&self, joint: i64, angle: f64, speed: i64) -> Result<AcceptedResponse, ApiClientError> {
        let body = json!({ "angle": angle, "speed": speed });
        self.send(Method::PUT, &format!("/joints/{joint}/angle"), Some(&body))
            .await
    }

    pub async fn move_all_joints(&self, angles: &[f64], speed: i64) -> Result<AcceptedResponse, ApiClientError> {
        let body = json!({ "angles": angles, "speed": speed });
        self.send(Method::PUT, "/joints/angles", Some(&body)).await
    }

    pub async fn jog_joint(&self, joint: i64, direction: i64, speed: i64) -> Result<AcceptedResponse, ApiClientError> {
        let body = json!({ "direction": direction, "speed": speed });
        self.send(Method::POST, &format!("/joints/{joint}/jog"), Some(&body))
            .await
    }

    pub async fn home(&self, speed: i64) -> Result<AcceptedResponse, ApiClientError> {
        let body = json!({ "speed": speed });
        self.send(Method::POST, "/robot/home", Some(&body)).await
    }

    pub async fn stop(&self) -> Result<AcceptedResponse, ApiClientError> {
        self.send::<Value, _>(Method::POST, "/robot/stop", None).await
    }

    /// The server holds the request for up to `timeout` seconds, so the
    /// request deadline is stretched past it.
    pub async fn wait_for_completion(&self, timeout: f64) -> Result<WaitResponse, ApiClientError> {
        let body = json!({ "timeout": timeout });
        let server_wait = Duration::try_from_secs_f64(timeout.max(0.0)).unwrap_or(self.config.timeout);
        let deadline = (server_wait + WAIT_RESPONSE_MARGIN).max(self.config.timeout);
        self.send_with_timeout(Method::POST, "/robot/wait", Some(&body), Some(deadline))
            .await
    }
}

fn classify(url: &str, err: reqwest::Error) -> ApiClientError {
    if err.is_timeout() {
        ApiClientError::Timeout {
            url: url.to_string(),
        }
    } else if err.is_connect() {
        ApiClientError::Connect {
            url: url.to_string(),
            source: err,
        }
    } else {
        ApiClientError::Request(err)
    }
}

/// Prefer the `message` field of a JSON error body over the raw text
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .or_else(|| (!body.trim().is_empty()).then(|| body.trim().to_string()))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use axum::http::StatusCode as AxumStatus;
    use axum::routing::{get, post};
    use axum::{Json, Router};

    async fn spawn(app: Router) -> RobotApiClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        RobotApiClient::new(ApiClientConfig {
            base_url: format!("http://{addr}"),
            timeout: Duration::from_secs(2),
            read_attempts: 3,
            retry_backoff: Duration::from_millis(10),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn reads_are_retried_until_success() {
        let hits = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&hits);
        let app = Router::new().route(
            "/joints/angles",
            get(move || {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(AxumStatus::SERVICE_UNAVAILABLE)
                    } else {
                        Ok(Json(json!({"angles": [1.0, 2.0, 3.0, 4.0, 5.0, 6.0], "timestamp": "t"})))
                    }
                }
            }),
        );
        let client = spawn(app).await;

        let angles = client.joint_angles().await.unwrap();
        assert_eq!(angles.angles[5], 6.0);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn commands_are_never_retried() {
        let hits = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&hits);
        let app = Router::new().route(
            "/robot/stop",
            post(move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    (
                        AxumStatus::SERVICE_UNAVAILABLE,
                        Json(json!({"error": "robot_unavailable", "message": "link down"})),
                    )
                }
            }),
        );
        let client = spawn(app).await;

        let err = client.stop().await.unwrap_err();
        assert_eq!(err.to_string(), "API request failed: 503 - link down");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let hits = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&hits);
        let app = Router::new().route(
            "/joints/:n/angle",
            get(move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    (AxumStatus::BAD_REQUEST, "bad joint")
                }
            }),
        );
        let client = spawn(app).await;

        let err = client.joint_angle(9).await.unwrap_err();
        assert!(matches!(err, ApiClientError::Status { status: 400, ref message } if message == "bad joint"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn wait_outlives_the_client_timeout() {
        let app = Router::new().route(
            "/robot/wait",
            post(|Json(body): Json<Value>| async move {
                let timeout = body["timeout"].as_f64().unwrap_or_default();
                tokio::time::sleep(Duration::from_secs_f64(timeout)).await;
                Json(json!({"completed": false, "elapsed_time": timeout}))
            }),
        );
        let client = spawn(app).await;

        // client timeout is 2s
        let outcome = client.wait_for_completion(3.0).await.unwrap();
        assert!(!outcome.completed);
        assert_eq!(outcome.elapsed_time, 3.0);
    }

    #[tokio::test]
    async fn refused_connection_is_reported() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = RobotApiClient::new(ApiClientConfig {
            retry_backoff: Duration::from_millis(1),
            ..ApiClientConfig::new("127.0.0.1", port)
        })
        .unwrap();
        let err = client.health().await.unwrap_err();
        assert!(matches!(err, ApiClientError::Connect { .. }));
    }
}
