//! Extractors that reject with `ApiError` (400) instead of axum's defaults

use axum::body::Bytes;
use axum::extract::rejection::PathRejection;
use axum::extract::{FromRequest, Path, Request};
use axum::Json;
use serde::de::DeserializeOwned;

use super::error::ApiError;

/// JSON body that must be present and well-formed
pub struct ApiJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(ApiError::BadRequest(rejection.body_text())),
        }
    }
}

/// JSON body that may be omitted entirely; an empty body yields `T::default()`
pub struct OptionalJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for OptionalJson<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(OptionalJson(T::default()));
        }
        serde_json::from_slice(&bytes)
            .map(OptionalJson)
            .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {e}")))
    }
}

/// Joint number from the path; non-numeric segments are a 400
pub fn joint_param(path: Result<Path<i64>, PathRejection>) -> Result<i64, ApiError> {
    path.map(|Path(n)| n)
        .map_err(|e| ApiError::BadRequest(format!("Invalid joint number: {}", e.body_text())))
}
