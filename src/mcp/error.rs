use thiserror::Error;

use crate::joint::JointError;

/// Failures talking to the REST API
#[derive(Debug, Error)]
pub enum ApiClientError {
    #[error("API request to {url} timed out")]
    Timeout { url: String },

    #[error("Cannot reach API server at {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("API request failed: {status} - {message}")]
    Status { status: u16, message: String },

    #[error("Unexpected API response: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("API request error: {0}")]
    Request(#[from] reqwest::Error),
}

impl ApiClientError {
    /// Worth another attempt for an idempotent read
    pub fn is_transient(&self) -> bool {
        match self {
            ApiClientError::Timeout { .. } | ApiClientError::Connect { .. } => true,
            ApiClientError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Failures inside a tool handler; all of them become a failed `ToolResult`
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Api(#[from] ApiClientError),

    #[error("Tool execution failed: {0}")]
    Internal(String),
}

impl From<JointError> for ToolError {
    fn from(err: JointError) -> Self {
        ToolError::Validation(err.to_string())
    }
}
